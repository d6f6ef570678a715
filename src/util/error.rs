//! Error types for the layervault library.

use std::path::PathBuf;
use thiserror::Error;

pub use trait_pack::CodecError;

/// Main error type for layervault operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Trait codec misuse (unknown category, option overflow, bad schema)
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Asset id was already created
    #[error("Asset {0:#x} already exists")]
    DuplicateAsset(u64),

    /// Asset id was never created
    #[error("Asset {0:#x} does not exist")]
    UnknownAsset(u64),

    /// Asset was finalized and can no longer change
    #[error("Asset {0:#x} is sealed")]
    AssetSealed(u64),

    /// Asset has not been finalized yet
    #[error("Asset {0:#x} is not finalized")]
    NotReady(u64),

    /// Stored word count does not match what finalize expects
    #[error("Asset {id:#x} holds {actual} words, expected {expected}")]
    ChunkCountMismatch { id: u64, expected: u64, actual: u64 },

    /// Fewer words than the recorded length needs
    #[error("Truncated asset: {needed} words needed for {total_length} bytes, got {available}")]
    TruncatedAsset {
        total_length: u64,
        needed: u64,
        available: u64,
    },

    /// Inflate failed or produced the wrong length
    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    /// Word width of zero or unsupported
    #[error("Invalid word width: {0}")]
    InvalidWordWidth(usize),

    /// A written word does not have the store's width
    #[error("Word has {actual} bytes, store expects {expected}")]
    WordWidthMismatch { expected: usize, actual: usize },

    /// Auxiliary asset id inside the packed trait range
    #[error("Identifier {0:#x} is not in the auxiliary range")]
    InvalidAuxiliaryId(u64),

    /// A create/append/finalize failed during a load
    #[error("Write failed for asset {id:#x} at chunk {chunk_index}: {source}")]
    WriteFailed {
        id: u64,
        chunk_index: usize,
        #[source]
        source: Box<Error>,
    },

    /// Progress ledger disagrees with the store
    #[error("Progress for asset {id:#x} says {ledger_words} words landed, store holds {stored_words}")]
    ProgressMismatch {
        id: u64,
        ledger_words: u64,
        stored_words: u64,
    },

    /// Words already stored for an asset differ from its current source
    #[error("Asset {id:#x} in the store does not match its source: {reason}")]
    ContentMismatch { id: u64, reason: String },

    /// An earlier write could not be rolled back; the journal refuses writes
    #[error("Journal {0} is poisoned by a failed rollback")]
    JournalPoisoned(PathBuf),

    /// Journal record failed its checksum or is malformed
    #[error("Corrupt journal at offset {0}")]
    CorruptJournal(u64),

    /// File is not a journal or has an unsupported version
    #[error("Invalid journal header: {0}")]
    InvalidHeader(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a store failure with the position of the write that failed.
    pub fn write_failed(id: u64, chunk_index: usize, source: Error) -> Self {
        Self::WriteFailed { id, chunk_index, source: Box::new(source) }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias for layervault operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::DuplicateAsset(0x200);
        assert!(e.to_string().contains("0x200"));

        let e = Error::TruncatedAsset { total_length: 70, needed: 3, available: 2 };
        assert!(e.to_string().contains("70"));
        assert!(e.to_string().contains("3"));
    }

    #[test]
    fn test_write_failed_keeps_source() {
        let e = Error::write_failed(7, 4, Error::UnknownAsset(7));
        match &e {
            Error::WriteFailed { id, chunk_index, source } => {
                assert_eq!(*id, 7);
                assert_eq!(*chunk_index, 4);
                assert!(matches!(**source, Error::UnknownAsset(7)));
            }
            _ => panic!("unexpected variant"),
        }
        assert!(std::error::Error::source(&e).is_some());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_codec() {
        let err: Error = CodecError::CategoryUnknown("Tail".into()).into();
        assert!(matches!(err, Error::Codec(CodecError::CategoryUnknown(_))));
    }
}
