//! Append-only keyed asset storage.
//!
//! Each asset goes through a strictly ordered write sequence:
//!
//! ```text
//! Absent --create--> Open --append*--> Open --finalize--> Sealed
//! ```
//!
//! Every arrow is one bounded operation. An interrupted sequence leaves an
//! `Open` record holding exactly the words that landed; [`AssetStore::read_asset`]
//! shows it as-is while [`AssetStore::read_content`] refuses it with
//! [`Error::NotReady`]. The store never reorders or deduplicates appends, so
//! the caller must not re-send an append that already succeeded.

mod table;
mod memory;
mod journal;
mod format;

pub use memory::MemoryStore;
pub use journal::{JournalOptions, JournalStore};
pub use format::*;

use serde::{Deserialize, Serialize};

use crate::codec::{self, ContentKind, Encoding, Word};
use crate::util::{Error, Result};

/// Single-use uniqueness token sent with every write.
///
/// It only makes each operation's payload distinct; stores never keep it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; 16]);

impl Nonce {
    /// Fresh random token.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl Default for Nonce {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", uuid::Uuid::from_bytes(self.0).simple())
    }
}

/// Cost model charged per write operation (gas-like units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteCost {
    /// Flat cost of any operation.
    pub base: u64,
    /// Cost of each stored word.
    pub per_word: u64,
    /// Extra cost of establishing a new record.
    pub per_record: u64,
}

impl Default for WriteCost {
    fn default() -> Self {
        Self {
            base: 21_000,
            per_word: 20_000,
            per_record: 44_000,
        }
    }
}

impl WriteCost {
    /// Cost of an operation storing `words` words.
    pub fn charge(&self, words: usize, new_record: bool) -> u64 {
        let record = if new_record { self.per_record } else { 0 };
        self.base + self.per_word * words as u64 + record
    }
}

/// Outcome of one successful write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteReceipt {
    /// Words stored by the operation.
    pub words: usize,
    /// Cost charged under the store's [`WriteCost`].
    pub cost: u64,
}

/// What a reader needs to turn stored words back into content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentTag {
    pub kind: ContentKind,
    pub encoding: Encoding,
}

/// Completion state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStatus {
    /// Writes may still arrive; content may be partial.
    Open,
    /// Finalized with a verified word count; immutable.
    Sealed(ContentTag),
}

/// Stored state of one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub id: u64,
    /// Length of the chunked stream, used to strip padding.
    pub total_length: u64,
    pub word_width: usize,
    /// Words in write order.
    pub words: Vec<Word>,
    pub status: AssetStatus,
}

impl AssetRecord {
    #[inline]
    pub fn is_sealed(&self) -> bool {
        matches!(self.status, AssetStatus::Sealed(_))
    }

    /// Content tag, if sealed.
    pub fn tag(&self) -> Option<ContentTag> {
        match self.status {
            AssetStatus::Sealed(tag) => Some(tag),
            AssetStatus::Open => None,
        }
    }

    /// Words the total length requires.
    #[inline]
    pub fn expected_words(&self) -> u64 {
        codec::words_for_length(self.total_length, self.word_width)
    }

    /// Stream bytes covered by the words stored so far.
    pub fn available_content(&self) -> Vec<u8> {
        codec::available_content(self.total_length, &self.words)
    }

    /// Decode a sealed record into its original bytes.
    pub fn content(&self) -> Result<Vec<u8>> {
        let tag = self.tag().ok_or(Error::NotReady(self.id))?;
        codec::reconstruct(self.total_length, &self.words, self.word_width, tag.encoding)
    }
}

/// Decoded asset handed to rendering collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetContent {
    pub id: u64,
    pub kind: ContentKind,
    pub bytes: Vec<u8>,
}

impl AssetContent {
    /// Content as a `data:` URI.
    pub fn data_uri(&self) -> String {
        self.kind.data_uri(&self.bytes)
    }
}

/// Keyed store behind the constrained write primitive.
///
/// Implementations lock internally so assets with different ids can be
/// written from several threads. Writes to one id must still be issued in
/// order by a single writer.
pub trait AssetStore: Send + Sync {
    /// Width every stored word must have.
    fn word_width(&self) -> usize;

    /// Establish a record with its first slice of words.
    ///
    /// Fails with [`Error::DuplicateAsset`] if `id` exists; the existing
    /// record is left untouched.
    fn create_asset(&self, id: u64, nonce: Nonce, slice: &[Word], total_length: u64) -> Result<WriteReceipt>;

    /// Append the next slice of words to an open record.
    fn append_asset_content(&self, id: u64, nonce: Nonce, slice: &[Word]) -> Result<WriteReceipt>;

    /// Seal a record after checking it holds `expected_words` words.
    fn finalize(&self, id: u64, nonce: Nonce, expected_words: u64, tag: ContentTag) -> Result<WriteReceipt>;

    /// Snapshot of a record, complete or not.
    fn read_asset(&self, id: u64) -> Result<AssetRecord>;

    /// All known ids in ascending order.
    fn asset_ids(&self) -> Vec<u64>;

    /// Decoded content of a sealed asset.
    ///
    /// Fails with [`Error::NotReady`] while the asset is still open.
    fn read_content(&self, id: u64) -> Result<AssetContent> {
        let record = self.read_asset(id)?;
        let tag = record.tag().ok_or(Error::NotReady(id))?;
        let bytes = record.content()?;
        Ok(AssetContent { id, kind: tag.kind, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_unique() {
        let a = Nonce::new();
        let b = Nonce::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 32);
    }

    #[test]
    fn test_cost_charge() {
        let cost = WriteCost { base: 10, per_word: 2, per_record: 100 };
        assert_eq!(cost.charge(3, false), 16);
        assert_eq!(cost.charge(3, true), 116);
        assert_eq!(cost.charge(0, false), 10);
    }

    #[test]
    fn test_open_record_has_no_content() {
        let record = AssetRecord {
            id: 1,
            total_length: 3,
            word_width: 4,
            words: vec![vec![1, 2, 3, 0]],
            status: AssetStatus::Open,
        };
        assert_eq!(record.available_content(), vec![1, 2, 3]);
        assert!(matches!(record.content(), Err(Error::NotReady(1))));
    }
}
