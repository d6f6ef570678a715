//! Chunking of byte buffers into fixed-width words and back.
//!
//! ```text
//! bytes ──(deflate?)──> stream ──split──> [w0][w1]...[wN-1|pad]
//!                         ^                          |
//!                         └── truncate to total ─────┘
//! ```
//!
//! Only the final word carries zero padding; the record's total length, not
//! the word count, tells how many of its bytes are content.

use super::compression;
use crate::util::{Error, Result};

/// Width of one stored word in bytes.
pub const WORD_WIDTH: usize = 32;

/// Words sent per create/append operation.
///
/// Older tooling labels this "24KB"; the arithmetic gives 8 KiB per write.
pub const WORDS_PER_WRITE: usize = (1024 * 8) / WORD_WIDTH;

/// Content bytes moved by one full write operation.
pub const WRITE_SLICE_BYTES: usize = WORDS_PER_WRITE * WORD_WIDTH;

/// One fixed-width word. Every word of an asset has the same length.
pub type Word = Vec<u8>;

/// How the chunked stream relates to the original bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Stream is the original bytes.
    Raw,
    /// Stream is raw deflate of the original bytes.
    Deflate {
        /// Length of the original bytes, checked after inflating.
        inflated_length: Option<u64>,
    },
}

impl Encoding {
    #[inline]
    pub fn is_compressed(&self) -> bool {
        matches!(self, Encoding::Deflate { .. })
    }
}

/// A byte buffer split into words, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedAsset {
    /// Length of the chunked stream (compressed length when deflated).
    pub total_length: u64,
    /// Words in stream order; only the last one is padded.
    pub words: Vec<Word>,
    /// Whether the stream must be inflated on the way back.
    pub encoding: Encoding,
    /// Width of every word.
    pub word_width: usize,
}

impl ChunkedAsset {
    /// Number of bytes of the original buffer.
    pub fn original_length(&self) -> u64 {
        match self.encoding {
            Encoding::Deflate { inflated_length: Some(len) } => len,
            _ => self.total_length,
        }
    }

    /// Group the words into ordered per-operation slices.
    ///
    /// An empty asset still yields one (empty) slice so it can be created.
    pub fn write_slices(&self, words_per_write: usize) -> Vec<&[Word]> {
        if self.words.is_empty() {
            return vec![&self.words[..]];
        }
        self.words.chunks(words_per_write.max(1)).collect()
    }

    /// Rebuild the original bytes.
    pub fn reconstruct(&self) -> Result<Vec<u8>> {
        reconstruct(self.total_length, &self.words, self.word_width, self.encoding)
    }
}

/// Number of words needed to hold `len` bytes.
#[inline]
pub fn words_for_length(len: u64, word_width: usize) -> u64 {
    len.div_ceil(word_width as u64)
}

fn check_width(word_width: usize) -> Result<()> {
    if word_width == 0 {
        return Err(Error::InvalidWordWidth(word_width));
    }
    Ok(())
}

/// Split bytes into words, zero-padding only the final word.
pub fn split_words(bytes: &[u8], word_width: usize) -> Result<Vec<Word>> {
    check_width(word_width)?;
    Ok(bytes
        .chunks(word_width)
        .map(|chunk| {
            let mut word = chunk.to_vec();
            word.resize(word_width, 0);
            word
        })
        .collect())
}

/// Chunk a buffer, deflating it first when `compress` is set.
pub fn chunk(bytes: &[u8], word_width: usize, compress: bool) -> Result<ChunkedAsset> {
    chunk_with_level(bytes, word_width, compress.then_some(compression::BEST_LEVEL))
}

/// Chunk a buffer, deflating at `level` when one is given.
pub fn chunk_with_level(bytes: &[u8], word_width: usize, level: Option<u32>) -> Result<ChunkedAsset> {
    check_width(word_width)?;

    let (stream, encoding) = match level {
        Some(level) => (
            compression::deflate(bytes, level)?,
            Encoding::Deflate { inflated_length: Some(bytes.len() as u64) },
        ),
        None => (bytes.to_vec(), Encoding::Raw),
    };

    Ok(ChunkedAsset {
        total_length: stream.len() as u64,
        words: split_words(&stream, word_width)?,
        encoding,
        word_width,
    })
}

/// Concatenate words and cut the stream to `total_length`.
///
/// Fails with [`Error::TruncatedAsset`] when the words cannot cover the length.
pub fn join_words(total_length: u64, words: &[Word], word_width: usize) -> Result<Vec<u8>> {
    check_width(word_width)?;

    let needed = words_for_length(total_length, word_width);
    if (words.len() as u64) < needed {
        return Err(Error::TruncatedAsset {
            total_length,
            needed,
            available: words.len() as u64,
        });
    }

    let mut stream = Vec::with_capacity(needed as usize * word_width);
    for word in &words[..needed as usize] {
        if word.len() != word_width {
            return Err(Error::WordWidthMismatch { expected: word_width, actual: word.len() });
        }
        stream.extend_from_slice(word);
    }
    stream.truncate(total_length as usize);
    Ok(stream)
}

/// Inverse of [`chunk`]: join, strip padding, inflate if needed.
pub fn reconstruct(
    total_length: u64,
    words: &[Word],
    word_width: usize,
    encoding: Encoding,
) -> Result<Vec<u8>> {
    let stream = join_words(total_length, words, word_width)?;
    match encoding {
        Encoding::Raw => Ok(stream),
        Encoding::Deflate { inflated_length } => compression::inflate(&stream, inflated_length),
    }
}

/// Content a reader can see so far, never more than `total_length` bytes.
///
/// Used for assets whose write sequence has not finished: the result is the
/// prefix covered by the words that landed.
pub fn available_content(total_length: u64, words: &[Word]) -> Vec<u8> {
    let mut stream: Vec<u8> = words.iter().flatten().copied().collect();
    stream.truncate(total_length as usize);
    stream
}

/// Pack a UTF-8 string into words.
pub fn words_from_str(value: &str, word_width: usize) -> Result<Vec<Word>> {
    split_words(value.as_bytes(), word_width)
}

/// Read a string back from words, dropping NUL padding.
pub fn str_from_words(words: &[Word]) -> String {
    let bytes: Vec<u8> = words.iter().flatten().copied().filter(|&b| b != 0).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}
