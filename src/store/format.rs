//! Journal file format constants and record codec.
//!
//! ## File Structure
//!
//! ```text
//! +------------------+
//! | Magic "LVJOURNL" |  8 bytes
//! +------------------+
//! | Version          |  2 bytes (u16 LE)
//! +------------------+
//! | Word width       |  2 bytes (u16 LE)
//! +------------------+
//! | Reserved         |  4 bytes
//! +------------------+
//! | Record*          |  [len u32][crc32 u32][body: len bytes]
//! +------------------+
//! ```
//!
//! Record bodies start with `[op u8][id u64]`. Nonces are never written.

use std::borrow::Cow;
use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::ContentTag;
use crate::codec::{ContentKind, Encoding, Word};

/// Magic bytes at the start of a journal.
pub const JOURNAL_MAGIC: &[u8; 8] = b"LVJOURNL";

/// Size of the file header in bytes.
pub const JOURNAL_HEADER_SIZE: usize = 16;

/// Offset of the version in the header.
pub const VERSION_OFFSET: usize = 8;

/// Offset of the word width in the header.
pub const WORD_WIDTH_OFFSET: usize = 10;

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// Bytes before each record body (length + checksum).
pub const RECORD_PREFIX_SIZE: usize = 8;

pub(crate) const OP_CREATE: u8 = 1;
pub(crate) const OP_APPEND: u8 = 2;
pub(crate) const OP_FINALIZE: u8 = 3;

const ENC_RAW: u8 = 0;
const ENC_DEFLATE: u8 = 1;
const ENC_DEFLATE_SIZED: u8 = 2;

/// Build the 16-byte file header.
pub fn journal_header(word_width: u16) -> [u8; JOURNAL_HEADER_SIZE] {
    let mut header = [0u8; JOURNAL_HEADER_SIZE];
    header[..8].copy_from_slice(JOURNAL_MAGIC);
    header[VERSION_OFFSET..VERSION_OFFSET + 2].copy_from_slice(&JOURNAL_VERSION.to_le_bytes());
    header[WORD_WIDTH_OFFSET..WORD_WIDTH_OFFSET + 2].copy_from_slice(&word_width.to_le_bytes());
    header
}

/// One logged store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JournalOp<'a> {
    Create { id: u64, total_length: u64, words: Cow<'a, [Word]> },
    Append { id: u64, words: Cow<'a, [Word]> },
    Finalize { id: u64, expected_words: u64, tag: ContentTag },
}

impl JournalOp<'_> {
    /// Serialize as `[len][crc][body]`.
    pub fn to_record(&self) -> std::io::Result<Vec<u8>> {
        let mut body = Vec::new();
        match self {
            JournalOp::Create { id, total_length, words } => {
                body.write_u8(OP_CREATE)?;
                body.write_u64::<LittleEndian>(*id)?;
                body.write_u64::<LittleEndian>(*total_length)?;
                write_words(&mut body, words)?;
            }
            JournalOp::Append { id, words } => {
                body.write_u8(OP_APPEND)?;
                body.write_u64::<LittleEndian>(*id)?;
                write_words(&mut body, words)?;
            }
            JournalOp::Finalize { id, expected_words, tag } => {
                body.write_u8(OP_FINALIZE)?;
                body.write_u64::<LittleEndian>(*id)?;
                body.write_u64::<LittleEndian>(*expected_words)?;
                body.write_u8(tag.kind.code())?;
                let (code, inflated) = match tag.encoding {
                    Encoding::Raw => (ENC_RAW, 0),
                    Encoding::Deflate { inflated_length: None } => (ENC_DEFLATE, 0),
                    Encoding::Deflate { inflated_length: Some(len) } => (ENC_DEFLATE_SIZED, len),
                };
                body.write_u8(code)?;
                body.write_u64::<LittleEndian>(inflated)?;
            }
        }

        let mut record = Vec::with_capacity(RECORD_PREFIX_SIZE + body.len());
        record.write_u32::<LittleEndian>(body.len() as u32)?;
        record.write_u32::<LittleEndian>(crc32fast::hash(&body))?;
        record.extend_from_slice(&body);
        Ok(record)
    }

    /// Parse a checksummed body. Returns `None` if it is malformed.
    pub fn from_body(body: &[u8], word_width: usize) -> Option<JournalOp<'static>> {
        let mut rd = body;
        let op = rd.read_u8().ok()?;
        let id = rd.read_u64::<LittleEndian>().ok()?;
        let parsed = match op {
            OP_CREATE => {
                let total_length = rd.read_u64::<LittleEndian>().ok()?;
                let words = read_words(&mut rd, word_width)?;
                JournalOp::Create { id, total_length, words: Cow::Owned(words) }
            }
            OP_APPEND => {
                let words = read_words(&mut rd, word_width)?;
                JournalOp::Append { id, words: Cow::Owned(words) }
            }
            OP_FINALIZE => {
                let expected_words = rd.read_u64::<LittleEndian>().ok()?;
                let kind = ContentKind::from_code(rd.read_u8().ok()?)?;
                let code = rd.read_u8().ok()?;
                let inflated = rd.read_u64::<LittleEndian>().ok()?;
                let encoding = match code {
                    ENC_RAW => Encoding::Raw,
                    ENC_DEFLATE => Encoding::Deflate { inflated_length: None },
                    ENC_DEFLATE_SIZED => Encoding::Deflate { inflated_length: Some(inflated) },
                    _ => return None,
                };
                JournalOp::Finalize { id, expected_words, tag: ContentTag { kind, encoding } }
            }
            _ => return None,
        };
        // Trailing bytes mean the body was not produced by `to_record`.
        rd.is_empty().then_some(parsed)
    }
}

fn write_words(buf: &mut Vec<u8>, words: &[Word]) -> std::io::Result<()> {
    buf.write_u32::<LittleEndian>(words.len() as u32)?;
    for word in words {
        buf.extend_from_slice(word);
    }
    Ok(())
}

fn read_words(rd: &mut &[u8], word_width: usize) -> Option<Vec<Word>> {
    let count = rd.read_u32::<LittleEndian>().ok()? as usize;
    if rd.len() < count.checked_mul(word_width)? {
        return None;
    }
    let mut words = Vec::with_capacity(count);
    for _ in 0..count {
        let mut word = vec![0u8; word_width];
        rd.read_exact(&mut word).ok()?;
        words.push(word);
    }
    Some(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header() {
        let header = journal_header(32);
        assert_eq!(&header[..8], JOURNAL_MAGIC);
        assert_eq!(u16::from_le_bytes([header[8], header[9]]), JOURNAL_VERSION);
        assert_eq!(u16::from_le_bytes([header[10], header[11]]), 32);
    }

    #[test]
    fn test_record_layout() {
        let words = vec![vec![0xAAu8; 4], vec![0xBBu8; 4]];
        let op = JournalOp::Append { id: 0x200, words: Cow::Borrowed(&words) };
        let record = op.to_record().unwrap();

        let len = u32::from_le_bytes(record[0..4].try_into().unwrap()) as usize;
        let crc = u32::from_le_bytes(record[4..8].try_into().unwrap());
        let body = &record[RECORD_PREFIX_SIZE..];
        assert_eq!(len, body.len());
        assert_eq!(len, 1 + 8 + 4 + 8);
        assert_eq!(crc, crc32fast::hash(body));
        assert_eq!(body[0], OP_APPEND);

        assert_eq!(JournalOp::from_body(body, 4), Some(op));
    }

    #[test]
    fn test_finalize_body() {
        let tag = ContentTag {
            kind: ContentKind::VectorImage,
            encoding: Encoding::Deflate { inflated_length: Some(4096) },
        };
        let op = JournalOp::Finalize { id: 1, expected_words: 12, tag };
        let record = op.to_record().unwrap();
        assert_eq!(JournalOp::from_body(&record[RECORD_PREFIX_SIZE..], 32), Some(op));
    }

    #[test]
    fn test_malformed_body() {
        assert_eq!(JournalOp::from_body(&[], 32), None);
        assert_eq!(JournalOp::from_body(&[9, 0, 0, 0, 0, 0, 0, 0, 0], 32), None);

        // Word count larger than the remaining bytes
        let mut body = vec![OP_APPEND];
        body.extend_from_slice(&1u64.to_le_bytes());
        body.extend_from_slice(&5u32.to_le_bytes());
        body.extend_from_slice(&[0u8; 8]);
        assert_eq!(JournalOp::from_body(&body, 32), None);
    }
}
