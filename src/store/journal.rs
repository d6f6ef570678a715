//! File-backed asset store over an append-only journal.
//!
//! Every operation is validated against the in-memory index, written as one
//! checksummed record, and only then applied. Reopening replays the journal.

use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::format::*;
use super::table::AssetTable;
use super::{AssetRecord, AssetStore, ContentTag, Nonce, WriteCost, WriteReceipt};
use crate::codec::{Word, WORD_WIDTH};
use crate::util::{Error, Result};

/// Options for opening a [`JournalStore`].
#[derive(Debug, Clone, Copy)]
pub struct JournalOptions {
    /// Word width for a new journal; must match an existing one.
    pub word_width: usize,
    /// Call `sync_data` after every record.
    pub sync: bool,
    pub cost: WriteCost,
}

impl Default for JournalOptions {
    fn default() -> Self {
        Self { word_width: WORD_WIDTH, sync: false, cost: WriteCost::default() }
    }
}

/// What record writing needs from the journal's backing file.
trait JournalFile: Write {
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl JournalFile for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Append position and health of a journal file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tail {
    /// Offset just past the last complete record.
    end: u64,
    /// Set when a failed write could not be cut back off the file.
    poisoned: bool,
}

/// Write one record; on failure cut the file back to the last good record.
///
/// If the cut fails too, a partial record stays on disk and every later
/// write is refused.
fn write_record<F: JournalFile>(file: &mut F, tail: &mut Tail, record: &[u8], sync: bool, path: &Path) -> Result<()> {
    if tail.poisoned {
        return Err(Error::JournalPoisoned(path.to_path_buf()));
    }
    let written = file
        .write_all(record)
        .and_then(|_| if sync { file.sync() } else { Ok(()) });
    if let Err(e) = written {
        if let Err(rollback) = file.truncate(tail.end) {
            tail.poisoned = true;
            warn!(path = %path.display(), error = %rollback, "journal rollback failed, refusing further writes");
            return Err(rollback.into());
        }
        return Err(e.into());
    }
    tail.end += record.len() as u64;
    Ok(())
}

struct Inner {
    file: File,
    table: AssetTable,
    tail: Tail,
}

/// Asset store persisted to a journal file.
pub struct JournalStore {
    inner: RwLock<Inner>,
    path: PathBuf,
    sync: bool,
    cost: WriteCost,
}

impl JournalStore {
    /// Open or create a journal with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, JournalOptions::default())
    }

    /// Open or create a journal.
    ///
    /// A torn trailing record, left by a crash mid-write, is dropped and the
    /// file truncated. A checksum failure anywhere else is an error.
    pub fn open_with(path: impl AsRef<Path>, options: JournalOptions) -> Result<Self> {
        let path = path.as_ref();
        if options.word_width == 0 || options.word_width > u16::MAX as usize {
            return Err(Error::InvalidWordWidth(options.word_width));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let header = journal_header(options.word_width as u16);
        let (table, end) = if data.len() < JOURNAL_HEADER_SIZE
            && (header.starts_with(&data) || data.iter().all(|&b| b == 0))
        {
            if !data.is_empty() {
                warn!(path = %path.display(), len = data.len(), "rewriting torn journal header");
                file.set_len(0)?;
            }
            file.write_all(&header)?;
            file.sync_data()?;
            (AssetTable::new(options.word_width)?, JOURNAL_HEADER_SIZE as u64)
        } else {
            let word_width = parse_header(&data)?;
            if word_width != options.word_width {
                return Err(Error::InvalidHeader(format!(
                    "journal uses {}-byte words, {} requested",
                    word_width, options.word_width
                )));
            }
            let (table, end) = replay(&data, word_width)?;
            if end < data.len() as u64 {
                warn!(
                    path = %path.display(),
                    dropped = data.len() as u64 - end,
                    "dropping torn journal tail"
                );
                file.set_len(end)?;
            }
            (table, end)
        };

        info!(path = %path.display(), assets = table.len(), "journal opened");

        Ok(Self {
            inner: RwLock::new(Inner { file, table, tail: Tail { end, poisoned: false } }),
            path: path.to_path_buf(),
            sync: options.sync,
            cost: options.cost,
        })
    }

    /// Path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the journal in bytes.
    pub fn len_bytes(&self) -> u64 {
        self.inner.read().tail.end
    }

    fn append_record(&self, inner: &mut Inner, op: &JournalOp<'_>) -> Result<()> {
        let record = op.to_record()?;
        let Inner { file, tail, .. } = inner;
        write_record(file, tail, &record, self.sync, &self.path)
    }
}

fn parse_header(data: &[u8]) -> Result<usize> {
    if data.len() < JOURNAL_HEADER_SIZE {
        return Err(Error::InvalidHeader(format!("file is only {} bytes", data.len())));
    }
    if &data[..8] != JOURNAL_MAGIC {
        return Err(Error::InvalidHeader("bad magic".into()));
    }
    let version = u16::from_le_bytes([data[VERSION_OFFSET], data[VERSION_OFFSET + 1]]);
    if version != JOURNAL_VERSION {
        return Err(Error::InvalidHeader(format!("unsupported version {}", version)));
    }
    let width = u16::from_le_bytes([data[WORD_WIDTH_OFFSET], data[WORD_WIDTH_OFFSET + 1]]);
    if width == 0 {
        return Err(Error::InvalidWordWidth(0));
    }
    Ok(width as usize)
}

/// Rebuild the index. Returns it with the offset past the last whole record.
fn replay(data: &[u8], word_width: usize) -> Result<(AssetTable, u64)> {
    let mut table = AssetTable::new(word_width)?;
    let mut pos = JOURNAL_HEADER_SIZE;

    while pos < data.len() {
        if data.len() - pos < RECORD_PREFIX_SIZE {
            break;
        }
        let len = u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        if len == 0 {
            // No record has an empty body; a zero-filled tail was never written.
            if data[pos..].iter().all(|&b| b == 0) {
                break;
            }
            return Err(Error::CorruptJournal(pos as u64));
        }
        let crc = u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]);
        let body_start = pos + RECORD_PREFIX_SIZE;
        if data.len() - body_start < len {
            break;
        }
        let body = &data[body_start..body_start + len];
        if crc32fast::hash(body) != crc {
            return Err(Error::CorruptJournal(pos as u64));
        }
        let op = JournalOp::from_body(body, word_width).ok_or(Error::CorruptJournal(pos as u64))?;
        apply(&mut table, op).map_err(|_| Error::CorruptJournal(pos as u64))?;
        pos = body_start + len;
    }

    Ok((table, pos as u64))
}

fn apply(table: &mut AssetTable, op: JournalOp<'_>) -> Result<()> {
    match op {
        JournalOp::Create { id, total_length, words } => {
            table.check_create(id, &words)?;
            table.apply_create(id, words.into_owned(), total_length);
        }
        JournalOp::Append { id, words } => {
            table.check_append(id, &words)?;
            table.apply_append(id, words.into_owned());
        }
        JournalOp::Finalize { id, expected_words, tag } => {
            table.check_finalize(id, expected_words)?;
            table.apply_finalize(id, tag);
        }
    }
    Ok(())
}

impl AssetStore for JournalStore {
    fn word_width(&self) -> usize {
        self.inner.read().table.word_width()
    }

    fn create_asset(&self, id: u64, nonce: Nonce, slice: &[Word], total_length: u64) -> Result<WriteReceipt> {
        let mut inner = self.inner.write();
        inner.table.check_create(id, slice)?;
        let op = JournalOp::Create { id, total_length, words: Cow::Borrowed(slice) };
        self.append_record(&mut inner, &op)?;
        inner.table.apply_create(id, slice.to_vec(), total_length);
        debug!(id = format_args!("{id:#x}"), %nonce, words = slice.len(), total_length, "create");
        Ok(WriteReceipt { words: slice.len(), cost: self.cost.charge(slice.len(), true) })
    }

    fn append_asset_content(&self, id: u64, nonce: Nonce, slice: &[Word]) -> Result<WriteReceipt> {
        let mut inner = self.inner.write();
        inner.table.check_append(id, slice)?;
        let op = JournalOp::Append { id, words: Cow::Borrowed(slice) };
        self.append_record(&mut inner, &op)?;
        inner.table.apply_append(id, slice.to_vec());
        debug!(id = format_args!("{id:#x}"), %nonce, words = slice.len(), "append");
        Ok(WriteReceipt { words: slice.len(), cost: self.cost.charge(slice.len(), false) })
    }

    fn finalize(&self, id: u64, nonce: Nonce, expected_words: u64, tag: ContentTag) -> Result<WriteReceipt> {
        let mut inner = self.inner.write();
        inner.table.check_finalize(id, expected_words)?;
        self.append_record(&mut inner, &JournalOp::Finalize { id, expected_words, tag })?;
        inner.table.apply_finalize(id, tag);
        debug!(id = format_args!("{id:#x}"), %nonce, expected_words, kind = %tag.kind, "finalize");
        Ok(WriteReceipt { words: 0, cost: self.cost.charge(0, false) })
    }

    fn read_asset(&self, id: u64) -> Result<AssetRecord> {
        self.inner.read().table.get(id).cloned()
    }

    fn asset_ids(&self) -> Vec<u64> {
        self.inner.read().table.ids()
    }
}
