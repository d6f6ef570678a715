//! Record bookkeeping shared by the store implementations.
//!
//! Each operation is split into a `check_*` step that validates without
//! mutating and an `apply_*` step that cannot fail, so a persistent store can
//! write its log record in between.

use std::collections::HashMap;

use super::{AssetRecord, AssetStatus, ContentTag};
use crate::codec::{self, Word};
use crate::util::{Error, Result};

pub(crate) struct AssetTable {
    word_width: usize,
    records: HashMap<u64, AssetRecord>,
}

impl AssetTable {
    pub fn new(word_width: usize) -> Result<Self> {
        if word_width == 0 {
            return Err(Error::InvalidWordWidth(word_width));
        }
        Ok(Self { word_width, records: HashMap::new() })
    }

    /// Table with the standard 32-byte word.
    pub fn standard() -> Self {
        Self { word_width: codec::WORD_WIDTH, records: HashMap::new() }
    }

    #[inline]
    pub fn word_width(&self) -> usize {
        self.word_width
    }

    fn check_slice(&self, slice: &[Word]) -> Result<()> {
        match slice.iter().find(|w| w.len() != self.word_width) {
            Some(word) => Err(Error::WordWidthMismatch {
                expected: self.word_width,
                actual: word.len(),
            }),
            None => Ok(()),
        }
    }

    fn open_record(&self, id: u64) -> Result<&AssetRecord> {
        let record = self.records.get(&id).ok_or(Error::UnknownAsset(id))?;
        if record.is_sealed() {
            return Err(Error::AssetSealed(id));
        }
        Ok(record)
    }

    pub fn check_create(&self, id: u64, slice: &[Word]) -> Result<()> {
        if self.records.contains_key(&id) {
            return Err(Error::DuplicateAsset(id));
        }
        self.check_slice(slice)
    }

    pub fn apply_create(&mut self, id: u64, slice: Vec<Word>, total_length: u64) {
        self.records.insert(
            id,
            AssetRecord {
                id,
                total_length,
                word_width: self.word_width,
                words: slice,
                status: AssetStatus::Open,
            },
        );
    }

    pub fn check_append(&self, id: u64, slice: &[Word]) -> Result<()> {
        self.open_record(id)?;
        self.check_slice(slice)
    }

    pub fn apply_append(&mut self, id: u64, slice: Vec<Word>) {
        if let Some(record) = self.records.get_mut(&id) {
            record.words.extend(slice);
        }
    }

    pub fn check_finalize(&self, id: u64, expected_words: u64) -> Result<()> {
        let record = self.open_record(id)?;
        let actual = record.words.len() as u64;
        let required = codec::words_for_length(record.total_length, self.word_width);
        if actual != expected_words {
            return Err(Error::ChunkCountMismatch { id, expected: expected_words, actual });
        }
        if actual != required {
            return Err(Error::ChunkCountMismatch { id, expected: required, actual });
        }
        Ok(())
    }

    pub fn apply_finalize(&mut self, id: u64, tag: ContentTag) {
        if let Some(record) = self.records.get_mut(&id) {
            record.status = AssetStatus::Sealed(tag);
        }
    }

    pub fn get(&self, id: u64) -> Result<&AssetRecord> {
        self.records.get(&id).ok_or(Error::UnknownAsset(id))
    }

    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.records.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
