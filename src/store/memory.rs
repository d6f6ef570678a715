//! In-memory asset store.

use parking_lot::RwLock;
use tracing::debug;

use super::table::AssetTable;
use super::{AssetRecord, AssetStore, ContentTag, Nonce, WriteCost, WriteReceipt};
use crate::codec::Word;
use crate::util::Result;

/// Asset store kept entirely in memory.
///
/// Uses `parking_lot::RwLock`: reads share the lock, each write holds it for
/// one operation.
pub struct MemoryStore {
    table: RwLock<AssetTable>,
    cost: WriteCost,
}

impl MemoryStore {
    /// Create an empty store with 32-byte words and the default cost model.
    pub fn new() -> Self {
        Self {
            table: RwLock::new(AssetTable::standard()),
            cost: WriteCost::default(),
        }
    }

    /// Create an empty store with a custom word width and cost model.
    pub fn with_options(word_width: usize, cost: WriteCost) -> Result<Self> {
        Ok(Self {
            table: RwLock::new(AssetTable::new(word_width)?),
            cost,
        })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetStore for MemoryStore {
    fn word_width(&self) -> usize {
        self.table.read().word_width()
    }

    fn create_asset(&self, id: u64, nonce: Nonce, slice: &[Word], total_length: u64) -> Result<WriteReceipt> {
        let mut table = self.table.write();
        table.check_create(id, slice)?;
        table.apply_create(id, slice.to_vec(), total_length);
        debug!(id = format_args!("{id:#x}"), %nonce, words = slice.len(), total_length, "create");
        Ok(WriteReceipt { words: slice.len(), cost: self.cost.charge(slice.len(), true) })
    }

    fn append_asset_content(&self, id: u64, nonce: Nonce, slice: &[Word]) -> Result<WriteReceipt> {
        let mut table = self.table.write();
        table.check_append(id, slice)?;
        table.apply_append(id, slice.to_vec());
        debug!(id = format_args!("{id:#x}"), %nonce, words = slice.len(), "append");
        Ok(WriteReceipt { words: slice.len(), cost: self.cost.charge(slice.len(), false) })
    }

    fn finalize(&self, id: u64, nonce: Nonce, expected_words: u64, tag: ContentTag) -> Result<WriteReceipt> {
        let mut table = self.table.write();
        table.check_finalize(id, expected_words)?;
        table.apply_finalize(id, tag);
        debug!(id = format_args!("{id:#x}"), %nonce, expected_words, kind = %tag.kind, "finalize");
        Ok(WriteReceipt { words: 0, cost: self.cost.charge(0, false) })
    }

    fn read_asset(&self, id: u64) -> Result<AssetRecord> {
        self.table.read().get(id).cloned()
    }

    fn asset_ids(&self) -> Vec<u64> {
        self.table.read().ids()
    }
}
