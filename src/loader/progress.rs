//! Per-asset load progress, persisted between runs.
//!
//! The store cannot tell a replayed append from a new one, so resuming a
//! load safely depends on knowing exactly how many writes already landed.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::util::Result;

/// How far the write sequence of one asset got.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetProgress {
    /// Create + append operations that succeeded.
    pub slices_written: usize,
    /// Words stored by those operations.
    pub words_written: u64,
    /// Slices the asset needs in total.
    pub total_slices: usize,
    pub finalized: bool,
}

impl AssetProgress {
    /// Index of the next slice to send.
    #[inline]
    pub fn next_slice(&self) -> usize {
        self.slices_written
    }
}

/// Progress of every asset touched by a loader, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressLedger {
    assets: BTreeMap<u64, AssetProgress>,
}

impl ProgressLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a ledger; a missing file is an empty ledger.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the ledger through a temporary file and rename it into place.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn get(&self, id: u64) -> Option<&AssetProgress> {
        self.assets.get(&id)
    }

    /// Note that one more slice of `words` words landed.
    pub fn record_slice(&mut self, id: u64, words: usize, total_slices: usize) {
        let entry = self.assets.entry(id).or_default();
        entry.slices_written += 1;
        entry.words_written += words as u64;
        entry.total_slices = total_slices;
    }

    pub fn record_finalized(&mut self, id: u64) {
        self.assets.entry(id).or_default().finalized = true;
    }

    #[inline]
    pub fn is_finalized(&self, id: u64) -> bool {
        self.assets.get(&id).is_some_and(|p| p.finalized)
    }

    /// Assets whose write sequence has not been finalized.
    pub fn incomplete(&self) -> impl Iterator<Item = (u64, &AssetProgress)> {
        self.assets.iter().filter(|(_, p)| !p.finalized).map(|(id, p)| (*id, p))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_record_and_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let mut ledger = ProgressLedger::new();
        ledger.record_slice(512, 256, 3);
        ledger.record_slice(512, 256, 3);
        ledger.record_slice(1 << 63, 10, 1);
        ledger.record_finalized(1 << 63);
        ledger.save(&path).unwrap();

        let loaded = ProgressLedger::load(&path).unwrap();
        assert_eq!(loaded, ledger);
        assert_eq!(
            loaded.get(512),
            Some(&AssetProgress { slices_written: 2, words_written: 512, total_slices: 3, finalized: false })
        );
        assert!(loaded.is_finalized(1 << 63));
        assert_eq!(loaded.incomplete().map(|(id, _)| id).collect::<Vec<_>>(), vec![512]);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let ledger = ProgressLedger::load(dir.path().join("none.json")).unwrap();
        assert!(ledger.is_empty());
    }
}
