//! Cost and size reporting for loads.

use std::path::PathBuf;
use std::time::Duration;

use crate::codec::ContentKind;
use crate::store::WriteReceipt;

/// Outcome of loading one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReport {
    pub id: u64,
    pub path: Option<PathBuf>,
    pub kind: ContentKind,
    /// Size of the original file.
    pub bytes: u64,
    /// Size of the chunked stream (after deflate, if any).
    pub stored_bytes: u64,
    /// Words written by this run.
    pub words: usize,
    /// Store operations issued by this run.
    pub operations: usize,
    pub cost: u64,
    /// First slice sent by this run; non-zero when resuming.
    pub resumed_from: usize,
    /// Asset was already finalized and nothing was written.
    pub skipped: bool,
}

impl AssetReport {
    pub(crate) fn new(id: u64, path: Option<PathBuf>, kind: ContentKind) -> Self {
        Self {
            id,
            path,
            kind,
            bytes: 0,
            stored_bytes: 0,
            words: 0,
            operations: 0,
            cost: 0,
            resumed_from: 0,
            skipped: false,
        }
    }

    pub(crate) fn add(&mut self, receipt: WriteReceipt) {
        self.words += receipt.words;
        self.operations += 1;
        self.cost += receipt.cost;
    }
}

/// Outcome of a bulk load.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub assets: Vec<AssetReport>,
    pub elapsed: Duration,
}

impl LoadReport {
    pub fn total_cost(&self) -> u64 {
        self.assets.iter().map(|a| a.cost).sum()
    }

    pub fn total_words(&self) -> usize {
        self.assets.iter().map(|a| a.words).sum()
    }

    pub fn total_operations(&self) -> usize {
        self.assets.iter().map(|a| a.operations).sum()
    }

    /// Assets that were written (not skipped) by this run.
    pub fn loaded(&self) -> usize {
        self.assets.iter().filter(|a| !a.skipped).count()
    }
}

/// Render a duration: milliseconds under 5 s, seconds up to 90 s, then minutes.
pub fn format_duration(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    let secs = elapsed.as_secs_f64();
    if secs < 5.0 {
        format!("{}ms", millis)
    } else if secs < 91.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{}m", (secs / 60.0).ceil() as u64)
    }
}
