//! Bulk population of an asset store.
//!
//! For every asset the loader chunks the file, then drives the store through
//! `create`, `append`* and `finalize`, recording each landed operation in a
//! [`ProgressLedger`]. A failed write stops that asset with
//! [`Error::WriteFailed`]; nothing is retried. Running again with the same
//! ledger resumes at the first slice that did not land, after checking that
//! the words already stored are a prefix of the freshly chunked source.

mod progress;
mod report;

pub use progress::{AssetProgress, ProgressLedger};
pub use report::{format_duration, AssetReport, LoadReport};

use std::path::{Path, PathBuf};
use std::time::Instant;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, info, info_span};
use trait_pack::is_auxiliary_id;

use crate::catalogue::{layer_path, Catalogue};
use crate::codec::{self, ChunkedAsset, ContentKind, Word};
use crate::config::VaultConfig;
use crate::store::{AssetStore, ContentTag, Nonce};
use crate::util::{Error, Result};

/// One file to load under one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJob {
    pub id: u64,
    pub path: PathBuf,
}

/// Where a resumed asset picks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    /// Next slice to send.
    At(usize),
    /// The store already sealed the asset; only the ledger is behind.
    Sealed,
}

/// Drives an [`AssetStore`] through the write protocol.
pub struct Loader<'a, S: AssetStore + ?Sized> {
    store: &'a S,
    config: VaultConfig,
    ledger: Mutex<ProgressLedger>,
}

impl<'a, S: AssetStore + ?Sized> Loader<'a, S> {
    /// Create a loader. The ledger is read from `progress_file` if one is set.
    pub fn new(store: &'a S, config: VaultConfig) -> Result<Self> {
        config.validate()?;
        let ledger = match &config.progress_file {
            Some(path) => ProgressLedger::load(path)?,
            None => ProgressLedger::new(),
        };
        Ok(Self { store, config, ledger: Mutex::new(ledger) })
    }

    /// Replace the in-memory ledger.
    pub fn with_ledger(self, ledger: ProgressLedger) -> Self {
        *self.ledger.lock() = ledger;
        self
    }

    /// Snapshot of the progress recorded so far.
    pub fn ledger(&self) -> ProgressLedger {
        self.ledger.lock().clone()
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Layer files of every stored option, in catalogue order.
    pub fn layer_jobs(&self, catalogue: &Catalogue) -> Result<Vec<LoadJob>> {
        let mut jobs = Vec::with_capacity(catalogue.stored_option_count());
        for category in catalogue.categories() {
            for (index, option) in category.stored_options() {
                jobs.push(LoadJob {
                    id: catalogue.schema().single_category_id(&category.name, index)?,
                    path: layer_path(
                        &self.config.layers_dir,
                        &category.name,
                        option,
                        &self.config.layer_extension,
                    ),
                });
            }
        }
        Ok(jobs)
    }

    /// Load every layer image one asset after another.
    pub fn load_layers(&self, catalogue: &Catalogue) -> Result<LoadReport> {
        let start = Instant::now();
        let jobs = self.layer_jobs(catalogue)?;
        info!(assets = jobs.len(), "loading layers");

        let mut report = LoadReport::default();
        for job in &jobs {
            report.assets.push(self.load_file(&job.path, job.id)?);
        }
        report.elapsed = start.elapsed();
        Ok(report)
    }

    /// Load every layer image, several assets at a time.
    ///
    /// Writes of one asset stay in order; only distinct ids run in parallel.
    pub fn load_layers_parallel(&self, catalogue: &Catalogue) -> Result<LoadReport> {
        let start = Instant::now();
        let jobs = self.layer_jobs(catalogue)?;
        info!(assets = jobs.len(), threads = rayon::current_num_threads(), "loading layers");

        let assets = jobs
            .par_iter()
            .map(|job| self.load_file(&job.path, job.id))
            .collect::<Result<Vec<_>>>()?;
        Ok(LoadReport { assets, elapsed: start.elapsed() })
    }

    /// Load one asset that belongs to no trait category.
    pub fn load_auxiliary(&self, path: impl AsRef<Path>, id: u64) -> Result<AssetReport> {
        if !is_auxiliary_id(id) {
            return Err(Error::InvalidAuxiliaryId(id));
        }
        self.load_file(path, id)
    }

    /// Load every auxiliary asset listed in the config.
    pub fn load_configured_auxiliary(&self) -> Result<LoadReport> {
        let start = Instant::now();
        let mut report = LoadReport::default();
        for aux in &self.config.auxiliary {
            report.assets.push(self.load_auxiliary(&aux.path, aux.id)?);
        }
        report.elapsed = start.elapsed();
        Ok(report)
    }

    /// Read a file and load it under `id`.
    pub fn load_file(&self, path: impl AsRef<Path>, id: u64) -> Result<AssetReport> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let mut report = self.load_bytes(id, &bytes, ContentKind::from_path(path))?;
        report.path = Some(path.to_path_buf());
        Ok(report)
    }

    /// Chunk `bytes` and write them under `id`, resuming from the ledger.
    pub fn load_bytes(&self, id: u64, bytes: &[u8], kind: ContentKind) -> Result<AssetReport> {
        let _span = info_span!("load_asset", id = format_args!("{id:#x}")).entered();
        let mut report = AssetReport::new(id, None, kind);
        report.bytes = bytes.len() as u64;

        let level = kind.is_compressible().then_some(self.config.compression_level);
        let chunked = codec::chunk_with_level(bytes, self.store.word_width(), level)?;
        let slices = chunked.write_slices(self.config.words_per_write);
        report.stored_bytes = chunked.total_length;

        let tag = ContentTag { kind, encoding: chunked.encoding };
        let progress = self.ledger.lock().get(id).cloned();
        let first = match progress {
            Some(p) if p.finalized => {
                debug!("already finalized, skipping");
                report.skipped = true;
                return Ok(report);
            }
            Some(p) => match self.check_resume(id, &p, &chunked, &slices, tag)? {
                Resume::Sealed => {
                    info!("sealed in the store but not in the ledger, skipping");
                    self.update_ledger(|ledger| ledger.record_finalized(id))?;
                    report.skipped = true;
                    return Ok(report);
                }
                Resume::At(slice) => {
                    info!(slice, of = slices.len(), "resuming");
                    slice
                }
            },
            None => 0,
        };
        report.resumed_from = first;

        for (index, slice) in slices.iter().enumerate().skip(first) {
            let written = if index == 0 {
                self.store.create_asset(id, Nonce::new(), slice, chunked.total_length)
            } else {
                self.store.append_asset_content(id, Nonce::new(), slice)
            };
            let receipt = written.map_err(|e| Error::write_failed(id, index, e))?;
            report.add(receipt);
            self.update_ledger(|ledger| ledger.record_slice(id, slice.len(), slices.len()))?;
        }

        let receipt = self
            .store
            .finalize(id, Nonce::new(), chunked.words.len() as u64, tag)
            .map_err(|e| Error::write_failed(id, slices.len(), e))?;
        report.add(receipt);
        self.update_ledger(|ledger| ledger.record_finalized(id))?;

        info!(
            kind = %kind,
            bytes = report.bytes,
            stored = report.stored_bytes,
            words = chunked.words.len(),
            cost = report.cost,
            "asset loaded"
        );
        Ok(report)
    }

    /// Make sure the store holds exactly what the ledger says landed, and
    /// that it is the start of `chunked`.
    fn check_resume(
        &self,
        id: u64,
        progress: &AssetProgress,
        chunked: &ChunkedAsset,
        slices: &[&[Word]],
        tag: ContentTag,
    ) -> Result<Resume> {
        let record = match self.store.read_asset(id) {
            Ok(record) => Some(record),
            Err(Error::UnknownAsset(_)) => None,
            Err(e) => return Err(e),
        };

        if let Some(record) = &record {
            let mismatch = |reason: String| Error::ContentMismatch { id, reason };
            if record.total_length != chunked.total_length {
                return Err(mismatch(format!(
                    "stored stream is {} bytes, source chunks to {}",
                    record.total_length, chunked.total_length
                )));
            }
            if record.words.len() > chunked.words.len() {
                return Err(mismatch(format!(
                    "store holds {} words, source has {}",
                    record.words.len(),
                    chunked.words.len()
                )));
            }
            if let Some(index) = record.words.iter().zip(&chunked.words).position(|(a, b)| a != b) {
                return Err(mismatch(format!("word {} differs", index)));
            }
            if let Some(sealed) = record.tag() {
                if sealed != tag {
                    return Err(mismatch("sealed with a different content tag".into()));
                }
                return Ok(Resume::Sealed);
            }
        }

        let stored_words = record.map_or(0, |r| r.words.len() as u64);
        let next = progress.next_slice();
        let landed: u64 = slices
            .get(..next)
            .map_or(u64::MAX, |done| done.iter().map(|s| s.len() as u64).sum());
        if stored_words != progress.words_written
            || progress.total_slices != slices.len()
            || landed != progress.words_written
        {
            return Err(Error::ProgressMismatch {
                id,
                ledger_words: progress.words_written,
                stored_words,
            });
        }
        Ok(Resume::At(next))
    }

    /// Apply a change to the ledger and persist it if configured.
    fn update_ledger(&self, change: impl FnOnce(&mut ProgressLedger)) -> Result<()> {
        let mut ledger = self.ledger.lock();
        change(&mut ledger);
        if let Some(path) = &self.config.progress_file {
            ledger.save(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use trait_pack::{TraitSchema, AUXILIARY_ID_BASE};

    fn small_config() -> VaultConfig {
        VaultConfig { words_per_write: 2, ..Default::default() }
    }

    #[test]
    fn test_load_bytes_slices() {
        let store = MemoryStore::new();
        let loader = Loader::new(&store, small_config()).unwrap();
        let data: Vec<u8> = (0..160).collect();

        let report = loader.load_bytes(0x200, &data, ContentKind::RasterImage).unwrap();
        // 5 words in slices of 2: create + 2 appends + finalize
        assert_eq!(report.operations, 4);
        assert_eq!(report.words, 5);
        assert_eq!(store.read_content(0x200).unwrap().bytes, data);
        assert!(loader.ledger().is_finalized(0x200));
    }

    #[test]
    fn test_vector_images_are_deflated() {
        let store = MemoryStore::new();
        let loader = Loader::new(&store, VaultConfig::default()).unwrap();
        let svg = b"<svg><g><rect x=\"0\" y=\"0\" width=\"4\" height=\"4\"/></g></svg>".repeat(50);

        let report = loader.load_bytes(3, &svg, ContentKind::VectorImage).unwrap();
        assert!(report.stored_bytes < report.bytes);

        let content = store.read_content(3).unwrap();
        assert_eq!(content.kind, ContentKind::VectorImage);
        assert_eq!(content.bytes, svg);
    }

    #[test]
    fn test_finalized_assets_are_skipped() {
        let store = MemoryStore::new();
        let loader = Loader::new(&store, VaultConfig::default()).unwrap();
        loader.load_bytes(1, b"abc", ContentKind::Binary).unwrap();

        let again = loader.load_bytes(1, b"abc", ContentKind::Binary).unwrap();
        assert!(again.skipped);
        assert_eq!(again.operations, 0);
    }

    #[test]
    fn test_auxiliary_range_enforced() {
        let store = MemoryStore::new();
        let loader = Loader::new(&store, VaultConfig::default()).unwrap();
        assert!(matches!(
            loader.load_auxiliary("font.woff", 512),
            Err(Error::InvalidAuxiliaryId(512))
        ));
        assert!(matches!(
            loader.load_auxiliary("/nonexistent/font.woff", AUXILIARY_ID_BASE + 1),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_layer_jobs() {
        let store = MemoryStore::new();
        let config = VaultConfig { layers_dir: PathBuf::from("layers"), ..Default::default() };
        let loader = Loader::new(&store, config).unwrap();
        let catalogue = Catalogue::from_json(
            TraitSchema::banny(),
            r#"{"Choker": ["Nothing", "Choker"], "Body": ["Yellow", "Green"]}"#,
        )
        .unwrap();

        let jobs = loader.layer_jobs(&catalogue).unwrap();
        assert_eq!(
            jobs,
            vec![
                LoadJob { id: 2 << 8, path: PathBuf::from("layers/Choker/Choker.png") },
                LoadJob { id: 2, path: PathBuf::from("layers/Body/Green.png") },
            ]
        );
    }

    #[test]
    fn test_resume_detects_mismatch() {
        let store = MemoryStore::new();
        let mut ledger = ProgressLedger::new();
        // Ledger claims one slice landed but the store never saw it.
        ledger.record_slice(9, 2, 3);
        let loader = Loader::new(&store, small_config()).unwrap().with_ledger(ledger);

        let err = loader.load_bytes(9, &[1u8; 160], ContentKind::Binary).unwrap_err();
        assert!(matches!(
            err,
            Error::ProgressMismatch { id: 9, ledger_words: 2, stored_words: 0 }
        ));
    }

    /// Store and ledger agree that the first slice of `data` landed.
    fn half_loaded(data: &[u8]) -> (MemoryStore, ProgressLedger) {
        let store = MemoryStore::new();
        let chunked = codec::chunk(data, store.word_width(), false).unwrap();
        let slices = chunked.write_slices(2);
        store.create_asset(9, Nonce::new(), slices[0], chunked.total_length).unwrap();
        let mut ledger = ProgressLedger::new();
        ledger.record_slice(9, slices[0].len(), slices.len());
        (store, ledger)
    }

    #[test]
    fn test_resume_rejects_changed_source() {
        let (store, ledger) = half_loaded(&[1u8; 160]);
        let loader = Loader::new(&store, small_config()).unwrap().with_ledger(ledger);

        let err = loader.load_bytes(9, &[2u8; 160], ContentKind::Binary).unwrap_err();
        assert!(matches!(err, Error::ContentMismatch { id: 9, .. }));

        // Nothing of the new version was appended.
        let record = store.read_asset(9).unwrap();
        assert_eq!(record.words.len(), 2);
        assert!(!record.is_sealed());
    }

    #[test]
    fn test_resume_rejects_resized_source() {
        // 170 bytes still needs 3 slices of 2 words.
        let (store, ledger) = half_loaded(&[1u8; 160]);
        let loader = Loader::new(&store, small_config()).unwrap().with_ledger(ledger);

        let err = loader.load_bytes(9, &[1u8; 170], ContentKind::Binary).unwrap_err();
        assert!(matches!(err, Error::ContentMismatch { id: 9, .. }));
    }

    #[test]
    fn test_resume_with_same_source_completes() {
        let data = [1u8; 160];
        let (store, ledger) = half_loaded(&data);
        let loader = Loader::new(&store, small_config()).unwrap().with_ledger(ledger);

        let report = loader.load_bytes(9, &data, ContentKind::Binary).unwrap();
        assert_eq!(report.resumed_from, 1);
        assert_eq!(store.read_content(9).unwrap().bytes, data);
    }

    #[test]
    fn test_resume_rejects_changed_slice_size() {
        // 5 words: the ledger saw one slice of 2, slices of 3 would skip a word.
        let (store, ledger) = half_loaded(&[1u8; 160]);
        let config = VaultConfig { words_per_write: 3, ..Default::default() };
        let loader = Loader::new(&store, config).unwrap().with_ledger(ledger);

        let err = loader.load_bytes(9, &[1u8; 160], ContentKind::Binary).unwrap_err();
        assert!(matches!(err, Error::ProgressMismatch { id: 9, .. }));
    }
}
