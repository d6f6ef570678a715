//! Load configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use trait_pack::{is_auxiliary_id, TraitSchema};

use crate::catalogue::Catalogue;
use crate::codec::{BEST_LEVEL, WORDS_PER_WRITE, WORD_WIDTH};
use crate::store::{JournalOptions, WriteCost};
use crate::util::{Error, Result};

/// An asset outside the trait categories (font, audio, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryAsset {
    pub path: PathBuf,
    /// Identifier in the auxiliary range (`>= 2^63`).
    pub id: u64,
}

/// Settings for populating a store, read from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    // Storage
    pub journal: PathBuf,
    pub word_width: usize,
    pub words_per_write: usize,
    pub sync_writes: bool,
    pub cost: WriteCost,

    // Catalogue
    pub catalogue: Option<PathBuf>,
    /// Custom field layout; the ten-category character schema when absent.
    pub schema: Option<TraitSchema>,
    pub layers_dir: PathBuf,
    pub layer_extension: String,
    pub auxiliary: Vec<AuxiliaryAsset>,

    // Loading
    pub compression_level: u32,
    pub parallel: bool,
    /// Where load progress is saved after every landed write.
    pub progress_file: Option<PathBuf>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            journal: PathBuf::from("assets.lvj"),
            word_width: WORD_WIDTH,
            words_per_write: WORDS_PER_WRITE,
            sync_writes: false,
            cost: WriteCost::default(),
            catalogue: None,
            schema: None,
            layers_dir: PathBuf::from("layers"),
            layer_extension: "png".to_string(),
            auxiliary: Vec::new(),
            compression_level: BEST_LEVEL,
            parallel: false,
            progress_file: None,
        }
    }
}

impl VaultConfig {
    /// Read a config file. Relative paths resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let mut config: Self = serde_json::from_str(&json)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Make every relative path relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.journal);
        resolve(&mut self.layers_dir);
        if let Some(p) = self.catalogue.as_mut() {
            resolve(p);
        }
        if let Some(p) = self.progress_file.as_mut() {
            resolve(p);
        }
        for aux in &mut self.auxiliary {
            resolve(&mut aux.path);
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.word_width == 0 || self.word_width > u16::MAX as usize {
            return Err(Error::InvalidWordWidth(self.word_width));
        }
        if self.words_per_write == 0 {
            return Err(Error::config("words_per_write must be at least 1"));
        }
        if self.compression_level > BEST_LEVEL {
            return Err(Error::config(format!(
                "compression_level {} exceeds {}",
                self.compression_level, BEST_LEVEL
            )));
        }
        if let Some(aux) = self.auxiliary.iter().find(|a| !is_auxiliary_id(a.id)) {
            return Err(Error::InvalidAuxiliaryId(aux.id));
        }
        Ok(())
    }

    /// Trait schema in effect.
    pub fn trait_schema(&self) -> TraitSchema {
        self.schema.clone().unwrap_or_else(TraitSchema::banny)
    }

    /// Load the configured catalogue.
    pub fn load_catalogue(&self) -> Result<Catalogue> {
        let path = self
            .catalogue
            .as_ref()
            .ok_or_else(|| Error::config("no catalogue configured"))?;
        Catalogue::load(self.trait_schema(), path)
    }

    /// Options for opening the configured journal.
    pub fn journal_options(&self) -> JournalOptions {
        JournalOptions {
            word_width: self.word_width,
            sync: self.sync_writes,
            cost: self.cost,
        }
    }
}
