//! # layervault
//!
//! Storage of large immutable binary assets (layer images, fonts, audio)
//! behind a write primitive that only accepts small fixed-width words.
//!
//! Assets are keyed by a compact integer: either a packed trait identifier
//! built from independent category choices (see [`trait_pack`]), or an
//! auxiliary identifier at or above `2^63`.
//!
//! ## Modules
//!
//! - [`util`] - Errors
//! - [`codec`] - Word chunking, raw deflate, content kinds
//! - [`store`] - The [`AssetStore`](store::AssetStore) write protocol, in memory or journaled
//! - [`catalogue`] - Trait categories bound to a schema
//! - [`config`] - JSON load configuration
//! - [`loader`] - Bulk, resumable population of a store
//!
//! ## Example
//!
//! ```ignore
//! use layervault::prelude::*;
//!
//! let store = JournalStore::open("assets.lvj")?;
//! let loader = Loader::new(&store, VaultConfig::default())?;
//! let id = TraitSchema::banny().single_category_id("Choker", 1)?;
//! loader.load_file("layers/Choker/Choker.png", id)?;
//!
//! let png = store.read_content(id)?;
//! println!("{}", png.data_uri());
//! ```

pub mod util;
pub mod codec;
pub mod store;
pub mod catalogue;
pub mod config;
pub mod loader;

pub use trait_pack;

// Re-export commonly used types
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result};
    pub use crate::codec::{chunk, reconstruct, ChunkedAsset, ContentKind, Encoding, Word, WORD_WIDTH};
    pub use crate::store::{AssetRecord, AssetStatus, AssetStore, ContentTag, JournalStore, MemoryStore, Nonce};
    pub use crate::catalogue::Catalogue;
    pub use crate::config::VaultConfig;
    pub use crate::loader::{Loader, LoadReport, ProgressLedger};
    pub use trait_pack::{TraitSchema, TraitSelection, AUXILIARY_ID_BASE};
}
