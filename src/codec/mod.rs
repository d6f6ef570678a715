//! Byte-level codecs: deflate, word chunking and content kinds.
//!
//! - [`chunk`] / [`reconstruct`] - split a buffer into fixed-width words and back
//! - [`deflate`] / [`inflate`] - raw deflate for compressible kinds
//! - [`ContentKind`] - media type and compression policy per asset

mod chunk;
mod compression;
mod content;

pub use chunk::*;
pub use compression::{deflate, inflate, BEST_LEVEL};
pub use content::ContentKind;
