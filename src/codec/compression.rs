//! Raw deflate support for compressible assets.
//!
//! Streams carry no zlib header or trailer; the inflated length is recorded
//! separately in the asset's content tag.

use std::io::{Read, Write};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::util::{Error, Result};

/// Highest deflate level, used for vector images by default.
pub const BEST_LEVEL: u32 = 9;

/// Compress data with raw deflate.
///
/// # Arguments
/// * `data` - Data to compress
/// * `level` - Compression level (0-9, where 0 stores blocks uncompressed, 9 is max)
pub fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level.min(BEST_LEVEL)));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inflate a raw deflate stream.
///
/// When `expected_len` is given the output must have exactly that length.
/// The length is only trusted as a bound: at most one byte past it is read,
/// and preallocation is capped by the input size.
pub fn inflate(data: &[u8], expected_len: Option<u64>) -> Result<Vec<u8>> {
    let guess = data.len().saturating_mul(4);
    let capacity = match expected_len {
        Some(expected) => usize::try_from(expected).map_or(guess, |e| e.min(guess)),
        None => guess,
    };
    let mut inflated = Vec::with_capacity(capacity);

    let mut decoder = DeflateDecoder::new(data);
    let read = match expected_len {
        Some(expected) => decoder.take(expected.saturating_add(1)).read_to_end(&mut inflated),
        None => decoder.read_to_end(&mut inflated),
    };
    read.map_err(|e| Error::DecompressionFailed(e.to_string()))?;

    if let Some(expected) = expected_len {
        if inflated.len() as u64 != expected {
            return Err(Error::DecompressionFailed(format!(
                "inflated {} bytes, expected {}",
                inflated.len(),
                expected
            )));
        }
    }

    Ok(inflated)
}
