//! Bit-field packing of trait selections.
//!
//! A [`TraitSchema`] assigns every trait category a disjoint bit field inside
//! the low 60 bits of a `u64`. Selecting option `i` of a category stores
//! `i + 1` in that field; a zero field means the category is absent. Option 0
//! is the "absence" option by convention and is never stored.
//!
//! ```text
//!  63    60 59                                                         0
//! +--------+-----------------------------------------------------------+
//! | unused | Right_Hand | Outfit | ... | Choker | Both_Hands | Body     |
//! +--------+-----------------------------------------------------------+
//! ```
//!
//! Identifiers at or above [`AUXILIARY_ID_BASE`] are reserved for assets that
//! belong to no category (fonts, audio) and are never decoded.

mod schema;
mod selection;

pub use schema::*;
pub use selection::*;

use thiserror::Error;

/// Number of low bits available to packed trait fields.
pub const PACKED_ID_BITS: u32 = 60;

/// Exclusive upper bound of the packed trait identifier range.
pub const PACKED_ID_LIMIT: u64 = 1 << PACKED_ID_BITS;

/// First identifier of the auxiliary range.
pub const AUXILIARY_ID_BASE: u64 = 1 << 63;

/// Check if an identifier lies in the packed trait range.
#[inline]
pub const fn is_packed_id(id: u64) -> bool {
    id < PACKED_ID_LIMIT
}

/// Check if an identifier lies in the auxiliary range.
#[inline]
pub const fn is_auxiliary_id(id: u64) -> bool {
    id >= AUXILIARY_ID_BASE
}

/// Errors raised by the trait codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Category name has no field in the schema
    #[error("Unknown trait category: {0}")]
    CategoryUnknown(String),

    /// Option index does not fit the category's field
    #[error("Option {option} of category {category} does not fit a {width}-bit field")]
    OptionOutOfRange {
        category: String,
        option: u32,
        width: u32,
    },

    /// Field layout is inconsistent
    #[error("Invalid trait schema: {0}")]
    InvalidSchema(String),

    /// Identifier is outside the packed trait range
    #[error("Identifier {0:#x} is not a packed trait identifier")]
    NotPackedId(u64),
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
