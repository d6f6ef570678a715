//! Utility types for layervault.
//!
//! - [`Error`] / [`Result`] - Error handling

mod error;

pub use error::*;
