//! Errors raised while encoding/decoding a persisted layout.

use thiserror::Error;

/// Result alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The buffer ended before a declared field could be read.
    #[error("truncated {field}: needed {needed} bytes, {available} available")]
    Truncated { field: &'static str, needed: usize, available: usize },
    /// A tag byte didn't match any known variant.
    #[error("unrecognised {field} tag: {tag}")]
    UnknownTag { field: &'static str, tag: u8 },
    /// A declared count/shape was internally inconsistent (e.g. `ind` and
    /// `weights` lengths differ).
    #[error("inconsistent layout: {0}")]
    Inconsistent(String),
}
