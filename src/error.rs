//! Error types for index construction.

use thiserror::Error;

/// Error variants reported while building an index from a key/value list.
///
/// Queries never fail; a missing key is reported as `None` by the query
/// surface, not as an error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The key and value slices have different lengths.
    #[error("key/value length mismatch: {keys} keys vs {values} values")]
    KeyValueLenMismatch {
        /// Number of keys supplied.
        keys: usize,
        /// Number of values supplied.
        values: usize,
    },

    /// Two adjacent keys are equal. Keys must be unique.
    #[error("duplicate key at index {0}")]
    DuplicateKey(usize),

    /// A key sorts before its predecessor. Keys must be in ascending order.
    #[error("key out of order at index {0}")]
    KeyOutOfOrder(usize),
}

/// A specialized Result type for index construction.
pub type Result<T> = std::result::Result<T, Error>;
