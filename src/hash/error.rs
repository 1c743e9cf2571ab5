//! Hash generator errors.

use thiserror::Error;

/// Result type for hash operations.
pub type HashResult<T> = Result<T, HashError>;

/// Errors raised while configuring or computing content hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// Requested truncation length is outside what the algorithm supports.
    #[error("invalid hash length {length} for {algorithm} (expected {min}..={max})")]
    InvalidLength {
        algorithm: String,
        length: usize,
        min: usize,
        max: usize,
    },

    /// Unrecognized algorithm name.
    #[error("unknown hash algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Dotted field path did not resolve to a value.
    #[error("field '{0}' not found in data")]
    FieldNotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
