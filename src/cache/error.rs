//! Cache engine error types.

use thiserror::Error;

use crate::cache::types::InvalidNameError;
use crate::hash::HashError;
use crate::storage::StorageError;
use crate::strategy::UnknownStrategyError;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by the content store and archive engine.
///
/// Expected outcomes (missing versions, partial deletes, failed archive
/// operations) are returned as values, not errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Byte store failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    /// A required argument is missing or unusable.
    #[error("invalid input for '{field}': {reason}")]
    InvalidInput { field: String, reason: String },

    /// Payload is not a readable zip archive.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    #[error(transparent)]
    UnknownStrategy(#[from] UnknownStrategyError),

    /// Invalid id, hash, namespace or key.
    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// A caller-supplied version id is already in use.
    #[error("cache id already exists in namespace {namespace}: {cache_id}")]
    AlreadyExists { namespace: String, cache_id: String },

    /// An index record is unreadable or points nowhere.
    #[error("corrupted index at {path}: {reason}")]
    CorruptedIndex { path: String, reason: String },

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CacheError {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// user-correctable input problem
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::InvalidName(_)
                | Self::InvalidArchive(_)
                | Self::AlreadyExists { .. }
                | Self::Hash(HashError::FieldNotFound(_))
        )
    }

    /// caller or configuration bug, never worth retrying
    pub fn is_programmer_error(&self) -> bool {
        matches!(self, Self::UnknownStrategy(_) | Self::Hash(HashError::InvalidLength { .. }))
    }
}

impl From<zip::result::ZipError> for CacheError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::InvalidArchive(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(CacheError::invalid_input("cache_hash", "required").is_invalid_input());
        assert!(CacheError::InvalidArchive("bad".into()).is_invalid_input());

        let unknown: CacheError = UnknownStrategyError("sharded".into()).into();
        assert!(unknown.is_programmer_error());
        assert!(!unknown.is_invalid_input());

        let storage: CacheError = StorageError::Internal("x".into()).into();
        assert!(!storage.is_invalid_input());
        assert!(!storage.is_programmer_error());
    }
}
