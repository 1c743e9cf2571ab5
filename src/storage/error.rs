//! Byte store error types
//!
//! All errors that can occur while talking to a physical backend are defined here.
//! We use `thiserror` for ergonomic error definition and better error messages

use thiserror::Error;

use crate::storage::types::InvalidPathError;

/// the main error type for byte store operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// the requested file does not exist in the backend
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// the path is not a valid store path
    #[error("invalid path: {0}")]
    InvalidPath(#[from] InvalidPathError),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// invalid UTF-8 in a text file
    #[error("invalid utf-8 in {path}")]
    InvalidUtf8 { path: String },

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if this error indicates the file doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::FileNotFound(_))
    }
}

/// result type alias for byte store operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let not_found = StorageError::FileNotFound("ns/refs/by-id/ab/cd/abcd.json".to_string());
        assert!(not_found.is_not_found());

        let internal = StorageError::Internal("boom".to_string());
        assert!(!internal.is_not_found());
    }
}
