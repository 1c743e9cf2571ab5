//! Service-level errors.

use thiserror::Error;

use crate::cache::CacheError;
use crate::hash::HashError;
use crate::storage::StorageError;

/// Result type for the service facade.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// user-correctable input or configuration problem
    pub fn is_invalid_input(&self) -> bool {
        match self {
            Self::Cache(e) => e.is_invalid_input(),
            Self::Storage(StorageError::InvalidPath(_)) => true,
            Self::Hash(_) | Self::InvalidConfig(_) => true,
            Self::Storage(_) | Self::Io(_) | Self::Serialization(_) => false,
        }
    }
}
