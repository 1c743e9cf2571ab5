//! Service facade: configuration, backend selection and the [`Cache`]
//! handle the CLI drives.

mod cache;
mod config;
mod error;

pub use cache::Cache;
pub use config::{CacheConfig, StorageMode, ENV_PREFIX};
pub use error::{ServiceError, ServiceResult};
