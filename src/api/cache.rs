//! Cache handle: opens the configured backend and wires the services.

use std::sync::Arc;

use tracing::info;

use crate::api::config::{CacheConfig, StorageMode};
use crate::api::error::ServiceResult;
use crate::archive::ArchiveService;
use crate::cache::{CacheService, Namespace, StoreOptions};
use crate::storage::{ByteStore, GitStore, LocalDiskStore, MemoryStore};

/// An open cache.
///
/// Cheap to clone; every clone shares the same backend and index locks.
#[derive(Clone)]
pub struct Cache {
    config: CacheConfig,
    service: CacheService,
    archive: ArchiveService,
}

impl Cache {
    /// Open the backend named by `config`, creating it if missing.
    pub fn open(config: CacheConfig) -> ServiceResult<Self> {
        let store: Arc<dyn ByteStore> = match config.storage_mode {
            StorageMode::Memory => Arc::new(MemoryStore::new()),
            StorageMode::LocalDisk => Arc::new(LocalDiskStore::open(&config.local_disk_path)?),
            StorageMode::Git => Arc::new(GitStore::open_or_init(&config.git_path)?),
        };
        info!(
            mode = %config.storage_mode,
            backend = store.name(),
            hash = %config.hash.algorithm(),
            hash_length = config.hash.length(),
            "opened cache"
        );
        Ok(Self::with_store(config, store))
    }

    /// Wire services over an existing store.
    pub fn with_store(config: CacheConfig, store: Arc<dyn ByteStore>) -> Self {
        let service = CacheService::with_config(store, config.hash, config.cache_ttl_hours);
        let archive = ArchiveService::new(service.clone());
        Self {
            config,
            service,
            archive,
        }
    }

    /// In-memory cache with default settings.
    pub fn in_memory() -> Self {
        Self::with_store(CacheConfig::memory(), Arc::new(MemoryStore::new()))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn service(&self) -> &CacheService {
        &self.service
    }

    pub fn archive(&self) -> &ArchiveService {
        &self.archive
    }

    /// Store options with the configured defaults, in `namespace` if given.
    pub fn options(&self, namespace: Option<Namespace>) -> StoreOptions {
        StoreOptions::new(namespace.unwrap_or_else(|| self.config.default_namespace.clone()))
            .strategy(self.config.default_strategy)
    }
}
