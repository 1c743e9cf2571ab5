//! Service configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::api::error::{ServiceError, ServiceResult};
use crate::cache::{Namespace, DEFAULT_TTL_HOURS};
use crate::hash::{HashAlgorithm, HashConfig};
use crate::strategy::StorageStrategy;

/// Environment variable prefix for every setting.
pub const ENV_PREFIX: &str = "CACHE__SERVICE__";

/// Which byte store backs the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageMode {
    Memory,
    #[default]
    LocalDisk,
    Git,
}

impl StorageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::LocalDisk => "local_disk",
            Self::Git => "git",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageMode {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "local_disk" | "local-disk" | "disk" => Ok(Self::LocalDisk),
            "git" => Ok(Self::Git),
            other => Err(ServiceError::invalid_config(format!("unknown storage mode '{}'", other))),
        }
    }
}

/// Cache service configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub storage_mode: StorageMode,
    /// Root directory for `local_disk`.
    pub local_disk_path: PathBuf,
    /// Repository directory for `git`.
    pub git_path: PathBuf,
    pub default_namespace: Namespace,
    pub default_strategy: StorageStrategy,
    pub hash: HashConfig,
    /// Declared retention. Nothing expires.
    pub cache_ttl_hours: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::default(),
            local_disk_path: PathBuf::from(".cachedb"),
            git_path: PathBuf::from(".cachedb-git"),
            default_namespace: Namespace::default(),
            default_strategy: StorageStrategy::default(),
            hash: HashConfig::default(),
            cache_ttl_hours: DEFAULT_TTL_HOURS,
        }
    }
}

impl CacheConfig {
    /// In-memory configuration, mostly for tests.
    pub fn memory() -> Self {
        Self {
            storage_mode: StorageMode::Memory,
            ..Default::default()
        }
    }

    /// Local-disk configuration rooted at `path`.
    pub fn local_disk(path: impl Into<PathBuf>) -> Self {
        Self {
            storage_mode: StorageMode::LocalDisk,
            local_disk_path: path.into(),
            ..Default::default()
        }
    }

    /// Git-backed configuration at `path`.
    pub fn git(path: impl Into<PathBuf>) -> Self {
        Self {
            storage_mode: StorageMode::Git,
            git_path: path.into(),
            ..Default::default()
        }
    }

    pub fn storage_mode(mut self, mode: StorageMode) -> Self {
        self.storage_mode = mode;
        self
    }

    pub fn local_disk_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_disk_path = path.into();
        self
    }

    pub fn git_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.git_path = path.into();
        self
    }

    pub fn default_namespace(mut self, namespace: Namespace) -> Self {
        self.default_namespace = namespace;
        self
    }

    pub fn default_strategy(mut self, strategy: StorageStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn hash(mut self, hash: HashConfig) -> Self {
        self.hash = hash;
        self
    }

    pub fn cache_ttl_hours(mut self, hours: u32) -> Self {
        self.cache_ttl_hours = hours;
        self
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> ServiceResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, keyed by full variable name.
    ///
    /// Unset variables keep their defaults; set but unparsable ones are
    /// errors.
    pub fn from_lookup<F>(lookup: F) -> ServiceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(mode) = get("STORAGE_MODE") {
            config.storage_mode = mode.parse()?;
        }
        if let Some(path) = get("LOCAL_DISK_PATH") {
            config.local_disk_path = PathBuf::from(path);
        }
        if let Some(path) = get("GIT_PATH") {
            config.git_path = PathBuf::from(path);
        }
        if let Some(ns) = get("DEFAULT_NAMESPACE") {
            config.default_namespace =
                Namespace::new(ns).map_err(|e| ServiceError::invalid_config(e.to_string()))?;
        }
        if let Some(strategy) = get("DEFAULT_STRATEGY") {
            config.default_strategy = strategy
                .parse::<StorageStrategy>()
                .map_err(|e| ServiceError::invalid_config(e.to_string()))?;
        }

        let algorithm = match get("HASH_ALGORITHM") {
            Some(name) => name.parse::<HashAlgorithm>()?,
            None => config.hash.algorithm(),
        };
        let length = match get("HASH_LENGTH") {
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                ServiceError::invalid_config(format!("HASH_LENGTH must be a number, got '{}'", raw))
            })?,
            None => config.hash.length(),
        };
        config.hash = HashConfig::new(algorithm, length)?;

        if let Some(raw) = get("DEFAULT_TTL_HOURS") {
            config.cache_ttl_hours = raw.parse().map_err(|_| {
                ServiceError::invalid_config(format!("DEFAULT_TTL_HOURS must be a number, got '{}'", raw))
            })?;
        }

        Ok(config)
    }
}
