//! Index and sidecar records, as persisted in the byte store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheHash, CacheId, ContentEncoding, ContentKind, Namespace, SemanticKey};
use crate::strategy::StorageStrategy;

/// One version recorded under a hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashEntry {
    pub cache_id: CacheId,
    pub timestamp: DateTime<Utc>,
}

/// Hash index entry: every version stored with a given content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashReference {
    pub cache_hash: CacheHash,
    /// insertion order is version history
    pub cache_ids: Vec<HashEntry>,
    pub latest_id: Option<CacheId>,
    pub total_versions: usize,
}

impl HashReference {
    pub fn new(cache_hash: CacheHash) -> Self {
        Self {
            cache_hash,
            cache_ids: Vec::new(),
            latest_id: None,
            total_versions: 0,
        }
    }

    /// Append a version and make it the latest.
    pub fn append(&mut self, cache_id: CacheId, timestamp: DateTime<Utc>) {
        self.cache_ids.push(HashEntry {
            cache_id: cache_id.clone(),
            timestamp,
        });
        self.latest_id = Some(cache_id);
        self.total_versions += 1;
    }

    /// Remove a version. The latest id becomes the new tail.
    ///
    /// Returns false if the id was not listed.
    pub fn remove(&mut self, cache_id: &CacheId) -> bool {
        let before = self.cache_ids.len();
        self.cache_ids.retain(|entry| &entry.cache_id != cache_id);
        if self.cache_ids.len() == before {
            return false;
        }
        self.total_versions = self.total_versions.saturating_sub(before - self.cache_ids.len());
        self.latest_id = self.cache_ids.last().map(|entry| entry.cache_id.clone());
        true
    }

    pub fn contains(&self, cache_id: &CacheId) -> bool {
        self.cache_ids.iter().any(|entry| &entry.cache_id == cache_id)
    }

    pub fn is_empty(&self) -> bool {
        self.cache_ids.is_empty()
    }
}

/// Every physical path written for a version, grouped by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorePaths {
    /// content files plus their `.config` / `.metadata` sidecars
    pub data: Vec<String>,
    pub by_hash: Vec<String>,
    pub by_id: Vec<String>,
}

impl StorePaths {
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.data.iter().chain(&self.by_hash).chain(&self.by_id)
    }
}

/// Id index entry: where one version lives and what it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdReference {
    pub cache_id: CacheId,
    pub cache_hash: CacheHash,
    pub namespace: Namespace,
    pub strategy: StorageStrategy,
    pub content_kind: ContentKind,
    pub file_id: CacheId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_key: Option<SemanticKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<ContentEncoding>,
    /// primary content files, first one is read back
    pub content_paths: Vec<String>,
    pub all_paths: StorePaths,
    pub timestamp: DateTime<Utc>,
}

impl IdReference {
    pub fn primary_path(&self) -> Option<&str> {
        self.content_paths.first().map(String::as_str)
    }
}

/// `.metadata` sidecar written next to each content file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub cache_hash: CacheHash,
    pub cache_id: CacheId,
    pub file_id: CacheId,
    pub namespace: Namespace,
    pub strategy: StorageStrategy,
    pub content_kind: ContentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_key: Option<SemanticKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<ContentEncoding>,
    pub stored_at: DateTime<Utc>,
    pub content_size: usize,
}

/// `.config` sidecar written next to each content file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    pub file_id: CacheId,
    pub content_kind: ContentKind,
    pub extension: String,
    pub strategy: StorageStrategy,
    pub content_paths: Vec<String>,
}
