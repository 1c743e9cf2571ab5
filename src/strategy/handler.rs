//! Per-namespace path resolution.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::cache::{CacheHash, CacheId, Namespace, SemanticKey};
use crate::storage::{read_json_as, ByteStore, StorageResult};
use crate::strategy::layout::{layout_for, PathTarget};
use crate::strategy::types::StorageStrategy;

/// Resolves every physical path owned by one namespace.
///
/// Holds no per-request state, so one instance is shared by all callers.
#[derive(Debug, Clone)]
pub struct NamespaceHandler {
    namespace: Namespace,
}

impl NamespaceHandler {
    pub fn new(namespace: Namespace) -> Self {
        Self { namespace }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// `{ns}/data/`
    pub fn data_prefix(&self) -> String {
        format!("{}/data/", self.namespace)
    }

    /// `{ns}/refs/by-hash/`
    pub fn by_hash_prefix(&self) -> String {
        format!("{}/refs/by-hash/", self.namespace)
    }

    /// `{ns}/refs/by-id/`
    pub fn by_id_prefix(&self) -> String {
        format!("{}/refs/by-id/", self.namespace)
    }

    /// `{ns}/data/{slug}`
    pub fn strategy_root(&self, strategy: StorageStrategy) -> String {
        format!("{}/data/{}", self.namespace, strategy.slug())
    }

    /// `{ns}/refs/by-hash/{h[0:2]}/{h[2:4]}/{hash}.json`
    pub fn hash_ref_path(&self, hash: &CacheHash) -> String {
        format!("{}{}/{}.json", self.by_hash_prefix(), hash.shard(), hash)
    }

    /// `{ns}/refs/by-id/{id[0:2]}/{id[2:4]}/{id}.json`
    pub fn id_ref_path(&self, id: &CacheId) -> String {
        format!("{}{}/{}.json", self.by_id_prefix(), id.shard(), id)
    }

    /// Content paths for a new version, primary path first.
    ///
    /// For `temporal_versioned` the next version number comes from the
    /// file's `latest/` config sidecar. Callers storing the same file id
    /// concurrently must serialize around this and the writes.
    pub fn content_paths(
        &self,
        store: &dyn ByteStore,
        strategy: StorageStrategy,
        file_id: &CacheId,
        semantic_key: Option<&SemanticKey>,
        ext: &str,
        timestamp: DateTime<Utc>,
    ) -> StorageResult<Vec<String>> {
        let layout = layout_for(strategy);
        let base = self.strategy_root(strategy);
        let version = if layout.uses_versions() {
            self.next_version(store, &base, file_id, ext)?
        } else {
            0
        };

        let target = PathTarget {
            file_id,
            semantic_key,
            ext,
            timestamp,
            version,
        };
        Ok(layout.content_paths(&base, &target))
    }

    fn next_version(
        &self,
        store: &dyn ByteStore,
        base: &str,
        file_id: &CacheId,
        ext: &str,
    ) -> StorageResult<u32> {
        let prefix = format!("{}/versions/", base);
        let file_name = format!("{}.{}", file_id, ext);
        let version_of = |path: &str| -> Option<u32> {
            let (dir, name) = path.strip_prefix(&prefix)?.split_once('/')?;
            if name != file_name {
                return None;
            }
            dir.strip_prefix('v')?.parse::<u32>().ok()
        };

        let latest = config_path(&format!("{}/latest/{}", base, file_name));
        if let Some(record) = read_json_as::<LatestRecord>(store, &latest)? {
            if let Some(current) = record.content_paths.iter().find_map(|p| version_of(p)) {
                return Ok(current + 1);
            }
        }

        // the latest pointer goes away with its version; fall back to a scan
        let highest = store
            .list_under(&prefix)?
            .iter()
            .filter_map(|path| version_of(path))
            .max()
            .unwrap_or(0);
        Ok(highest + 1)
    }
}

/// The part of a `.config` sidecar version numbering reads.
#[derive(Deserialize)]
struct LatestRecord {
    content_paths: Vec<String>,
}

/// sidecar config file for a content path
pub fn config_path(content_path: &str) -> String {
    format!("{}.config", content_path)
}

/// sidecar metadata file for a content path
pub fn metadata_path(content_path: &str) -> String {
    format!("{}.metadata", content_path)
}
