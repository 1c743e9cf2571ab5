//! Reference index engine.
//!
//! Two indices per namespace:
//!
//! - by-hash: content hash -> ordered versions and the latest id
//! - by-id: version id -> paths, strategy, kind
//!
//! Hash entries are shared by every version with the same content, so their
//! read-modify-write is serialized per `(namespace, hash)`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cache::{CacheHash, CacheId};
use crate::index::locks::KeyedLocks;
use crate::index::types::{HashReference, IdReference};
use crate::storage::{read_json_as, save_json, ByteStore, StorageResult};
use crate::strategy::NamespaceHandler;

/// Result of removing a version from its hash entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detached {
    /// no hash entry, or the id was not listed in it
    NotListed,
    /// other versions remain; the entry was rewritten
    Updated { path: String, latest_id: Option<CacheId> },
    /// the list became empty and the entry file was deleted
    Removed { path: String, deleted: bool },
}

/// Reads and writes both reference indices through a byte store.
#[derive(Clone)]
pub struct ReferenceIndex {
    store: Arc<dyn ByteStore>,
    locks: Arc<KeyedLocks>,
}

impl ReferenceIndex {
    pub fn new(store: Arc<dyn ByteStore>) -> Self {
        Self {
            store,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ByteStore> {
        &self.store
    }

    pub fn load_hash_ref(
        &self,
        handler: &NamespaceHandler,
        hash: &CacheHash,
    ) -> StorageResult<Option<HashReference>> {
        read_json_as(self.store.as_ref(), &handler.hash_ref_path(hash))
    }

    pub fn load_id_ref(
        &self,
        handler: &NamespaceHandler,
        cache_id: &CacheId,
    ) -> StorageResult<Option<IdReference>> {
        read_json_as(self.store.as_ref(), &handler.id_ref_path(cache_id))
    }

    pub fn has_id_ref(&self, handler: &NamespaceHandler, cache_id: &CacheId) -> StorageResult<bool> {
        self.store.exists(&handler.id_ref_path(cache_id))
    }

    /// Append `cache_id` to the hash entry, creating the entry on first use.
    ///
    /// Returns the path of the hash entry file.
    pub fn append_version(
        &self,
        handler: &NamespaceHandler,
        hash: &CacheHash,
        cache_id: &CacheId,
        timestamp: DateTime<Utc>,
    ) -> StorageResult<String> {
        let _guard = self.locks.lock((handler.namespace().clone(), hash.clone()));
        let path = handler.hash_ref_path(hash);

        let mut refs = read_json_as::<HashReference>(self.store.as_ref(), &path)?
            .unwrap_or_else(|| HashReference::new(hash.clone()));
        refs.append(cache_id.clone(), timestamp);
        save_json(self.store.as_ref(), &path, &refs)?;

        debug!(
            namespace = %handler.namespace(),
            hash = %hash,
            cache_id = %cache_id,
            total_versions = refs.total_versions,
            "hash reference updated"
        );
        Ok(path)
    }

    /// Write the id entry. Returns its path.
    pub fn write_id_ref(&self, handler: &NamespaceHandler, refs: &IdReference) -> StorageResult<String> {
        let path = handler.id_ref_path(&refs.cache_id);
        save_json(self.store.as_ref(), &path, refs)?;
        Ok(path)
    }

    /// Remove `cache_id` from its hash entry, deleting the entry when empty.
    pub fn detach_version(
        &self,
        handler: &NamespaceHandler,
        hash: &CacheHash,
        cache_id: &CacheId,
    ) -> StorageResult<Detached> {
        let _guard = self.locks.lock((handler.namespace().clone(), hash.clone()));
        let path = handler.hash_ref_path(hash);

        let Some(mut refs) = read_json_as::<HashReference>(self.store.as_ref(), &path)? else {
            warn!(namespace = %handler.namespace(), hash = %hash, "hash reference missing on delete");
            return Ok(Detached::NotListed);
        };
        if !refs.remove(cache_id) {
            warn!(
                namespace = %handler.namespace(),
                hash = %hash,
                cache_id = %cache_id,
                "version not listed in its hash reference"
            );
            return Ok(Detached::NotListed);
        }

        if refs.is_empty() {
            let deleted = self.store.delete(&path)?;
            Ok(Detached::Removed { path, deleted })
        } else {
            save_json(self.store.as_ref(), &path, &refs)?;
            Ok(Detached::Updated {
                path,
                latest_id: refs.latest_id,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Namespace;
    use crate::storage::MemoryStore;

    fn setup() -> (ReferenceIndex, NamespaceHandler, CacheHash) {
        let index = ReferenceIndex::new(Arc::new(MemoryStore::new()));
        let handler = NamespaceHandler::new(Namespace::new("ns1").unwrap());
        (index, handler, CacheHash::new("2cf24dba5fb0a30e").unwrap())
    }

    #[test]
    fn test_append_creates_then_extends() {
        let (index, handler, hash) = setup();
        let v1 = CacheId::generate();
        let v2 = CacheId::generate();

        let path = index.append_version(&handler, &hash, &v1, Utc::now()).unwrap();
        assert_eq!(path, "ns1/refs/by-hash/2c/f2/2cf24dba5fb0a30e.json");
        index.append_version(&handler, &hash, &v2, Utc::now()).unwrap();

        let refs = index.load_hash_ref(&handler, &hash).unwrap().unwrap();
        assert_eq!(refs.total_versions, 2);
        assert_eq!(refs.latest_id, Some(v2));
    }

    #[test]
    fn test_detach_last_version_removes_entry() {
        let (index, handler, hash) = setup();
        let v1 = CacheId::generate();
        let v2 = CacheId::generate();
        index.append_version(&handler, &hash, &v1, Utc::now()).unwrap();
        index.append_version(&handler, &hash, &v2, Utc::now()).unwrap();

        match index.detach_version(&handler, &hash, &v2).unwrap() {
            Detached::Updated { latest_id, .. } => assert_eq!(latest_id, Some(v1.clone())),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            index.detach_version(&handler, &hash, &v1).unwrap(),
            Detached::Removed { deleted: true, .. }
        ));
        assert!(index.load_hash_ref(&handler, &hash).unwrap().is_none());
        assert_eq!(index.detach_version(&handler, &hash, &v1).unwrap(), Detached::NotListed);
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let (index, handler, hash) = setup();
        let handler = Arc::new(handler);

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let index = index.clone();
                let handler = Arc::clone(&handler);
                let hash = hash.clone();
                std::thread::spawn(move || {
                    index
                        .append_version(&handler, &hash, &CacheId::generate(), Utc::now())
                        .unwrap();
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let refs = index.load_hash_ref(&handler, &hash).unwrap().unwrap();
        assert_eq!(refs.total_versions, 16);
        assert_eq!(refs.cache_ids.len(), 16);
    }
}
