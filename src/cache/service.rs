//! The content store: hashing, layout, physical writes and index upkeep.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};
use std::sync::Arc;

use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::error::{CacheError, CacheResult};
use crate::cache::types::{
    CacheContent, CacheHash, CacheId, ContentEncoding, ContentKind, Namespace, SemanticKey,
};
use crate::hash::{HashConfig, HashGenerator};
use crate::index::{
    Detached, FileConfig, HashReference, IdReference, KeyedLocks, ReferenceIndex, StoreMetadata,
    StorePaths,
};
use crate::storage::{read_json_as, save_json, ByteStore};
use crate::strategy::{config_path, metadata_path, HandlerRegistry, NamespaceHandler, StorageStrategy};

/// default `cache_ttl_hours`
pub const DEFAULT_TTL_HOURS: u32 = 24;

/// Where and how to store a payload.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub namespace: Namespace,
    pub strategy: StorageStrategy,
    /// explicit version id, generated when absent
    pub cache_id: Option<CacheId>,
    /// file name stem, defaults to the version id
    pub file_id: Option<CacheId>,
    pub semantic_key: Option<SemanticKey>,
}

impl StoreOptions {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            ..Default::default()
        }
    }

    pub fn strategy(mut self, strategy: StorageStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn cache_id(mut self, cache_id: CacheId) -> Self {
        self.cache_id = Some(cache_id);
        self
    }

    pub fn file_id(mut self, file_id: CacheId) -> Self {
        self.file_id = Some(file_id);
        self
    }

    pub fn semantic_key(mut self, key: SemanticKey) -> Self {
        self.semantic_key = Some(key);
        self
    }
}

/// A fully specified store call. The hash is computed by the caller.
#[derive(Debug, Clone)]
pub struct StoreRequest {
    pub content: CacheContent,
    pub cache_hash: Option<CacheHash>,
    pub content_encoding: Option<ContentEncoding>,
    pub options: StoreOptions,
}

impl StoreRequest {
    pub fn new(content: CacheContent) -> Self {
        Self {
            content,
            cache_hash: None,
            content_encoding: None,
            options: StoreOptions::default(),
        }
    }

    pub fn hash(mut self, hash: CacheHash) -> Self {
        self.cache_hash = Some(hash);
        self
    }

    pub fn encoding(mut self, encoding: ContentEncoding) -> Self {
        self.content_encoding = Some(encoding);
        self
    }

    pub fn options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }
}

/// Outcome of a successful store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreResponse {
    pub cache_id: CacheId,
    pub cache_hash: CacheHash,
    pub namespace: Namespace,
    pub strategy: StorageStrategy,
    pub content_kind: ContentKind,
    pub paths: StorePaths,
    pub size: usize,
}

/// Content read back from a version.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedContent {
    pub cache_id: CacheId,
    pub content: CacheContent,
    pub metadata: StoreMetadata,
}

impl RetrievedContent {
    pub fn kind(&self) -> ContentKind {
        self.content.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteStatus {
    Success,
    Partial,
}

/// Per-path outcome of a delete sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub cache_id: CacheId,
    pub namespace: Namespace,
    pub status: DeleteStatus,
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
    /// the hash entry was rewritten with the remaining versions
    pub hash_ref_updated: bool,
}

/// Outcome of an in-place content update.
///
/// Only content bytes change; the flags make that explicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub cache_id: CacheId,
    pub cache_hash: CacheHash,
    pub namespace: Namespace,
    pub paths_updated: Vec<String>,
    pub size: usize,
    pub updated_content: bool,
    pub updated_hash: bool,
    pub updated_metadata: bool,
    pub updated_id_ref: bool,
}

/// File counts for one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NamespaceStats {
    pub namespace: String,
    pub total_files: usize,
    pub data_files: usize,
    pub by_hash_files: usize,
    pub by_id_files: usize,
}

/// Id record plus every non-content JSON file it points at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryDetails {
    pub refs: IdReference,
    pub files: BTreeMap<String, Value>,
}

/// Main cache handle.
///
/// Clone this to share across threads - it uses Arc internally.
#[derive(Clone)]
pub struct CacheService {
    inner: Arc<CacheServiceInner>,
}

struct CacheServiceInner {
    store: Arc<dyn ByteStore>,
    index: ReferenceIndex,
    /// held from path selection until a version's content files are written
    file_locks: KeyedLocks<(Namespace, CacheId)>,
    handlers: HandlerRegistry,
    hasher: HashGenerator,
    ttl_hours: u32,
}

impl CacheService {
    /// Service with the default hash config.
    pub fn new(store: Arc<dyn ByteStore>) -> Self {
        Self::with_config(store, HashConfig::default(), DEFAULT_TTL_HOURS)
    }

    pub fn with_config(store: Arc<dyn ByteStore>, hash_config: HashConfig, ttl_hours: u32) -> Self {
        Self {
            inner: Arc::new(CacheServiceInner {
                index: ReferenceIndex::new(Arc::clone(&store)),
                store,
                file_locks: KeyedLocks::new(),
                handlers: HandlerRegistry::new(),
                hasher: HashGenerator::new(hash_config),
                ttl_hours,
            }),
        }
    }

    pub fn store_backend(&self) -> &Arc<dyn ByteStore> {
        &self.inner.store
    }

    pub fn hasher(&self) -> &HashGenerator {
        &self.inner.hasher
    }

    pub fn ttl_hours(&self) -> u32 {
        self.inner.ttl_hours
    }

    fn handler(&self, namespace: &Namespace) -> Arc<NamespaceHandler> {
        self.inner.handlers.get_or_create(namespace)
    }

    fn backend(&self) -> &dyn ByteStore {
        self.inner.store.as_ref()
    }

    /// Store a payload as a new version.
    ///
    /// Writes the content files with their sidecars, then appends to the
    /// hash index and creates the id index entry.
    pub fn store(&self, request: StoreRequest) -> CacheResult<StoreResponse> {
        let StoreRequest {
            content,
            cache_hash,
            content_encoding,
            options,
        } = request;
        let cache_hash = cache_hash
            .ok_or_else(|| CacheError::invalid_input("cache_hash", "a content hash is required"))?;

        let namespace = options.namespace;
        let handler = self.handler(&namespace);

        let cache_id = match options.cache_id {
            Some(id) => {
                if self.inner.index.has_id_ref(&handler, &id)? {
                    return Err(CacheError::AlreadyExists {
                        namespace: namespace.to_string(),
                        cache_id: id.to_string(),
                    });
                }
                id
            }
            None => CacheId::generate(),
        };
        let file_id = options.file_id.unwrap_or_else(|| cache_id.clone());
        let kind = content.kind();
        let bytes = content.to_bytes()?;
        let now = Utc::now();

        let file_guard = self.inner.file_locks.lock((namespace.clone(), file_id.clone()));
        let content_paths = handler.content_paths(
            self.backend(),
            options.strategy,
            &file_id,
            options.semantic_key.as_ref(),
            kind.ext(),
            now,
        )?;

        let metadata = StoreMetadata {
            cache_hash: cache_hash.clone(),
            cache_id: cache_id.clone(),
            file_id: file_id.clone(),
            namespace: namespace.clone(),
            strategy: options.strategy,
            content_kind: kind,
            semantic_key: options.semantic_key.clone(),
            content_encoding,
            stored_at: now,
            content_size: bytes.len(),
        };
        let config = FileConfig {
            file_id: file_id.clone(),
            content_kind: kind,
            extension: kind.ext().to_string(),
            strategy: options.strategy,
            content_paths: content_paths.clone(),
        };

        let mut data_paths = Vec::with_capacity(content_paths.len() * 3);
        for path in &content_paths {
            self.backend().save(path, &bytes)?;
            let config_file = config_path(path);
            save_json(self.backend(), &config_file, &config)?;
            let metadata_file = metadata_path(path);
            save_json(self.backend(), &metadata_file, &metadata)?;
            data_paths.extend([path.clone(), config_file, metadata_file]);
        }
        drop(file_guard);

        let hash_path = self
            .inner
            .index
            .append_version(&handler, &cache_hash, &cache_id, now)?;

        let paths = StorePaths {
            data: data_paths,
            by_hash: vec![hash_path],
            by_id: vec![handler.id_ref_path(&cache_id)],
        };
        let id_ref = IdReference {
            cache_id: cache_id.clone(),
            cache_hash: cache_hash.clone(),
            namespace: namespace.clone(),
            strategy: options.strategy,
            content_kind: kind,
            file_id,
            semantic_key: options.semantic_key,
            content_encoding,
            content_paths,
            all_paths: paths.clone(),
            timestamp: now,
        };
        self.inner.index.write_id_ref(&handler, &id_ref)?;

        debug!(
            namespace = %namespace,
            cache_id = %cache_id,
            hash = %cache_hash,
            strategy = %options.strategy,
            kind = %kind,
            size = bytes.len(),
            "stored cache entry"
        );

        Ok(StoreResponse {
            cache_id,
            cache_hash,
            namespace,
            strategy: options.strategy,
            content_kind: kind,
            paths,
            size: bytes.len(),
        })
    }

    /// Read a version back. `None` if it is not indexed.
    pub fn retrieve_by_id(
        &self,
        cache_id: &CacheId,
        namespace: &Namespace,
    ) -> CacheResult<Option<RetrievedContent>> {
        let handler = self.handler(namespace);
        let Some(refs) = self.inner.index.load_id_ref(&handler, cache_id)? else {
            debug!(namespace = %namespace, cache_id = %cache_id, "cache id not found");
            return Ok(None);
        };
        let Some(primary) = refs.primary_path() else {
            return Err(CacheError::CorruptedIndex {
                path: handler.id_ref_path(cache_id),
                reason: "no content paths recorded".to_string(),
            });
        };

        let bytes = match self.backend().read_bytes(primary) {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                warn!(namespace = %namespace, cache_id = %cache_id, path = primary, "content file missing");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = read_json_as::<StoreMetadata>(self.backend(), &metadata_path(primary))?
            .unwrap_or_else(|| metadata_from_refs(&refs, bytes.len()));
        let content = decode_content(bytes, metadata.content_kind, metadata.content_encoding)?;

        debug!(namespace = %namespace, cache_id = %cache_id, kind = %content.kind(), "retrieved cache entry");
        Ok(Some(RetrievedContent {
            cache_id: cache_id.clone(),
            content,
            metadata,
        }))
    }

    /// Read the latest version stored under `hash`.
    pub fn retrieve_by_hash(
        &self,
        hash: &CacheHash,
        namespace: &Namespace,
    ) -> CacheResult<Option<RetrievedContent>> {
        match self.latest_id(hash, namespace)? {
            Some(latest) => self.retrieve_by_id(&latest, namespace),
            None => Ok(None),
        }
    }

    /// latest version id for a hash
    pub fn latest_id(&self, hash: &CacheHash, namespace: &Namespace) -> CacheResult<Option<CacheId>> {
        let handler = self.handler(namespace);
        Ok(self
            .inner
            .index
            .load_hash_ref(&handler, hash)?
            .and_then(|refs| refs.latest_id))
    }

    /// Delete a version and detach it from its hash entry.
    ///
    /// Best effort: every path is attempted and its outcome recorded.
    pub fn delete_by_id(
        &self,
        cache_id: &CacheId,
        namespace: &Namespace,
    ) -> CacheResult<Option<DeleteReport>> {
        let handler = self.handler(namespace);
        let Some(refs) = self.inner.index.load_id_ref(&handler, cache_id)? else {
            return Ok(None);
        };

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for path in &refs.all_paths.data {
            self.sweep(path, &mut deleted, &mut failed);
        }

        let mut hash_ref_updated = false;
        match self.inner.index.detach_version(&handler, &refs.cache_hash, cache_id) {
            Ok(Detached::Removed { path, .. }) => deleted.push(path),
            Ok(Detached::Updated { .. }) => hash_ref_updated = true,
            Ok(Detached::NotListed) => {}
            Err(e) => {
                warn!(namespace = %namespace, hash = %refs.cache_hash, error = %e, "hash reference update failed");
                failed.push(handler.hash_ref_path(&refs.cache_hash));
            }
        }

        self.sweep(&handler.id_ref_path(cache_id), &mut deleted, &mut failed);

        let status = if failed.is_empty() {
            DeleteStatus::Success
        } else {
            warn!(namespace = %namespace, cache_id = %cache_id, failed = failed.len(), "partial delete");
            DeleteStatus::Partial
        };
        debug!(namespace = %namespace, cache_id = %cache_id, deleted = deleted.len(), "deleted cache entry");

        Ok(Some(DeleteReport {
            cache_id: cache_id.clone(),
            namespace: namespace.clone(),
            status,
            deleted,
            failed,
            hash_ref_updated,
        }))
    }

    fn sweep(&self, path: &str, deleted: &mut Vec<String>, failed: &mut Vec<String>) {
        match self.backend().delete(path) {
            Ok(true) => deleted.push(path.to_string()),
            Ok(false) => {
                debug!(path, "already absent");
                deleted.push(path.to_string());
            }
            Err(e) => {
                warn!(path, error = %e, "delete failed");
                failed.push(path.to_string());
            }
        }
    }

    /// Overwrite a version's content files in place.
    ///
    /// Hash, indices, metadata and strategy are left untouched. The new
    /// content must be of the kind the version was stored as; gzip-encoded
    /// versions are re-compressed so they stay readable.
    pub fn update_content(
        &self,
        cache_id: &CacheId,
        namespace: &Namespace,
        content: &CacheContent,
    ) -> CacheResult<Option<UpdateReport>> {
        let handler = self.handler(namespace);
        let Some(refs) = self.inner.index.load_id_ref(&handler, cache_id)? else {
            return Ok(None);
        };

        if content.kind() != refs.content_kind {
            return Err(CacheError::invalid_input(
                "content",
                format!(
                    "version {} holds {} content, got {}",
                    cache_id,
                    refs.content_kind,
                    content.kind()
                ),
            ));
        }

        let bytes = match refs.content_encoding {
            Some(ContentEncoding::Gzip) => gzip(&content.to_bytes()?)?,
            None => content.to_bytes()?,
        };
        for path in &refs.content_paths {
            self.backend().save(path, &bytes)?;
        }
        debug!(namespace = %namespace, cache_id = %cache_id, size = bytes.len(), "updated cache content in place");

        Ok(Some(UpdateReport {
            cache_id: cache_id.clone(),
            cache_hash: refs.cache_hash,
            namespace: namespace.clone(),
            paths_updated: refs.content_paths,
            size: bytes.len(),
            updated_content: true,
            updated_hash: false,
            updated_metadata: false,
            updated_id_ref: false,
        }))
    }

    /// `.config` sidecar of the primary content file.
    pub fn retrieve_config(&self, cache_id: &CacheId, namespace: &Namespace) -> CacheResult<Option<FileConfig>> {
        self.read_sidecar(cache_id, namespace, config_path)
    }

    /// `.metadata` sidecar of the primary content file.
    pub fn retrieve_metadata(
        &self,
        cache_id: &CacheId,
        namespace: &Namespace,
    ) -> CacheResult<Option<StoreMetadata>> {
        self.read_sidecar(cache_id, namespace, metadata_path)
    }

    fn read_sidecar<T, F>(&self, cache_id: &CacheId, namespace: &Namespace, sidecar: F) -> CacheResult<Option<T>>
    where
        T: serde::de::DeserializeOwned,
        F: Fn(&str) -> String,
    {
        let Some(refs) = self.retrieve_refs(cache_id, namespace)? else {
            return Ok(None);
        };
        match refs.primary_path() {
            Some(primary) => Ok(read_json_as(self.backend(), &sidecar(primary))?),
            None => Ok(None),
        }
    }

    /// The id index entry.
    pub fn retrieve_refs(&self, cache_id: &CacheId, namespace: &Namespace) -> CacheResult<Option<IdReference>> {
        let handler = self.handler(namespace);
        Ok(self.inner.index.load_id_ref(&handler, cache_id)?)
    }

    /// The hash index entry.
    pub fn retrieve_hash_refs(
        &self,
        hash: &CacheHash,
        namespace: &Namespace,
    ) -> CacheResult<Option<HashReference>> {
        let handler = self.handler(namespace);
        Ok(self.inner.index.load_hash_ref(&handler, hash)?)
    }

    /// Id record plus the JSON of every sidecar and index file it lists.
    pub fn retrieve_details(
        &self,
        cache_id: &CacheId,
        namespace: &Namespace,
    ) -> CacheResult<Option<EntryDetails>> {
        let Some(refs) = self.retrieve_refs(cache_id, namespace)? else {
            return Ok(None);
        };
        let mut files = BTreeMap::new();
        for path in refs.all_paths.all() {
            if refs.content_paths.contains(path) {
                continue;
            }
            if let Some(value) = read_json_as::<Value>(self.backend(), path)? {
                files.insert(path.clone(), value);
            }
        }
        Ok(Some(EntryDetails { refs, files }))
    }

    pub fn exists_by_hash(&self, hash: &CacheHash, namespace: &Namespace) -> CacheResult<bool> {
        let handler = self.handler(namespace);
        Ok(self.backend().exists(&handler.hash_ref_path(hash))?)
    }

    /// File counts under a namespace.
    pub fn namespace_stats(&self, namespace: &Namespace) -> CacheResult<NamespaceStats> {
        let handler = self.handler(namespace);
        let data_files = self.backend().list_under(&handler.data_prefix())?.len();
        let by_hash_files = self.backend().list_under(&handler.by_hash_prefix())?.len();
        let by_id_files = self.backend().list_under(&handler.by_id_prefix())?.len();
        Ok(NamespaceStats {
            namespace: namespace.to_string(),
            total_files: data_files + by_hash_files + by_id_files,
            data_files,
            by_hash_files,
            by_id_files,
        })
    }

    /// Namespaces with stored files, plus any used in this process.
    pub fn list_namespaces(&self) -> CacheResult<Vec<Namespace>> {
        let mut names: BTreeSet<Namespace> = self.inner.handlers.namespaces().into_iter().collect();
        for path in self.backend().list_under("")? {
            let mut parts = path.splitn(3, '/');
            if let (Some(first), Some("data" | "refs")) = (parts.next(), parts.next()) {
                if let Ok(ns) = Namespace::new(first) {
                    names.insert(ns);
                }
            }
        }
        Ok(names.into_iter().collect())
    }

    /// TTL expiry is declared but not enforced: nothing ever expires.
    pub fn is_expired(&self, _refs: &IdReference) -> bool {
        false
    }
}

fn metadata_from_refs(refs: &IdReference, content_size: usize) -> StoreMetadata {
    StoreMetadata {
        cache_hash: refs.cache_hash.clone(),
        cache_id: refs.cache_id.clone(),
        file_id: refs.file_id.clone(),
        namespace: refs.namespace.clone(),
        strategy: refs.strategy,
        content_kind: refs.content_kind,
        semantic_key: refs.semantic_key.clone(),
        content_encoding: refs.content_encoding,
        stored_at: refs.timestamp,
        content_size,
    }
}

/// Turn stored bytes back into content.
///
/// gzip payloads are decompressed and reclassified: JSON if they parse,
/// text if they were stored as a string, binary otherwise.
pub(crate) fn decode_content(
    bytes: Vec<u8>,
    kind: ContentKind,
    encoding: Option<ContentEncoding>,
) -> CacheResult<CacheContent> {
    match encoding {
        Some(ContentEncoding::Gzip) => {
            let decoded = gunzip(&bytes)?;
            if let Ok(value) = serde_json::from_slice::<Value>(&decoded) {
                return Ok(CacheContent::Json(value));
            }
            if kind == ContentKind::String {
                if let Ok(text) = String::from_utf8(decoded.clone()) {
                    return Ok(CacheContent::String(text));
                }
            }
            Ok(CacheContent::Binary(decoded))
        }
        None => match kind {
            ContentKind::Binary => Ok(CacheContent::Binary(bytes)),
            ContentKind::Json => Ok(CacheContent::Json(serde_json::from_slice(&bytes)?)),
            ContentKind::String => match String::from_utf8(bytes) {
                Ok(text) => Ok(CacheContent::String(text)),
                Err(e) => Ok(CacheContent::Binary(e.into_bytes())),
            },
        },
    }
}

pub(crate) fn gunzip(bytes: &[u8]) -> CacheResult<Vec<u8>> {
    let mut decoded = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut decoded)
        .map_err(|e| CacheError::Decompression(e.to_string()))?;
    Ok(decoded)
}

pub(crate) fn gzip(bytes: &[u8]) -> CacheResult<Vec<u8>> {
    let failed = |e: std::io::Error| CacheError::Internal(format!("gzip failed: {}", e));
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).map_err(failed)?;
    encoder.finish().map_err(failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StorageError, StorageResult};
    use serde_json::json;

    fn setup() -> (CacheService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (CacheService::new(store.clone()), store)
    }

    fn ns(name: &str) -> Namespace {
        Namespace::new(name).unwrap()
    }

    fn request(service: &CacheService, text: &str, namespace: &Namespace) -> StoreRequest {
        let hash = CacheHash::new(service.hasher().from_string(text)).unwrap();
        StoreRequest::new(CacheContent::String(text.to_string()))
            .hash(hash)
            .options(StoreOptions::new(namespace.clone()))
    }

    #[test]
    fn test_store_requires_hash() {
        let (service, store) = setup();
        let err = service
            .store(StoreRequest::new(CacheContent::String("x".into())))
            .unwrap_err();
        assert!(err.is_invalid_input());
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_writes_content_sidecars_and_refs() {
        let (service, store) = setup();
        let ns1 = ns("ns1");
        let response = service.store(request(&service, "hello", &ns1)).unwrap();

        assert_eq!(response.cache_hash.as_str(), "2cf24dba5fb0a30e");
        assert_eq!(response.content_kind, ContentKind::String);
        assert_eq!(response.size, 5);
        assert_eq!(response.paths.data.len(), 3);
        assert!(response.paths.data[0].starts_with("ns1/data/direct/"));
        assert!(response.paths.data[0].ends_with(&format!("{}.txt", response.cache_id)));
        assert_eq!(
            response.paths.by_hash,
            vec!["ns1/refs/by-hash/2c/f2/2cf24dba5fb0a30e.json"]
        );
        // 3 data files + hash ref + id ref
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_dedup_and_delete_scenario() {
        let (service, _store) = setup();
        let ns1 = ns("ns1");

        let v1 = service.store(request(&service, "hello", &ns1)).unwrap();
        let v2 = service.store(request(&service, "hello", &ns1)).unwrap();
        assert_ne!(v1.cache_id, v2.cache_id);
        assert_eq!(v1.cache_hash, v2.cache_hash);

        let refs = service.retrieve_hash_refs(&v1.cache_hash, &ns1).unwrap().unwrap();
        assert_eq!(refs.total_versions, 2);
        assert_eq!(service.latest_id(&v1.cache_hash, &ns1).unwrap(), Some(v2.cache_id.clone()));

        let report = service.delete_by_id(&v2.cache_id, &ns1).unwrap().unwrap();
        assert_eq!(report.status, DeleteStatus::Success);
        assert!(report.hash_ref_updated);

        let latest = service.retrieve_by_hash(&v1.cache_hash, &ns1).unwrap().unwrap();
        assert_eq!(latest.cache_id, v1.cache_id);
        assert_eq!(latest.content, CacheContent::String("hello".into()));

        service.delete_by_id(&v1.cache_id, &ns1).unwrap().unwrap();
        assert!(!service.exists_by_hash(&v1.cache_hash, &ns1).unwrap());
        assert!(service.retrieve_by_hash(&v1.cache_hash, &ns1).unwrap().is_none());
    }

    #[test]
    fn test_missing_is_none() {
        let (service, _store) = setup();
        let id = CacheId::generate();
        let hash = CacheHash::new("2cf24dba5fb0a30e").unwrap();
        let ns1 = ns("ns1");

        assert!(service.retrieve_by_id(&id, &ns1).unwrap().is_none());
        assert!(service.retrieve_by_hash(&hash, &ns1).unwrap().is_none());
        assert!(service.delete_by_id(&id, &ns1).unwrap().is_none());
        assert!(service
            .update_content(&id, &ns1, &CacheContent::String("x".into()))
            .unwrap()
            .is_none());
        assert!(service.retrieve_config(&id, &ns1).unwrap().is_none());
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let (service, _store) = setup();
        let a = ns("alpha");
        let b = ns("beta");
        let stored = service.store(request(&service, "hello", &a)).unwrap();

        assert!(service.retrieve_by_id(&stored.cache_id, &b).unwrap().is_none());
        assert!(!service.exists_by_hash(&stored.cache_hash, &b).unwrap());
        assert_eq!(service.namespace_stats(&a).unwrap().total_files, 5);
        assert_eq!(service.namespace_stats(&b).unwrap().total_files, 0);
    }

    /// Memory store that refuses to delete `.config` sidecars.
    #[derive(Default)]
    struct StuckConfig {
        inner: MemoryStore,
    }

    impl ByteStore for StuckConfig {
        fn name(&self) -> &'static str {
            "stuck"
        }

        fn save(&self, path: &str, bytes: &[u8]) -> StorageResult<bool> {
            self.inner.save(path, bytes)
        }

        fn read_bytes(&self, path: &str) -> StorageResult<Vec<u8>> {
            self.inner.read_bytes(path)
        }

        fn exists(&self, path: &str) -> StorageResult<bool> {
            self.inner.exists(path)
        }

        fn delete(&self, path: &str) -> StorageResult<bool> {
            if path.ends_with(".config") {
                return Err(StorageError::Internal(format!("cannot delete {}", path)));
            }
            self.inner.delete(path)
        }

        fn list_under(&self, prefix: &str) -> StorageResult<Vec<String>> {
            self.inner.list_under(prefix)
        }
    }

    #[test]
    fn test_already_missing_file_counts_as_deleted() {
        let (service, store) = setup();
        let ns1 = ns("ns1");
        let stored = service.store(request(&service, "hello", &ns1)).unwrap();

        // remove the config sidecar behind the service's back
        store.delete(&stored.paths.data[1]).unwrap();

        let report = service.delete_by_id(&stored.cache_id, &ns1).unwrap().unwrap();
        assert_eq!(report.status, DeleteStatus::Success);
        assert!(report.failed.is_empty());
        assert!(report.deleted.contains(&stored.paths.data[1]));
        assert!(service.retrieve_refs(&stored.cache_id, &ns1).unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_partial_delete_is_reported() {
        let backend = Arc::new(StuckConfig::default());
        let service = CacheService::new(backend.clone());
        let ns1 = ns("ns1");
        let stored = service.store(request(&service, "hello", &ns1)).unwrap();
        let stuck = stored.paths.data[1].clone();

        let report = service.delete_by_id(&stored.cache_id, &ns1).unwrap().unwrap();
        assert_eq!(report.status, DeleteStatus::Partial);
        assert_eq!(report.failed, vec![stuck.clone()]);
        assert!(backend.inner.exists(&stuck).unwrap());
        assert!(service.retrieve_refs(&stored.cache_id, &ns1).unwrap().is_none());
    }

    #[test]
    fn test_update_content_v1_contract() {
        let (service, _store) = setup();
        let ns1 = ns("ns1");
        let stored = service.store(request(&service, "hello", &ns1)).unwrap();

        let report = service
            .update_content(&stored.cache_id, &ns1, &CacheContent::String("goodbye".into()))
            .unwrap()
            .unwrap();
        assert!(report.updated_content);
        assert!(!report.updated_hash && !report.updated_metadata && !report.updated_id_ref);
        assert_eq!(report.cache_hash, stored.cache_hash);

        let read = service.retrieve_by_id(&stored.cache_id, &ns1).unwrap().unwrap();
        assert_eq!(read.content, CacheContent::String("goodbye".into()));
        // hash index still points at the original hash
        assert_eq!(
            service.latest_id(&stored.cache_hash, &ns1).unwrap(),
            Some(stored.cache_id)
        );
    }

    #[test]
    fn test_update_content_rejects_other_kind() {
        let (service, _store) = setup();
        let value = json!({"a": 1});
        let hash = CacheHash::new(service.hasher().from_json(&value, &[]).unwrap()).unwrap();
        let stored = service
            .store(StoreRequest::new(CacheContent::Json(value.clone())).hash(hash))
            .unwrap();
        let default = Namespace::default();

        let err = service
            .update_content(&stored.cache_id, &default, &CacheContent::String("plain".into()))
            .unwrap_err();
        assert!(err.is_invalid_input());
        let read = service.retrieve_by_id(&stored.cache_id, &default).unwrap().unwrap();
        assert_eq!(read.content, CacheContent::Json(value));

        service
            .update_content(&stored.cache_id, &default, &CacheContent::Json(json!({"a": 2})))
            .unwrap()
            .unwrap();
        let read = service.retrieve_by_id(&stored.cache_id, &default).unwrap().unwrap();
        assert_eq!(read.content, CacheContent::Json(json!({"a": 2})));
    }

    #[test]
    fn test_update_content_keeps_gzip_encoding() {
        let (service, store) = setup();
        let payload = b"\x00\x01 original".to_vec();
        let hash = CacheHash::new(service.hasher().calculate(&payload)).unwrap();
        let stored = service
            .store(
                StoreRequest::new(CacheContent::Binary(gzip(&payload).unwrap()))
                    .hash(hash)
                    .encoding(ContentEncoding::Gzip),
            )
            .unwrap();
        let default = Namespace::default();

        let replacement = b"\x00\x02 replacement".to_vec();
        service
            .update_content(&stored.cache_id, &default, &CacheContent::Binary(replacement.clone()))
            .unwrap()
            .unwrap();

        let on_disk = store.read_bytes(&stored.paths.data[0]).unwrap();
        assert_eq!(gunzip(&on_disk).unwrap(), replacement);
        let read = service.retrieve_by_id(&stored.cache_id, &default).unwrap().unwrap();
        assert_eq!(read.content, CacheContent::Binary(replacement));
    }

    #[test]
    fn test_concurrent_versioned_stores_get_distinct_versions() {
        let (service, _store) = setup();
        let ns1 = ns("ns1");
        let file_id = CacheId::new("report-0001").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                let ns1 = ns1.clone();
                let file_id = file_id.clone();
                std::thread::spawn(move || {
                    let options = StoreOptions::new(ns1.clone())
                        .strategy(StorageStrategy::TemporalVersioned)
                        .file_id(file_id);
                    let response = service
                        .store(request(&service, &format!("body {}", i), &ns1).options(options))
                        .unwrap();
                    response.paths.data[6].clone()
                })
            })
            .collect();

        let versions: BTreeSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(versions.len(), 8);
        for n in 1..=8 {
            let suffix = format!("/versions/v{}/report-0001.txt", n);
            assert!(versions.iter().any(|p| p.ends_with(&suffix)), "missing {}", suffix);
        }
    }

    #[test]
    fn test_duplicate_cache_id_rejected() {
        let (service, _store) = setup();
        let ns1 = ns("ns1");
        let id = CacheId::new("fixed-id-0001").unwrap();
        let opts = StoreOptions::new(ns1.clone()).cache_id(id.clone());

        let first = request(&service, "a", &ns1).options(opts.clone());
        service.store(first).unwrap();
        let err = service.store(request(&service, "b", &ns1).options(opts)).unwrap_err();
        assert!(matches!(err, CacheError::AlreadyExists { .. }));
    }

    #[test]
    fn test_sidecars_and_details() {
        let (service, _store) = setup();
        let ns1 = ns("ns1");
        let stored = service.store(request(&service, "hello", &ns1)).unwrap();

        let config = service.retrieve_config(&stored.cache_id, &ns1).unwrap().unwrap();
        assert_eq!(config.extension, "txt");
        let metadata = service.retrieve_metadata(&stored.cache_id, &ns1).unwrap().unwrap();
        assert_eq!(metadata.content_size, 5);
        assert_eq!(metadata.cache_hash, stored.cache_hash);

        let details = service.retrieve_details(&stored.cache_id, &ns1).unwrap().unwrap();
        // config + metadata + hash ref + id ref
        assert_eq!(details.files.len(), 4);
    }

    #[test]
    fn test_list_namespaces() {
        let (service, store) = setup();
        service.store(request(&service, "a", &ns("zeta"))).unwrap();
        store.save("alpha/data/direct/ab/cd/abcd.txt", b"x").unwrap();
        store.save("not-a-namespace.txt", b"x").unwrap();

        let names: Vec<String> = service
            .list_namespaces()
            .unwrap()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_json_round_trip() {
        let (service, _store) = setup();
        let value = json!({"b": [1, 2], "a": {"nested": true}});
        let hash = CacheHash::new(service.hasher().from_json(&value, &[]).unwrap()).unwrap();
        let stored = service
            .store(StoreRequest::new(CacheContent::Json(value.clone())).hash(hash))
            .unwrap();
        assert_eq!(stored.namespace.as_str(), "default");

        let read = service
            .retrieve_by_id(&stored.cache_id, &Namespace::default())
            .unwrap()
            .unwrap();
        assert_eq!(read.content, CacheContent::Json(value));
    }
}
