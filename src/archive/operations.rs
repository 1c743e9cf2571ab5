//! Archive store, single-file operations and download.

use serde::Serialize;
use tracing::{debug, info};

use crate::archive::codec::ZipContents;
use crate::cache::{
    CacheContent, CacheError, CacheHash, CacheId, CacheResult, CacheService, ContentKind, Namespace,
    StoreOptions, StoreRequest, StoreResponse,
};
use crate::index::IdReference;

/// Response of an archive store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveStoreResponse {
    #[serde(flatten)]
    pub stored: StoreResponse,
    pub file_count: usize,
    /// uncompressed size of all files
    pub total_size: usize,
}

/// A single archive operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOperation {
    List,
    Get { path: String },
    Add { path: String, content: Vec<u8> },
    Remove { path: String },
    Replace { path: String, content: Vec<u8> },
    Move { path: String, new_path: String },
}

impl ArchiveOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Get { .. } => "get",
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::Replace { .. } => "replace",
            Self::Move { .. } => "move",
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::List | Self::Get { .. })
    }

    fn check_arguments(&self) -> CacheResult<()> {
        let (path, content, new_path) = match self {
            Self::List => return Ok(()),
            Self::Get { path } | Self::Remove { path } => (path, None, None),
            Self::Add { path, content } | Self::Replace { path, content } => (path, Some(content), None),
            Self::Move { path, new_path } => (path, None, Some(new_path)),
        };
        if path.is_empty() {
            return Err(CacheError::invalid_input(
                "file_path",
                format!("file_path required for {} operation", self.name()),
            ));
        }
        if content.is_some_and(|c| c.is_empty()) {
            return Err(CacheError::invalid_input(
                "file_content",
                format!("file_content required for {} operation", self.name()),
            ));
        }
        if new_path.is_some_and(|p| p.is_empty()) {
            return Err(CacheError::invalid_input(
                "new_path",
                format!("new_path required for {} operation", self.name()),
            ));
        }
        Ok(())
    }
}

/// Outcome of a single archive operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveOperationResult {
    pub success: bool,
    pub operation: String,
    /// the version operated on
    pub cache_id: Option<CacheId>,
    /// set when a mutation produced a new version
    pub new_cache_id: Option<CacheId>,
    pub new_cache_hash: Option<CacheHash>,
    pub files_affected: Vec<String>,
    pub file_list: Vec<String>,
    #[serde(skip)]
    pub file_content: Option<Vec<u8>>,
    pub file_size: Option<usize>,
    pub message: String,
    pub error: Option<String>,
}

impl ArchiveOperationResult {
    fn ok(op: &ArchiveOperation, cache_id: &CacheId, message: String) -> Self {
        Self {
            success: true,
            operation: op.name().to_string(),
            cache_id: Some(cache_id.clone()),
            message,
            ..Default::default()
        }
    }

    fn failed(op: &ArchiveOperation, cache_id: &CacheId, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            success: false,
            operation: op.name().to_string(),
            cache_id: Some(cache_id.clone()),
            message: error.clone(),
            error: Some(error),
            ..Default::default()
        }
    }
}

/// A stored archive version, decoded.
pub(crate) struct LoadedArchive {
    pub refs: IdReference,
    pub contents: ZipContents,
}

/// Why an archive version could not be loaded.
pub(crate) enum LoadFailure {
    NotFound,
    NotBinary(ContentKind),
    Unreadable(String),
}

impl LoadFailure {
    pub fn message(&self) -> String {
        match self {
            Self::NotFound => "Zip file not found in cache".to_string(),
            Self::NotBinary(kind) => format!("cache entry is {} content, not an archive", kind),
            Self::Unreadable(reason) => format!("stored content is not a valid archive: {}", reason),
        }
    }
}

/// Immutable-versioning engine for zip payloads.
///
/// Every mutation stores a brand-new version; the original's files and
/// index entries are never written.
#[derive(Clone)]
pub struct ArchiveService {
    cache: CacheService,
}

impl ArchiveService {
    pub fn new(cache: CacheService) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    /// Validate and store zip bytes as a binary version.
    pub fn store_archive(&self, bytes: Vec<u8>, options: StoreOptions) -> CacheResult<ArchiveStoreResponse> {
        if bytes.is_empty() {
            return Err(CacheError::invalid_input("data", "archive payload is empty"));
        }
        let contents = ZipContents::from_bytes(&bytes)?;
        self.store_contents(bytes, &contents, options)
    }

    fn store_contents(
        &self,
        bytes: Vec<u8>,
        contents: &ZipContents,
        options: StoreOptions,
    ) -> CacheResult<ArchiveStoreResponse> {
        let hash = CacheHash::new(contents.content_hash(self.cache.hasher()))?;
        let stored = self.cache.store(
            StoreRequest::new(CacheContent::Binary(bytes))
                .hash(hash)
                .options(options),
        )?;
        debug!(
            namespace = %stored.namespace,
            cache_id = %stored.cache_id,
            files = contents.len(),
            "stored archive"
        );
        Ok(ArchiveStoreResponse {
            stored,
            file_count: contents.len(),
            total_size: contents.total_size(),
        })
    }

    /// Store a mutated copy as a new version of `original`.
    ///
    /// Strategy and semantic key carry over; the file id does not, so the
    /// original's content files are never overwritten.
    pub(crate) fn store_derived(
        &self,
        original: &IdReference,
        contents: &ZipContents,
    ) -> CacheResult<ArchiveStoreResponse> {
        let mut options = StoreOptions::new(original.namespace.clone()).strategy(original.strategy);
        options.semantic_key = original.semantic_key.clone();

        let response = self.store_contents(contents.to_bytes()?, contents, options)?;
        info!(
            namespace = %original.namespace,
            original = %original.cache_id,
            new_version = %response.stored.cache_id,
            "created archive version"
        );
        Ok(response)
    }

    pub(crate) fn load(
        &self,
        cache_id: &CacheId,
        namespace: &Namespace,
    ) -> CacheResult<Result<LoadedArchive, LoadFailure>> {
        let Some(refs) = self.cache.retrieve_refs(cache_id, namespace)? else {
            return Ok(Err(LoadFailure::NotFound));
        };
        let Some(retrieved) = self.cache.retrieve_by_id(cache_id, namespace)? else {
            return Ok(Err(LoadFailure::NotFound));
        };
        let bytes = match retrieved.content {
            CacheContent::Binary(bytes) => bytes,
            other => return Ok(Err(LoadFailure::NotBinary(other.kind()))),
        };
        match ZipContents::from_bytes(&bytes) {
            Ok(contents) => Ok(Ok(LoadedArchive { refs, contents })),
            Err(e) => Ok(Err(LoadFailure::Unreadable(e.to_string()))),
        }
    }

    /// Raw archive bytes of a version. `None` if it does not exist or is
    /// not binary.
    pub fn download(&self, cache_id: &CacheId, namespace: &Namespace) -> CacheResult<Option<Vec<u8>>> {
        Ok(self
            .cache
            .retrieve_by_id(cache_id, namespace)?
            .and_then(|retrieved| match retrieved.content {
                CacheContent::Binary(bytes) => Some(bytes),
                _ => None,
            }))
    }

    /// Run one operation against a version.
    ///
    /// Missing arguments are errors. Everything else that can go wrong
    /// (missing version, missing file, add onto an existing file) is a
    /// result with `success == false`.
    pub fn single_operation(
        &self,
        cache_id: &CacheId,
        namespace: &Namespace,
        op: ArchiveOperation,
    ) -> CacheResult<ArchiveOperationResult> {
        op.check_arguments()?;

        let mut archive = match self.load(cache_id, namespace)? {
            Ok(archive) => archive,
            Err(failure) => return Ok(ArchiveOperationResult::failed(&op, cache_id, failure.message())),
        };

        let (affected, message) = match &op {
            ArchiveOperation::List => {
                let files = archive.contents.paths();
                let mut result =
                    ArchiveOperationResult::ok(&op, cache_id, format!("Found {} files in zip", files.len()));
                result.file_list = files;
                return Ok(result);
            }
            ArchiveOperation::Get { path } => {
                let Some(content) = archive.contents.get(path) else {
                    return Ok(ArchiveOperationResult::failed(
                        &op,
                        cache_id,
                        format!("File '{}' not found in zip", path),
                    ));
                };
                let mut result = ArchiveOperationResult::ok(&op, cache_id, format!("Retrieved '{}'", path));
                result.file_size = Some(content.len());
                result.file_content = Some(content.to_vec());
                return Ok(result);
            }
            ArchiveOperation::Add { path, content } => {
                if archive.contents.contains(path) {
                    return Ok(ArchiveOperationResult::failed(
                        &op,
                        cache_id,
                        format!("File '{}' already exists in zip", path),
                    ));
                }
                archive.contents.insert(path.clone(), content.clone());
                (vec![path.clone()], format!("Added '{}' to zip", path))
            }
            ArchiveOperation::Remove { path } => {
                if archive.contents.remove(path).is_none() {
                    return Ok(ArchiveOperationResult::failed(
                        &op,
                        cache_id,
                        format!("File '{}' not found in zip", path),
                    ));
                }
                (vec![path.clone()], format!("Removed '{}' from zip", path))
            }
            ArchiveOperation::Replace { path, content } => {
                if !archive.contents.contains(path) {
                    return Ok(ArchiveOperationResult::failed(
                        &op,
                        cache_id,
                        format!("File '{}' not found in zip", path),
                    ));
                }
                archive.contents.insert(path.clone(), content.clone());
                (vec![path.clone()], format!("Replaced '{}' in zip", path))
            }
            ArchiveOperation::Move { path, new_path } => {
                if archive.contents.contains(new_path) {
                    return Ok(ArchiveOperationResult::failed(
                        &op,
                        cache_id,
                        format!("File '{}' already exists in zip", new_path),
                    ));
                }
                let Some(content) = archive.contents.remove(path) else {
                    return Ok(ArchiveOperationResult::failed(
                        &op,
                        cache_id,
                        format!("File '{}' not found in zip", path),
                    ));
                };
                archive.contents.insert(new_path.clone(), content);
                (
                    vec![path.clone(), new_path.clone()],
                    format!("Moved '{}' to '{}'", path, new_path),
                )
            }
        };

        let stored = self.store_derived(&archive.refs, &archive.contents)?;
        let mut result = ArchiveOperationResult::ok(&op, cache_id, message);
        result.new_cache_id = Some(stored.stored.cache_id);
        result.new_cache_hash = Some(stored.stored.cache_hash);
        result.files_affected = affected;
        result.file_list = archive.contents.paths();
        Ok(result)
    }

    /// Files in a version, `None` if it is not a stored archive.
    pub fn list(&self, cache_id: &CacheId, namespace: &Namespace) -> CacheResult<Option<Vec<String>>> {
        Ok(self.load(cache_id, namespace)?.ok().map(|a| a.contents.paths()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::MemoryStore;
    use crate::strategy::StorageStrategy;

    fn service() -> ArchiveService {
        ArchiveService::new(CacheService::new(Arc::new(MemoryStore::new())))
    }

    fn archive(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipContents::new();
        for (path, content) in files {
            zip.insert(*path, content.to_vec());
        }
        zip.to_bytes().unwrap()
    }

    fn add(path: &str, content: &[u8]) -> ArchiveOperation {
        ArchiveOperation::Add {
            path: path.to_string(),
            content: content.to_vec(),
        }
    }

    #[test]
    fn test_store_rejects_bad_payloads() {
        let svc = service();
        assert!(svc.store_archive(Vec::new(), StoreOptions::default()).unwrap_err().is_invalid_input());
        let err = svc
            .store_archive(b"not a zip".to_vec(), StoreOptions::default())
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidArchive(_)));
        // nothing was indexed
        assert_eq!(svc.cache().namespace_stats(&Namespace::default()).unwrap().total_files, 0);
    }

    #[test]
    fn test_add_chain_from_empty_archive() {
        let svc = service();
        let ns = Namespace::default();
        let v1 = svc.store_archive(archive(&[]), StoreOptions::default()).unwrap().stored.cache_id;

        let r2 = svc.single_operation(&v1, &ns, add("a.txt", b"1")).unwrap();
        assert!(r2.success);
        let v2 = r2.new_cache_id.unwrap();

        let r3 = svc.single_operation(&v2, &ns, add("b.txt", b"2")).unwrap();
        let v3 = r3.new_cache_id.unwrap();

        assert_eq!(svc.list(&v1, &ns).unwrap().unwrap(), Vec::<String>::new());
        assert_eq!(svc.list(&v2, &ns).unwrap().unwrap(), vec!["a.txt"]);
        assert_eq!(svc.list(&v3, &ns).unwrap().unwrap(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_mutation_keeps_original_intact() {
        let svc = service();
        let ns = Namespace::new("zips").unwrap();
        let options = StoreOptions::new(ns.clone()).strategy(StorageStrategy::TemporalLatest);
        let original = svc
            .store_archive(archive(&[("a.txt", b"1"), ("b.txt", b"2")]), options)
            .unwrap()
            .stored;
        let before = svc.download(&original.cache_id, &ns).unwrap().unwrap();

        let result = svc
            .single_operation(&original.cache_id, &ns, ArchiveOperation::Remove { path: "a.txt".into() })
            .unwrap();
        let new_id = result.new_cache_id.unwrap();
        assert_ne!(new_id, original.cache_id);

        assert_eq!(svc.download(&original.cache_id, &ns).unwrap().unwrap(), before);
        let new_refs = svc.cache().retrieve_refs(&new_id, &ns).unwrap().unwrap();
        assert_eq!(new_refs.strategy, StorageStrategy::TemporalLatest);
        assert_eq!(svc.list(&new_id, &ns).unwrap().unwrap(), vec!["b.txt"]);
    }

    #[test]
    fn test_reads_do_not_create_versions() {
        let svc = service();
        let ns = Namespace::default();
        let id = svc
            .store_archive(archive(&[("a.txt", b"hello")]), StoreOptions::default())
            .unwrap()
            .stored
            .cache_id;
        let files_before = svc.cache().namespace_stats(&ns).unwrap().total_files;

        let list = svc.single_operation(&id, &ns, ArchiveOperation::List).unwrap();
        assert_eq!(list.file_list, vec!["a.txt"]);
        let get = svc
            .single_operation(&id, &ns, ArchiveOperation::Get { path: "a.txt".into() })
            .unwrap();
        assert_eq!(get.file_content.as_deref(), Some(&b"hello"[..]));
        assert!(get.new_cache_id.is_none());

        assert_eq!(svc.cache().namespace_stats(&ns).unwrap().total_files, files_before);
    }

    #[test]
    fn test_structured_failures() {
        let svc = service();
        let ns = Namespace::default();
        let id = svc
            .store_archive(archive(&[("a.txt", b"1")]), StoreOptions::default())
            .unwrap()
            .stored
            .cache_id;

        let missing = svc
            .single_operation(&id, &ns, ArchiveOperation::Remove { path: "nope.txt".into() })
            .unwrap();
        assert!(!missing.success);
        assert!(missing.new_cache_id.is_none());

        let dup = svc.single_operation(&id, &ns, add("a.txt", b"again")).unwrap();
        assert!(!dup.success);

        let no_version = svc
            .single_operation(&CacheId::generate(), &ns, ArchiveOperation::List)
            .unwrap();
        assert!(!no_version.success);

        let text = svc.cache().store_string("plain", StoreOptions::default()).unwrap();
        let not_zip = svc.single_operation(&text.cache_id, &ns, ArchiveOperation::List).unwrap();
        assert!(!not_zip.success);
    }

    #[test]
    fn test_missing_arguments_are_errors() {
        let svc = service();
        let ns = Namespace::default();
        let id = CacheId::generate();

        assert!(svc
            .single_operation(&id, &ns, ArchiveOperation::Get { path: String::new() })
            .unwrap_err()
            .is_invalid_input());
        assert!(svc.single_operation(&id, &ns, add("a.txt", b"")).unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_replace_and_move() {
        let svc = service();
        let ns = Namespace::default();
        let id = svc
            .store_archive(archive(&[("a.txt", b"1")]), StoreOptions::default())
            .unwrap()
            .stored
            .cache_id;

        let replaced = svc
            .single_operation(
                &id,
                &ns,
                ArchiveOperation::Replace { path: "a.txt".into(), content: b"new".to_vec() },
            )
            .unwrap();
        let moved = svc
            .single_operation(
                &replaced.new_cache_id.unwrap(),
                &ns,
                ArchiveOperation::Move { path: "a.txt".into(), new_path: "docs/a.txt".into() },
            )
            .unwrap();
        let moved_id = moved.new_cache_id.unwrap();

        let get = svc
            .single_operation(&moved_id, &ns, ArchiveOperation::Get { path: "docs/a.txt".into() })
            .unwrap();
        assert_eq!(get.file_content.as_deref(), Some(&b"new"[..]));
    }

    #[test]
    fn test_same_contents_share_hash() {
        let svc = service();
        let zip = {
            let mut z = ZipContents::new();
            z.insert("a.txt", b"1".to_vec());
            z
        };
        let stored = svc
            .store_archive(zip.to_bytes_with(zip::CompressionMethod::Stored).unwrap(), StoreOptions::default())
            .unwrap();
        let deflated = svc
            .store_archive(zip.to_bytes_with(zip::CompressionMethod::Deflated).unwrap(), StoreOptions::default())
            .unwrap();

        assert_eq!(stored.stored.cache_hash, deflated.stored.cache_hash);
        let refs = svc
            .cache()
            .retrieve_hash_refs(&stored.stored.cache_hash, &Namespace::default())
            .unwrap()
            .unwrap();
        assert_eq!(refs.total_versions, 2);
    }
}
