//! Git-backed byte store.
//!
//! Every file is a blob in the repository index and every mutation is a
//! commit on HEAD, so the full write history of the cache is preserved in
//! `.git/`. The working tree is never touched; the index is the source of
//! truth for the current state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use git2::{ErrorCode, IndexEntry, IndexTime, Repository, Sort};
use parking_lot::Mutex;
use tracing::debug;

use crate::storage::backend::ByteStore;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{path_has_prefix, validate_path, validate_prefix};

/// regular, non-executable file
const BLOB_MODE: u32 = 0o100644;

/// git signature (author/committer info)
#[derive(Debug, Clone)]
pub struct GitSignature {
    pub name: String,
    pub email: String,
}

impl GitSignature {
    /// create a new signature
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// default signature for cache writes
    pub fn cachedb() -> Self {
        Self::new("cachedb", "cachedb@localhost")
    }

    pub(crate) fn to_git2_signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        git2::Signature::now(&self.name, &self.email)
    }
}

impl Default for GitSignature {
    fn default() -> Self {
        Self::cachedb()
    }
}

/// summary of one commit in the store history
#[derive(Debug, Clone)]
pub struct StoreCommit {
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Git repository wrapper implementing [`ByteStore`].
///
/// Clone this to share across threads - it uses Arc internally.
#[derive(Clone)]
pub struct GitStore {
    inner: Arc<GitStoreInner>,
}

struct GitStoreInner {
    repo: Mutex<Repository>,
    path: PathBuf,
    signature: GitSignature,
}

impl GitStore {
    /// Open an existing repository.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path)?;
        Ok(Self::wrap(repo, path))
    }

    /// Initialize a new repository.
    pub fn init(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::init(path)?;
        Ok(Self::wrap(repo, path))
    }

    /// Open or initialize a repository.
    pub fn open_or_init(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if path.join(".git").exists() {
            Self::open(path)
        } else {
            Self::init(path)
        }
    }

    fn wrap(repo: Repository, path: &Path) -> Self {
        Self {
            inner: Arc::new(GitStoreInner {
                repo: Mutex::new(repo),
                path: path.to_path_buf(),
                signature: GitSignature::cachedb(),
            }),
        }
    }

    /// Get the repository path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Execute a function with exclusive access to the repository.
    fn with_repo<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.lock();
        f(&repo)
    }

    /// Write the index as a tree and commit it on HEAD.
    fn commit_index(&self, repo: &Repository, index: &mut git2::Index, message: &str) -> StorageResult<()> {
        index.write()?;
        let tree_oid = index.write_tree()?;
        let tree = repo.find_tree(tree_oid)?;
        let sig = self.inner.signature.to_git2_signature()?;

        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => None,
            Err(e) => return Err(StorageError::Git(e)),
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        debug!(commit = %oid, message, "git store commit");
        Ok(())
    }

    /// Commit history, most recent first.
    pub fn history(&self, limit: Option<usize>) -> StorageResult<Vec<StoreCommit>> {
        self.with_repo(|repo| {
            let head = match repo.head() {
                Ok(head) => head.peel_to_commit()?,
                Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                    return Ok(Vec::new())
                }
                Err(e) => return Err(StorageError::Git(e)),
            };

            let mut revwalk = repo.revwalk()?;
            revwalk.push(head.id())?;
            revwalk.set_sorting(Sort::TIME | Sort::TOPOLOGICAL)?;

            let mut commits = Vec::new();
            for oid in revwalk {
                if limit.is_some_and(|l| commits.len() >= l) {
                    break;
                }
                let commit = repo.find_commit(oid?)?;
                let timestamp = Utc
                    .timestamp_opt(commit.time().seconds(), 0)
                    .single()
                    .unwrap_or_else(Utc::now);
                commits.push(StoreCommit {
                    id: commit.id().to_string(),
                    message: commit.message().unwrap_or("").to_string(),
                    timestamp,
                });
            }
            Ok(commits)
        })
    }
}

impl ByteStore for GitStore {
    fn name(&self) -> &'static str {
        "git"
    }

    fn save(&self, path: &str, bytes: &[u8]) -> StorageResult<bool> {
        validate_path(path)?;
        self.with_repo(|repo| {
            let mut index = repo.index()?;
            let oid = repo.blob(bytes)?;

            // unchanged content is not worth a commit
            if index
                .get_path(Path::new(path), 0)
                .is_some_and(|existing| existing.id == oid)
            {
                return Ok(true);
            }

            let entry = IndexEntry {
                ctime: IndexTime::new(0, 0),
                mtime: IndexTime::new(0, 0),
                dev: 0,
                ino: 0,
                mode: BLOB_MODE,
                uid: 0,
                gid: 0,
                file_size: u32::try_from(bytes.len()).unwrap_or(u32::MAX),
                id: oid,
                flags: 0,
                flags_extended: 0,
                path: path.as_bytes().to_vec(),
            };
            index.add(&entry)?;
            self.commit_index(repo, &mut index, &format!("[cachedb] save {}", path))?;
            Ok(true)
        })
    }

    fn read_bytes(&self, path: &str) -> StorageResult<Vec<u8>> {
        validate_path(path)?;
        self.with_repo(|repo| {
            let index = repo.index()?;
            let entry = index
                .get_path(Path::new(path), 0)
                .ok_or_else(|| StorageError::FileNotFound(path.to_string()))?;
            let blob = repo.find_blob(entry.id)?;
            Ok(blob.content().to_vec())
        })
    }

    fn exists(&self, path: &str) -> StorageResult<bool> {
        validate_path(path)?;
        self.with_repo(|repo| Ok(repo.index()?.get_path(Path::new(path), 0).is_some()))
    }

    fn delete(&self, path: &str) -> StorageResult<bool> {
        validate_path(path)?;
        self.with_repo(|repo| {
            let mut index = repo.index()?;
            if index.get_path(Path::new(path), 0).is_none() {
                return Ok(false);
            }
            index.remove_path(Path::new(path))?;
            self.commit_index(repo, &mut index, &format!("[cachedb] delete {}", path))?;
            Ok(true)
        })
    }

    fn list_under(&self, prefix: &str) -> StorageResult<Vec<String>> {
        validate_prefix(prefix)?;
        self.with_repo(|repo| {
            let index = repo.index()?;
            let mut paths: Vec<String> = index
                .iter()
                .filter_map(|entry| String::from_utf8(entry.path).ok())
                .filter(|path| path_has_prefix(path, prefix))
                .collect();
            paths.sort();
            Ok(paths)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, GitStore) {
        let dir = TempDir::new().unwrap();
        let store = GitStore::init(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_save_and_read() {
        let (_dir, store) = setup();
        store.save("ns/data/direct/ab/cd/abcd.txt", b"hello").unwrap();

        assert!(store.exists("ns/data/direct/ab/cd/abcd.txt").unwrap());
        assert_eq!(store.read_bytes("ns/data/direct/ab/cd/abcd.txt").unwrap(), b"hello");
        assert!(store.read_bytes("ns/missing.txt").unwrap_err().is_not_found());
    }

    #[test]
    fn test_every_write_is_a_commit() {
        let (_dir, store) = setup();
        store.save("a.txt", b"1").unwrap();
        store.save("b.txt", b"2").unwrap();
        store.save("b.txt", b"2").unwrap(); // unchanged, no commit
        store.delete("a.txt").unwrap();

        let history = store.history(None).unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[0].message.contains("delete a.txt"));
    }

    #[test]
    fn test_delete_and_list() {
        let (_dir, store) = setup();
        store.save("ns1/data/a.json", b"{}").unwrap();
        store.save("ns1/refs/b.json", b"{}").unwrap();
        store.save("ns10/data/c.json", b"{}").unwrap();

        assert_eq!(store.list_under("ns1").unwrap(), vec!["ns1/data/a.json", "ns1/refs/b.json"]);

        assert!(store.delete("ns1/data/a.json").unwrap());
        assert!(!store.delete("ns1/data/a.json").unwrap());
        assert_eq!(store.list_under("ns1/").unwrap(), vec!["ns1/refs/b.json"]);
    }

    #[test]
    fn test_open_or_init_reopens() {
        let dir = TempDir::new().unwrap();
        {
            let store = GitStore::open_or_init(dir.path()).unwrap();
            store.save("x.bin", b"\x00\x01").unwrap();
        }
        let store = GitStore::open_or_init(dir.path()).unwrap();
        assert_eq!(store.read_bytes("x.bin").unwrap(), vec![0, 1]);
    }
}
