//! Local disk byte store.
//!
//! Store paths map one-to-one onto files under a root directory. Writes go
//! through a temp file in the destination directory and are renamed into
//! place, so readers never observe a half-written file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::storage::backend::ByteStore;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{path_has_prefix, validate_path, validate_prefix};

/// Filesystem-backed store rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalDiskStore {
    root: PathBuf,
}

impl LocalDiskStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> StorageResult<PathBuf> {
        validate_path(path)?;
        Ok(path.split('/').fold(self.root.clone(), |acc, part| acc.join(part)))
    }

    fn relative(&self, full: &Path) -> Option<String> {
        let rel = full.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
        parts.map(|p| p.join("/"))
    }
}

impl ByteStore for LocalDiskStore {
    fn name(&self) -> &'static str {
        "local_disk"
    }

    fn save(&self, path: &str, bytes: &[u8]) -> StorageResult<bool> {
        let full = self.full_path(path)?;
        let parent = full
            .parent()
            .ok_or_else(|| StorageError::Internal(format!("no parent directory for {}", path)))?;
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.persist(&full).map_err(|e| StorageError::Io(e.error))?;
        Ok(true)
    }

    fn read_bytes(&self, path: &str) -> StorageResult<Vec<u8>> {
        let full = self.full_path(path)?;
        fs::read(&full).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::FileNotFound(path.to_string()),
            _ => StorageError::Io(e),
        })
    }

    fn exists(&self, path: &str) -> StorageResult<bool> {
        Ok(self.full_path(path)?.is_file())
    }

    fn delete(&self, path: &str) -> StorageResult<bool> {
        let full = self.full_path(path)?;
        match fs::remove_file(&full) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn list_under(&self, prefix: &str) -> StorageResult<Vec<String>> {
        validate_prefix(prefix)?;
        let trimmed = prefix.trim_end_matches('/');
        let start = if trimmed.is_empty() {
            self.root.clone()
        } else {
            let target = self.full_path(trimmed)?;
            if target.is_file() {
                return Ok(vec![trimmed.to_string()]);
            }
            target
        };
        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&start) {
            let entry = entry.map_err(|e| StorageError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(rel) = self.relative(entry.path()) {
                if path_has_prefix(&rel, prefix) {
                    paths.push(rel);
                }
            }
        }
        paths.sort();
        Ok(paths)
    }
}
