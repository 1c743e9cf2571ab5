//! In-memory byte store.
//!
//! Used by tests and embedded callers. Content lives in a sorted map so that
//! prefix listing is a range scan.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::storage::backend::ByteStore;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{path_has_prefix, validate_path, validate_prefix};

/// Thread-safe in-memory backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently stored.
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl ByteStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn save(&self, path: &str, bytes: &[u8]) -> StorageResult<bool> {
        validate_path(path)?;
        self.files.write().insert(path.to_string(), bytes.to_vec());
        Ok(true)
    }

    fn read_bytes(&self, path: &str) -> StorageResult<Vec<u8>> {
        validate_path(path)?;
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::FileNotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> StorageResult<bool> {
        validate_path(path)?;
        Ok(self.files.read().contains_key(path))
    }

    fn delete(&self, path: &str) -> StorageResult<bool> {
        validate_path(path)?;
        Ok(self.files.write().remove(path).is_some())
    }

    fn list_under(&self, prefix: &str) -> StorageResult<Vec<String>> {
        validate_prefix(prefix)?;
        let files = self.files.read();
        Ok(files
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix.trim_end_matches('/')))
            .filter(|(path, _)| path_has_prefix(path, prefix))
            .map(|(path, _)| path.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_read_delete() {
        let store = MemoryStore::new();
        assert!(store.save("ns/a.txt", b"hello").unwrap());
        assert!(store.exists("ns/a.txt").unwrap());
        assert_eq!(store.read_bytes("ns/a.txt").unwrap(), b"hello");
        assert_eq!(store.read_text("ns/a.txt").unwrap(), "hello");

        assert!(store.delete("ns/a.txt").unwrap());
        assert!(!store.delete("ns/a.txt").unwrap());
        assert!(store.read_bytes("ns/a.txt").unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_under_is_segment_aware() {
        let store = MemoryStore::new();
        store.save("ns1/data/a.json", b"{}").unwrap();
        store.save("ns1/refs/b.json", b"{}").unwrap();
        store.save("ns10/data/c.json", b"{}").unwrap();

        assert_eq!(store.list_under("ns1").unwrap(), vec!["ns1/data/a.json", "ns1/refs/b.json"]);
        assert_eq!(store.list_under("ns1/data/").unwrap(), vec!["ns1/data/a.json"]);
        assert_eq!(store.list_under("").unwrap().len(), 3);
    }

    #[test]
    fn test_read_json() {
        let store = MemoryStore::new();
        store.save("doc.json", br#"{"a": 1}"#).unwrap();
        assert_eq!(store.read_json("doc.json").unwrap()["a"], 1);
    }

    #[test]
    fn test_rejects_traversal() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.save("../escape", b"x"),
            Err(StorageError::InvalidPath(_))
        ));
    }
}
