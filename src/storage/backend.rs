//! The byte store contract.
//!
//! Everything above the storage layer (indices, strategies, archive engine)
//! talks to physical storage only through this trait. Backends are shared as
//! `Arc<dyn ByteStore>` so the trait stays object safe.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::storage::error::{StorageError, StorageResult};

/// A key-value byte storage backend addressed by `/`-separated paths.
pub trait ByteStore: Send + Sync {
    /// Short backend name used in logs and statistics.
    fn name(&self) -> &'static str;

    /// Write `bytes` at `path`, replacing any previous content.
    fn save(&self, path: &str, bytes: &[u8]) -> StorageResult<bool>;

    /// Read the raw bytes at `path`.
    ///
    /// Fails with [`StorageError::FileNotFound`] if nothing is stored there.
    fn read_bytes(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Check whether a file exists at `path`.
    fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Delete the file at `path`. Returns false if there was nothing to delete.
    fn delete(&self, path: &str) -> StorageResult<bool>;

    /// List every file path under `prefix`, sorted.
    fn list_under(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Read the file at `path` as UTF-8 text.
    fn read_text(&self, path: &str) -> StorageResult<String> {
        let bytes = self.read_bytes(path)?;
        String::from_utf8(bytes).map_err(|_| StorageError::InvalidUtf8 {
            path: path.to_string(),
        })
    }

    /// Read the file at `path` as a JSON document.
    fn read_json(&self, path: &str) -> StorageResult<Value> {
        let bytes = self.read_bytes(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// read and deserialize a JSON file, `None` if it does not exist
pub fn read_json_as<T: DeserializeOwned>(
    store: &dyn ByteStore,
    path: &str,
) -> StorageResult<Option<T>> {
    match store.read_bytes(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// serialize a value as pretty JSON and save it
pub fn save_json<T: Serialize>(store: &dyn ByteStore, path: &str, value: &T) -> StorageResult<bool> {
    let bytes = serde_json::to_vec_pretty(value)?;
    store.save(path, &bytes)
}
