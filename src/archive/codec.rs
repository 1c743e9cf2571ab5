//! In-memory zip codec.
//!
//! Archives are decoded into a path-sorted map of file contents, mutated in
//! memory and re-encoded. Directory entries are dropped on decode.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::cache::{CacheError, CacheResult};
use crate::hash::HashGenerator;

/// Decoded archive contents, keyed by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZipContents {
    files: BTreeMap<String, Vec<u8>>,
}

impl ZipContents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode zip bytes. Fails with `InvalidArchive` on anything unreadable.
    pub fn from_bytes(bytes: &[u8]) -> CacheResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut files = BTreeMap::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut content = Vec::new();
            file.read_to_end(&mut content)
                .map_err(|e| CacheError::InvalidArchive(format!("{}: {}", name, e)))?;
            files.insert(name, content);
        }
        Ok(Self { files })
    }

    /// Encode with deflate compression.
    pub fn to_bytes(&self) -> CacheResult<Vec<u8>> {
        self.to_bytes_with(CompressionMethod::Deflated)
    }

    pub fn to_bytes_with(&self, method: CompressionMethod) -> CacheResult<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(method);
        for (path, content) in &self.files {
            writer.start_file(path.as_str(), options)?;
            writer
                .write_all(content)
                .map_err(|e| CacheError::Internal(format!("zip write failed: {}", e)))?;
        }
        Ok(writer.finish()?.into_inner())
    }

    /// Sorted file paths.
    pub fn paths(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Insert or overwrite. Returns the previous content.
    pub fn insert(&mut self, path: impl Into<String>, content: Vec<u8>) -> Option<Vec<u8>> {
        self.files.insert(path.into(), content)
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Sum of uncompressed file sizes.
    pub fn total_size(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<u8>)> {
        self.files.iter()
    }

    /// Content hash over `path \0 content \0` for every file in path order.
    ///
    /// Independent of compression and entry timestamps.
    pub fn content_hash(&self, hasher: &HashGenerator) -> String {
        let mut buf = Vec::with_capacity(self.total_size() + self.files.len() * 32);
        for (path, content) in &self.files {
            buf.extend_from_slice(path.as_bytes());
            buf.push(0);
            buf.extend_from_slice(content);
            buf.push(0);
        }
        hasher.calculate(&buf)
    }
}

/// Check that `bytes` decode as an archive. Returns the file count.
pub fn validate(bytes: &[u8]) -> CacheResult<usize> {
    Ok(ZipContents::from_bytes(bytes)?.len())
}
