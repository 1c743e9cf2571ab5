//! byte storage layer for cachedb
//!
//! this module provides the physical storage contract the cache engine is
//! built on. The upper layers (reference index, strategies, archive engine)
//! use the [`ByteStore`] trait and never touch a filesystem or git2 directly.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    dyn ByteStore                            │
//! │  (save / read_bytes / exists / delete / list_under)         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │ MemoryStore │       │  LocalDisk  │       │  GitStore   │
//!  │  (BTreeMap) │       │   (files)   │       │ (commits)   │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use cachedb::storage::{ByteStore, GitStore};
//!
//! let store = GitStore::open_or_init("./cache_repo")?;
//! store.save("ns1/data/direct/ab/cd/abcd.txt", b"hello")?;
//! let bytes = store.read_bytes("ns1/data/direct/ab/cd/abcd.txt")?;
//! let files = store.list_under("ns1/")?;
//! ```

mod backend;
mod error;
mod git;
mod local;
mod memory;
mod types;

pub use backend::{read_json_as, save_json, ByteStore};
pub use error::{StorageError, StorageResult};
pub use git::{GitSignature, GitStore, StoreCommit};
pub use local::LocalDiskStore;
pub use memory::MemoryStore;
pub use types::{path_has_prefix, validate_path, validate_prefix, InvalidPathError};
