//! CacheDB - a namespaced, content-addressable cache and object store.
//!
//! Payloads (text, JSON, binary, zip archives) are stored under a content
//! hash and a unique version id, laid out on a pluggable byte store
//! (memory, local disk or a Git repository) according to a storage
//! strategy. Zip archives get immutable versioning: every mutation yields a
//! new version and leaves the original untouched.
//!
//! # Example
//!
//! ```no_run
//! use cachedb::api::{Cache, CacheConfig};
//!
//! let cache = Cache::open(CacheConfig::local_disk("./cache_data")).unwrap();
//! let stored = cache.service().store_string("hello", cache.options(None)).unwrap();
//! let back = cache
//!     .service()
//!     .retrieve_by_id(&stored.cache_id, &stored.namespace)
//!     .unwrap();
//! assert!(back.is_some());
//! ```

pub mod api;
pub mod archive;
pub mod cache;
pub mod hash;
pub mod index;
pub mod storage;
pub mod strategy;
