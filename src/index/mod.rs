//! Dual reference index (by-hash and by-id) and its on-disk records.

mod engine;
mod locks;
mod types;

pub use engine::{Detached, ReferenceIndex};
pub use locks::{KeyGuard, KeyedLocks};
pub use types::{FileConfig, HashEntry, HashReference, IdReference, StoreMetadata, StorePaths};
