//! Content store and reference index orchestration.
//!
//! [`CacheService`] is the entry point. A store call flows through:
//!
//! ```text
//! payload ──► HashGenerator ──► NamespaceHandler ──► ByteStore
//!                                   (paths)          (content + sidecars)
//!                                                        │
//!                                      ReferenceIndex ◄──┘
//!                                   (by-hash append, by-id create)
//! ```
//!
//! Retrieval resolves through one of the two indices; deletes sweep every
//! recorded path and detach the version from its hash entry.

mod error;
mod service;
mod store;
mod types;

pub use error::{CacheError, CacheResult};
pub use service::{
    CacheService, DeleteReport, DeleteStatus, EntryDetails, NamespaceStats, RetrievedContent,
    StoreOptions, StoreRequest, StoreResponse, UpdateReport, DEFAULT_TTL_HOURS,
};
pub use types::{
    CacheContent, CacheHash, CacheId, ContentEncoding, ContentKind, InvalidNameError, Namespace,
    SemanticKey,
};
