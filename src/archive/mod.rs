//! Immutable versioning of zip archives.
//!
//! An archive is stored as a binary cache entry whose hash covers its files,
//! not its bytes. Mutations never touch the stored version:
//!
//! ```text
//!   v1 (stored) ──load──► ZipContents ──op(s)──► working copy
//!                                                     │
//!   v1 untouched                     re-encode + store│
//!                                                     ▼
//!                                               v2 (new cache id)
//! ```
//!
//! [`ArchiveService::single_operation`] runs one read or mutation;
//! [`ArchiveService::batch_operation`] folds many mutations into one new
//! version, optionally all-or-nothing.

mod batch;
mod codec;
mod operations;

pub use batch::{BatchAction, BatchCondition, BatchOperation, BatchOperationResult, BatchReport};
pub use codec::{validate, ZipContents};
pub use operations::{ArchiveOperation, ArchiveOperationResult, ArchiveService, ArchiveStoreResponse};
