//! Content hashing.
//!
//! Hashes are lowercase hex digests truncated to a configured length. They
//! are used to deduplicate payloads and to address the hash index, so the
//! same logical content must always produce the same hash:
//!
//! - bytes and strings hash directly
//! - JSON hashes a canonical serialization with sorted keys
//! - dotted-path fields (`user.profile.id`) hash the extracted value
//!
//! Archive payloads use a separate content rule, see `archive::content_hash`.

mod config;
mod error;
mod generator;

pub use config::{HashAlgorithm, HashConfig, DEFAULT_HASH_LENGTH, MIN_HASH_LENGTH};
pub use error::{HashError, HashResult};
pub use generator::{canonical_json, extract_field, HashGenerator};
