//! core type-safe wrappers for cache identifiers and payloads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cache version identifier.
///
/// Version ids are used as file names and as shard prefixes, so they have
/// the same restrictions as other path components. Generated ids are
/// lowercase ULIDs; callers may also supply their own.
///
/// Valid ids:
/// - 4-128 characters (the first four form the shard prefix)
/// - Alphanumeric, underscores, hyphens only
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheId(String);

impl CacheId {
    const MIN_LEN: usize = 4;
    const MAX_LEN: usize = 128;

    /// create a new CacheId, validating the input
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidNameError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    fn validate(id: &str) -> Result<(), InvalidNameError> {
        if id.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        if id.len() < Self::MIN_LEN {
            return Err(InvalidNameError::TooShort(id.len()));
        }
        if id.len() > Self::MAX_LEN {
            return Err(InvalidNameError::TooLong(id.len()));
        }
        for (i, c) in id.chars().enumerate() {
            if !c.is_ascii_alphanumeric() && c != '_' && c != '-' {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }
        Ok(())
    }

    /// Generate a new ULID-based id.
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string().to_lowercase())
    }

    /// `{id[0:2]}/{id[2:4]}`
    pub fn shard(&self) -> String {
        shard(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CacheId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A content hash: lowercase hex, 10-96 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheHash(String);

impl CacheHash {
    pub fn new(hash: impl Into<String>) -> Result<Self, InvalidNameError> {
        let hash = hash.into();
        if hash.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        if hash.len() < 10 {
            return Err(InvalidNameError::TooShort(hash.len()));
        }
        if hash.len() > 96 {
            return Err(InvalidNameError::TooLong(hash.len()));
        }
        for (i, c) in hash.chars().enumerate() {
            if !matches!(c, '0'..='9' | 'a'..='f') {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }
        Ok(Self(hash))
    }

    /// `{hash[0:2]}/{hash[2:4]}`
    pub fn shard(&self) -> String {
        shard(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for CacheHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A validated namespace.
///
/// Namespaces are the first segment of every stored path.
///
/// Valid names:
/// - 1-64 characters
/// - Alphanumeric, underscores, hyphens, dots
/// - Cannot start with a dot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace(String);

impl Namespace {
    pub const DEFAULT: &'static str = "default";

    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), InvalidNameError> {
        if name.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        if name.len() > 64 {
            return Err(InvalidNameError::TooLong(name.len()));
        }
        if name.starts_with('.') {
            return Err(InvalidNameError::InvalidStart('.'));
        }
        for (i, c) in name.chars().enumerate() {
            if !c.is_ascii_alphanumeric() && !matches!(c, '_' | '-' | '.') {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A caller-supplied hierarchical key, e.g. `reports/2024/q1`.
///
/// Used verbatim as a path fragment by the key-based strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SemanticKey(String);

impl SemanticKey {
    pub fn new(key: impl Into<String>) -> Result<Self, InvalidNameError> {
        let key = key.into();
        if key.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        if key.len() > 256 {
            return Err(InvalidNameError::TooLong(key.len()));
        }
        for (i, c) in key.chars().enumerate() {
            if !c.is_ascii_alphanumeric() && !matches!(c, '_' | '-' | '.' | '/') {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }
        if let Some(segment) = key
            .split('/')
            .find(|s| s.is_empty() || *s == "." || *s == "..")
        {
            return Err(InvalidNameError::InvalidSegment(segment.to_string()));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SemanticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn shard(value: &str) -> String {
    let first = value.get(..2).unwrap_or(value);
    let second = value.get(2..4).unwrap_or("_");
    format!("{}/{}", first, second)
}

/// Kind of payload stored in a cache version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    String,
    Json,
    Binary,
}

impl ContentKind {
    /// file extension for content files of this kind
    pub fn ext(&self) -> &'static str {
        match self {
            Self::String => "txt",
            Self::Json => "json",
            Self::Binary => "bin",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Json => "json",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transfer encoding applied to stored bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    Gzip,
}

impl ContentEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentEncoding {
    type Err = InvalidNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gzip" => Ok(Self::Gzip),
            other => Err(InvalidNameError::Unsupported(other.to_string())),
        }
    }
}

/// A cache payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheContent {
    String(String),
    Json(Value),
    Binary(Vec<u8>),
}

impl CacheContent {
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::String(_) => ContentKind::String,
            Self::Json(_) => ContentKind::Json,
            Self::Binary(_) => ContentKind::Binary,
        }
    }

    /// Bytes as written to the content file.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::String(s) => Ok(s.as_bytes().to_vec()),
            Self::Json(v) => serde_json::to_vec(v),
            Self::Binary(b) => Ok(b.clone()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) => Some(b),
            _ => None,
        }
    }
}

/// error type for invalid identifiers (ids, hashes, namespaces, keys)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooShort(usize),
    TooLong(usize),
    InvalidStart(char),
    InvalidCharacter { char: char, position: usize },
    InvalidSegment(String),
    Unsupported(String),
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "value cannot be empty"),
            Self::TooShort(len) => write!(f, "value too short: {} characters", len),
            Self::TooLong(len) => write!(f, "value too long: {} characters", len),
            Self::InvalidStart(c) => write!(f, "value cannot start with '{}'", c),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character '{}' at position {}", char, position)
            }
            Self::InvalidSegment(segment) => write!(f, "invalid path segment '{}'", segment),
            Self::Unsupported(value) => write!(f, "unsupported value '{}'", value),
        }
    }
}

impl std::error::Error for InvalidNameError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_id() {
        let id = CacheId::generate();
        assert_eq!(id.as_str().len(), 26);
        assert_eq!(id.as_str(), id.as_str().to_lowercase());
        assert!(CacheId::new(id.as_str()).is_ok());

        assert!(CacheId::new("abc").is_err()); // too short for a shard
        assert!(CacheId::new("abc/def").is_err());
        assert!(CacheId::new("my-file_01").is_ok());
        assert_eq!(CacheId::new("abcdef").unwrap().shard(), "ab/cd");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = CacheId::generate();
        let b = CacheId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_cache_hash() {
        assert!(CacheHash::new("2cf24dba5fb0a30e").is_ok());
        assert!(CacheHash::new("2CF24DBA5FB0A30E").is_err());
        assert!(CacheHash::new("2cf24").is_err());
        assert!(CacheHash::new("zzzzzzzzzzzz").is_err());
        assert_eq!(CacheHash::new("2cf24dba5fb0a30e").unwrap().shard(), "2c/f2");
    }

    #[test]
    fn test_namespace() {
        assert!(Namespace::new("ns1").is_ok());
        assert!(Namespace::new("team.alpha-01").is_ok());
        assert!(Namespace::new("").is_err());
        assert!(Namespace::new(".hidden").is_err());
        assert!(Namespace::new("a/b").is_err());
        assert!(Namespace::new("a".repeat(65)).is_err());
        assert_eq!(Namespace::default().as_str(), "default");
    }

    #[test]
    fn test_semantic_key() {
        assert!(SemanticKey::new("reports/2024/q1").is_ok());
        assert!(SemanticKey::new("/abs").is_err());
        assert!(SemanticKey::new("a//b").is_err());
        assert!(SemanticKey::new("a/../b").is_err());
        assert!(SemanticKey::new("a b").is_err());
    }

    #[test]
    fn test_content_kind() {
        assert_eq!(CacheContent::String("x".into()).kind().ext(), "txt");
        assert_eq!(CacheContent::Json(json!({})).kind().ext(), "json");
        assert_eq!(CacheContent::Binary(vec![1]).kind().ext(), "bin");
        assert_eq!(serde_json::to_string(&ContentKind::Binary).unwrap(), "\"binary\"");
    }
}
