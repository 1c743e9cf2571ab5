//! core path rules shared by every byte store backend.

use std::fmt;

/// Validate a store path.
///
/// Store paths are `/`-separated and relative. They are used as file names on
/// disk and as index paths inside git, so they are restricted to prevent path
/// traversal:
/// - not empty, not absolute
/// - no empty, `.` or `..` segments
/// - no backslashes or NUL bytes
pub fn validate_path(path: &str) -> Result<(), InvalidPathError> {
    if path.is_empty() {
        return Err(InvalidPathError::Empty);
    }
    if path.starts_with('/') {
        return Err(InvalidPathError::Absolute(path.to_string()));
    }
    if let Some(c) = path.chars().find(|c| *c == '\\' || *c == '\0') {
        return Err(InvalidPathError::InvalidCharacter {
            path: path.to_string(),
            char: c,
        });
    }
    for segment in path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(InvalidPathError::InvalidSegment {
                path: path.to_string(),
                segment: segment.to_string(),
            });
        }
    }
    Ok(())
}

/// Validate a listing prefix.
///
/// Prefixes follow the path rules, except that the empty prefix (list
/// everything) and a single trailing slash are allowed.
pub fn validate_prefix(prefix: &str) -> Result<(), InvalidPathError> {
    let trimmed = prefix.strip_suffix('/').unwrap_or(prefix);
    if trimmed.is_empty() {
        return Ok(());
    }
    validate_path(trimmed)
}

/// returns true if `path` lives under `prefix` (segment aware)
pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.strip_suffix('/').unwrap_or(prefix);
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// error type for invalid store paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidPathError {
    Empty,
    Absolute(String),
    InvalidCharacter { path: String, char: char },
    InvalidSegment { path: String, segment: String },
}

impl fmt::Display for InvalidPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "path cannot be empty"),
            Self::Absolute(path) => write!(f, "path must be relative: '{}'", path),
            Self::InvalidCharacter { path, char } => {
                write!(f, "invalid character {:?} in '{}'", char, path)
            }
            Self::InvalidSegment { path, segment } => {
                write!(f, "invalid segment '{}' in '{}'", segment, path)
            }
        }
    }
}

impl std::error::Error for InvalidPathError {}
