//! Storage strategy names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Physical layout used for a cache version's content files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageStrategy {
    /// flat, sharded by the first characters of the file id
    #[default]
    Direct,
    /// one dated location per store call
    Temporal,
    /// dated location plus a fixed `latest/` pointer
    TemporalLatest,
    /// dated, `latest/` and numbered `versions/vN` locations
    TemporalVersioned,
    /// caller-supplied semantic key as the directory
    KeyBased,
}

impl StorageStrategy {
    pub const ALL: [StorageStrategy; 5] = [
        Self::Direct,
        Self::Temporal,
        Self::TemporalLatest,
        Self::TemporalVersioned,
        Self::KeyBased,
    ];

    /// canonical name, as stored in index records
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Temporal => "temporal",
            Self::TemporalLatest => "temporal_latest",
            Self::TemporalVersioned => "temporal_versioned",
            Self::KeyBased => "key_based",
        }
    }

    /// path segment under `{namespace}/data/`
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Temporal => "temporal",
            Self::TemporalLatest => "temporal-latest",
            Self::TemporalVersioned => "temporal-versioned",
            Self::KeyBased => "key-based",
        }
    }
}

impl fmt::Display for StorageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageStrategy {
    type Err = UnknownStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s || strategy.slug() == s)
            .ok_or_else(|| UnknownStrategyError(s.to_string()))
    }
}

/// Raised for a strategy name that is not one of the five layouts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown storage strategy '{0}' (expected one of: direct, temporal, temporal_latest, temporal_versioned, key_based)")]
pub struct UnknownStrategyError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_spellings() {
        for strategy in StorageStrategy::ALL {
            assert_eq!(strategy.as_str().parse::<StorageStrategy>().unwrap(), strategy);
            assert_eq!(strategy.slug().parse::<StorageStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_unknown_strategy() {
        let err = "sharded".parse::<StorageStrategy>().unwrap_err();
        assert_eq!(err.0, "sharded");
        assert!(err.to_string().contains("key_based"));
    }

    #[test]
    fn test_serde_uses_canonical_name() {
        let json = serde_json::to_string(&StorageStrategy::TemporalLatest).unwrap();
        assert_eq!(json, "\"temporal_latest\"");
    }
}
