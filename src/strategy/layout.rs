//! One path layout per storage strategy.

use chrono::{DateTime, Utc};

use crate::cache::{CacheId, SemanticKey};
use crate::strategy::types::StorageStrategy;

/// Everything a layout needs to place one content file.
#[derive(Debug, Clone)]
pub struct PathTarget<'a> {
    pub file_id: &'a CacheId,
    pub semantic_key: Option<&'a SemanticKey>,
    pub ext: &'a str,
    pub timestamp: DateTime<Utc>,
    /// next free `versions/vN` number, only read by versioned layouts
    pub version: u32,
}

impl PathTarget<'_> {
    fn file_name(&self) -> String {
        format!("{}.{}", self.file_id, self.ext)
    }

    fn dated(&self) -> String {
        self.timestamp.format("%Y/%m/%d/%H").to_string()
    }
}

/// Maps a file id (and optional semantic key) to content paths.
///
/// `base` is the strategy root, `{namespace}/data/{slug}`. The first path
/// returned is the primary content file.
pub trait PathLayout: Send + Sync {
    fn strategy(&self) -> StorageStrategy;

    fn content_paths(&self, base: &str, target: &PathTarget<'_>) -> Vec<String>;

    /// whether [`PathTarget::version`] must be resolved before calling
    fn uses_versions(&self) -> bool {
        false
    }
}

pub struct DirectLayout;

impl PathLayout for DirectLayout {
    fn strategy(&self) -> StorageStrategy {
        StorageStrategy::Direct
    }

    fn content_paths(&self, base: &str, target: &PathTarget<'_>) -> Vec<String> {
        vec![format!("{}/{}/{}", base, target.file_id.shard(), target.file_name())]
    }
}

pub struct TemporalLayout;

impl PathLayout for TemporalLayout {
    fn strategy(&self) -> StorageStrategy {
        StorageStrategy::Temporal
    }

    fn content_paths(&self, base: &str, target: &PathTarget<'_>) -> Vec<String> {
        vec![format!("{}/{}/{}", base, target.dated(), target.file_name())]
    }
}

pub struct TemporalLatestLayout;

impl PathLayout for TemporalLatestLayout {
    fn strategy(&self) -> StorageStrategy {
        StorageStrategy::TemporalLatest
    }

    fn content_paths(&self, base: &str, target: &PathTarget<'_>) -> Vec<String> {
        vec![
            format!("{}/{}/{}", base, target.dated(), target.file_name()),
            format!("{}/latest/{}", base, target.file_name()),
        ]
    }
}

pub struct TemporalVersionedLayout;

impl PathLayout for TemporalVersionedLayout {
    fn strategy(&self) -> StorageStrategy {
        StorageStrategy::TemporalVersioned
    }

    fn content_paths(&self, base: &str, target: &PathTarget<'_>) -> Vec<String> {
        vec![
            format!("{}/{}/{}", base, target.dated(), target.file_name()),
            format!("{}/latest/{}", base, target.file_name()),
            format!("{}/versions/v{}/{}", base, target.version, target.file_name()),
        ]
    }

    fn uses_versions(&self) -> bool {
        true
    }
}

pub struct KeyBasedLayout;

impl PathLayout for KeyBasedLayout {
    fn strategy(&self) -> StorageStrategy {
        StorageStrategy::KeyBased
    }

    fn content_paths(&self, base: &str, target: &PathTarget<'_>) -> Vec<String> {
        match target.semantic_key {
            Some(key) => vec![format!("{}/{}/{}", base, key, target.file_name())],
            None => vec![format!("{}/{}", base, target.file_name())],
        }
    }
}

/// the layout implementing `strategy`
pub fn layout_for(strategy: StorageStrategy) -> &'static dyn PathLayout {
    match strategy {
        StorageStrategy::Direct => &DirectLayout,
        StorageStrategy::Temporal => &TemporalLayout,
        StorageStrategy::TemporalLatest => &TemporalLatestLayout,
        StorageStrategy::TemporalVersioned => &TemporalVersionedLayout,
        StorageStrategy::KeyBased => &KeyBasedLayout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn target<'a>(id: &'a CacheId, key: Option<&'a SemanticKey>) -> PathTarget<'a> {
        PathTarget {
            file_id: id,
            semantic_key: key,
            ext: "json",
            timestamp: Utc.with_ymd_and_hms(2024, 3, 7, 9, 30, 0).unwrap(),
            version: 3,
        }
    }

    #[test]
    fn test_direct() {
        let id = CacheId::new("abcdef01").unwrap();
        let paths = DirectLayout.content_paths("ns/data/direct", &target(&id, None));
        assert_eq!(paths, vec!["ns/data/direct/ab/cd/abcdef01.json"]);
    }

    #[test]
    fn test_temporal_family() {
        let id = CacheId::new("abcdef01").unwrap();
        let t = target(&id, None);

        assert_eq!(
            TemporalLayout.content_paths("ns/data/temporal", &t),
            vec!["ns/data/temporal/2024/03/07/09/abcdef01.json"]
        );
        assert_eq!(
            TemporalLatestLayout.content_paths("ns/data/temporal-latest", &t),
            vec![
                "ns/data/temporal-latest/2024/03/07/09/abcdef01.json",
                "ns/data/temporal-latest/latest/abcdef01.json",
            ]
        );
        assert_eq!(
            TemporalVersionedLayout.content_paths("ns/data/temporal-versioned", &t)[2],
            "ns/data/temporal-versioned/versions/v3/abcdef01.json"
        );
    }

    #[test]
    fn test_key_based() {
        let id = CacheId::new("abcdef01").unwrap();
        let key = SemanticKey::new("reports/2024").unwrap();
        assert_eq!(
            KeyBasedLayout.content_paths("ns/data/key-based", &target(&id, Some(&key))),
            vec!["ns/data/key-based/reports/2024/abcdef01.json"]
        );
        assert_eq!(
            KeyBasedLayout.content_paths("ns/data/key-based", &target(&id, None)),
            vec!["ns/data/key-based/abcdef01.json"]
        );
    }

    #[test]
    fn test_layout_for_matches_strategy() {
        for strategy in StorageStrategy::ALL {
            assert_eq!(layout_for(strategy).strategy(), strategy);
        }
    }
}
