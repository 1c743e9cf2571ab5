//! Batch mutation of an archive version.
//!
//! Operations run in order against an in-memory working copy. The store is
//! touched once at the end, and only if something was applied.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::archive::codec::ZipContents;
use crate::archive::operations::ArchiveService;
use crate::cache::{CacheError, CacheHash, CacheId, CacheResult, Namespace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchAction {
    Add,
    Remove,
    Replace,
    Rename,
    Move,
}

impl BatchAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
            Self::Rename => "rename",
            Self::Move => "move",
        }
    }
}

/// Precondition checked against the working copy before an op runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchCondition {
    #[default]
    Always,
    IfExists,
    IfNotExists,
}

/// One step of a batch.
///
/// `remove` takes either a `path` or a glob `pattern`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOperation {
    pub action: BatchAction,
    pub path: Option<String>,
    pub content: Option<Vec<u8>>,
    pub new_path: Option<String>,
    pub pattern: Option<String>,
    pub condition: BatchCondition,
}

impl BatchOperation {
    fn new(action: BatchAction) -> Self {
        Self {
            action,
            path: None,
            content: None,
            new_path: None,
            pattern: None,
            condition: BatchCondition::Always,
        }
    }

    pub fn add(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: Some(path.into()),
            content: Some(content.into()),
            ..Self::new(BatchAction::Add)
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new(BatchAction::Remove)
        }
    }

    pub fn remove_matching(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            ..Self::new(BatchAction::Remove)
        }
    }

    pub fn replace(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: Some(path.into()),
            content: Some(content.into()),
            ..Self::new(BatchAction::Replace)
        }
    }

    pub fn rename(path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            new_path: Some(new_path.into()),
            ..Self::new(BatchAction::Rename)
        }
    }

    pub fn relocate(path: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            new_path: Some(new_path.into()),
            ..Self::new(BatchAction::Move)
        }
    }

    pub fn when(mut self, condition: BatchCondition) -> Self {
        self.condition = condition;
        self
    }

    /// Path or pattern, for reporting.
    fn target(&self) -> String {
        self.path
            .clone()
            .or_else(|| self.pattern.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOperationResult {
    pub index: usize,
    pub action: BatchAction,
    pub path: String,
    pub success: bool,
    /// false when the condition skipped the op
    pub applied: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub success: bool,
    /// the version the batch ran against
    pub cache_id: Option<CacheId>,
    pub new_cache_id: Option<CacheId>,
    pub new_cache_hash: Option<CacheHash>,
    pub operations_applied: usize,
    pub operations_failed: usize,
    pub operation_results: Vec<BatchOperationResult>,
    pub files_added: Vec<String>,
    pub files_removed: Vec<String>,
    pub files_modified: Vec<String>,
    pub new_file_count: usize,
    pub new_size: usize,
    pub rollback_performed: bool,
    pub error_message: Option<String>,
}

enum Step {
    Applied,
    Skipped,
}

fn require<'a>(value: &'a Option<String>, field: &str, action: BatchAction) -> Result<&'a str, String> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(format!("{} required for {} operation", field, action.as_str())),
    }
}

fn require_content(op: &BatchOperation) -> Result<&[u8], String> {
    match op.content.as_deref() {
        Some(c) if !c.is_empty() => Ok(c),
        _ => Err(format!("content required for {} operation", op.action.as_str())),
    }
}

fn matching(working: &ZipContents, pattern: &str) -> Result<Vec<String>, String> {
    let pattern = Pattern::new(pattern).map_err(|e| format!("invalid pattern '{}': {}", pattern, e))?;
    Ok(working
        .paths()
        .into_iter()
        .filter(|p| pattern.matches(p))
        .collect())
}

/// Apply one op to the working copy.
fn apply(working: &mut ZipContents, op: &BatchOperation) -> Result<Step, String> {
    // pattern removes test the condition against "any file matches"
    if op.action == BatchAction::Remove && !matches!(op.path.as_deref(), Some(p) if !p.is_empty()) {
        let pattern = require(&op.pattern, "path or pattern", op.action)?;
        let matched = matching(working, pattern)?;
        let skip = match op.condition {
            BatchCondition::Always => false,
            BatchCondition::IfExists => matched.is_empty(),
            BatchCondition::IfNotExists => !matched.is_empty(),
        };
        if skip {
            return Ok(Step::Skipped);
        }
        if matched.is_empty() {
            return Err(format!("no files match pattern '{}'", pattern));
        }
        for path in matched {
            working.remove(&path);
        }
        return Ok(Step::Applied);
    }

    let path = require(&op.path, "path", op.action)?;
    let exists = working.contains(path);
    let skip = match op.condition {
        BatchCondition::Always => false,
        BatchCondition::IfExists => !exists,
        BatchCondition::IfNotExists => exists,
    };
    if skip {
        return Ok(Step::Skipped);
    }

    match op.action {
        BatchAction::Add => {
            let content = require_content(op)?;
            if exists {
                return Err(format!("file '{}' already exists", path));
            }
            working.insert(path, content.to_vec());
        }
        BatchAction::Replace => {
            let content = require_content(op)?;
            if !exists {
                return Err(format!("file '{}' not found", path));
            }
            working.insert(path, content.to_vec());
        }
        BatchAction::Remove => {
            if working.remove(path).is_none() {
                return Err(format!("file '{}' not found", path));
            }
        }
        BatchAction::Rename | BatchAction::Move => {
            let new_path = require(&op.new_path, "new_path", op.action)?;
            if working.contains(new_path) {
                return Err(format!("file '{}' already exists", new_path));
            }
            let content = working
                .remove(path)
                .ok_or_else(|| format!("file '{}' not found", path))?;
            working.insert(new_path, content);
        }
    }
    Ok(Step::Applied)
}

/// Net change between two file sets: (added, removed, modified).
fn diff(before: &ZipContents, after: &ZipContents) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut added = Vec::new();
    let mut modified = Vec::new();
    for (path, content) in after.iter() {
        match before.get(path) {
            None => added.push(path.clone()),
            Some(old) if old != content.as_slice() => modified.push(path.clone()),
            Some(_) => {}
        }
    }
    let removed = before
        .paths()
        .into_iter()
        .filter(|p| !after.contains(p))
        .collect();
    (added, removed, modified)
}

impl ArchiveService {
    /// Apply `ops` to a version and store the result as one new version.
    ///
    /// Atomic batches stop at the first failure and write nothing.
    /// Non-atomic batches record failures and keep going. A new version is
    /// created only if at least one op was applied.
    pub fn batch_operation(
        &self,
        cache_id: &CacheId,
        namespace: &Namespace,
        ops: &[BatchOperation],
        atomic: bool,
    ) -> CacheResult<BatchReport> {
        if ops.is_empty() {
            return Err(CacheError::invalid_input("operations", "at least one operation is required"));
        }

        let mut report = BatchReport {
            cache_id: Some(cache_id.clone()),
            ..Default::default()
        };

        let archive = match self.load(cache_id, namespace)? {
            Ok(archive) => archive,
            Err(failure) => {
                report.error_message = Some(failure.message());
                return Ok(report);
            }
        };

        let mut working = archive.contents.clone();
        for (index, op) in ops.iter().enumerate() {
            let outcome = apply(&mut working, op);
            let (success, applied, error) = match outcome {
                Ok(Step::Applied) => (true, true, None),
                Ok(Step::Skipped) => (true, false, None),
                Err(e) => (false, false, Some(e)),
            };
            if applied {
                report.operations_applied += 1;
            }
            if !success {
                report.operations_failed += 1;
            }
            report.operation_results.push(BatchOperationResult {
                index,
                action: op.action,
                path: op.target(),
                success,
                applied,
                error: error.clone(),
            });

            if let (true, Some(e)) = (atomic, error) {
                warn!(
                    namespace = %namespace,
                    cache_id = %cache_id,
                    index,
                    error = %e,
                    "atomic batch aborted"
                );
                report.rollback_performed = true;
                report.error_message = Some(format!("operation {} failed: {}", index, e));
                report.new_file_count = archive.contents.len();
                return Ok(report);
            }
        }

        let (added, removed, modified) = diff(&archive.contents, &working);
        report.files_added = added;
        report.files_removed = removed;
        report.files_modified = modified;
        report.new_file_count = working.len();

        if report.operations_applied > 0 {
            let stored = self.store_derived(&archive.refs, &working)?;
            report.new_size = stored.stored.size;
            report.new_cache_id = Some(stored.stored.cache_id);
            report.new_cache_hash = Some(stored.stored.cache_hash);
        } else {
            debug!(namespace = %namespace, cache_id = %cache_id, "batch applied nothing");
        }

        report.success = report.operations_failed == 0;
        if !report.success {
            report.error_message = Some(format!("{} operation(s) failed", report.operations_failed));
        }
        Ok(report)
    }
}
