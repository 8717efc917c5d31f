//! Copy task model: identifiers, selection rules, and duplicate handling

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for a copy task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new random task ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Behavior when a destination file already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Skip the copy when source and destination compare equal,
    /// overwrite when they differ
    #[default]
    Skip,
    /// Always overwrite the destination
    Overwrite,
    /// Overwrite only when the source mtime is strictly newer
    OverwriteIfNewer,
    /// Copy under a generated alternate name when contents differ
    RenameNew,
}

/// Method used to decide whether source and destination are the same file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComparisonStrategy {
    /// Exact size equality and exact mtime equality
    #[default]
    SizeAndDate,
    /// Size equality only
    SizeOnly,
    /// Mtime equality only
    DateOnly,
    /// Streaming content digest comparison (slowest, most precise)
    HashContent,
}

/// Attribute condition a candidate file must satisfy to be selected
///
/// Conditions on a task are conjunctive: a file is selected only when it
/// satisfies every condition in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum SelectionCondition {
    /// Modification date is today
    ModifiedToday,
    /// Modified at or after the given instant
    ModifiedSince(NaiveDateTime),
    /// Creation date is today
    CreatedToday,
    /// Created at or after the given instant
    CreatedSince(NaiveDateTime),
    /// File size strictly greater than the given byte count
    SizeGreaterThan(u64),
    /// File size strictly less than the given byte count
    SizeLessThan(u64),
    /// Extension matches, case-insensitive, leading dot ignored
    Extension(String),
    /// File name (without extension) contains the substring,
    /// case-insensitive
    NameContains(String),
}

/// A periodic file copy task definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyTask {
    /// Unique task identifier
    pub id: TaskId,
    /// Human-readable task name
    pub name: String,
    /// Directory files are copied from
    pub source_dir: PathBuf,
    /// Directories files are copied to, in configured order
    pub destinations: Vec<PathBuf>,
    /// Explicit file names to copy; takes precedence over `patterns`
    /// when non-empty
    #[serde(default)]
    pub specific_files: Vec<String>,
    /// Glob patterns evaluated against the source directory
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Conjunctive attribute conditions
    #[serde(default)]
    pub conditions: Vec<SelectionCondition>,
    /// Whether the task participates in scheduling
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Behavior when a destination file already exists
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// Comparison strategy backing the duplicate policy
    #[serde(default)]
    pub comparison: ComparisonStrategy,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// When the task last ran, if ever
    #[serde(default)]
    pub last_executed: Option<DateTime<Utc>>,
}

fn default_enabled() -> bool {
    true
}

impl CopyTask {
    /// Create a new task copying from `source_dir`
    pub fn new(name: impl Into<String>, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: TaskId::new(),
            name: name.into(),
            source_dir: source_dir.into(),
            destinations: Vec::new(),
            specific_files: Vec::new(),
            patterns: Vec::new(),
            conditions: Vec::new(),
            enabled: true,
            duplicate_policy: DuplicatePolicy::default(),
            comparison: ComparisonStrategy::default(),
            created_at: Utc::now(),
            last_executed: None,
        }
    }

    /// Add a destination directory
    pub fn add_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destinations.push(destination.into());
        self
    }

    /// Add a glob pattern
    pub fn add_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    /// Add an explicit file name
    pub fn add_specific_file(mut self, name: impl Into<String>) -> Self {
        self.specific_files.push(name.into());
        self
    }

    /// Add a selection condition
    pub fn add_condition(mut self, condition: SelectionCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Set the duplicate-handling policy
    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Set the duplicate-comparison strategy
    pub fn with_comparison(mut self, comparison: ComparisonStrategy) -> Self {
        self.comparison = comparison;
        self
    }

    /// Enable or disable the task
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
