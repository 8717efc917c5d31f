//! Outcome types produced by task executions

use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Overall status of one copy operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopyStatus {
    /// Execution has started and is still running
    InProgress,
    /// All considered files succeeded (including the zero-file case)
    Completed,
    /// Some files succeeded and some failed
    PartialSuccess,
    /// No file succeeded, or the operation failed before any file
    Failed,
}

impl CopyStatus {
    /// Check if the operation has reached a terminal state
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::PartialSuccess | Self::Failed)
    }
}

/// What the duplicate resolver decided for one file/destination pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileAction {
    /// File was copied to the naive destination path
    Copied,
    /// Destination already held an equivalent file; nothing was written
    Skipped,
    /// File was copied under a generated alternate name
    Renamed,
}

/// Outcome of one file transferred to one destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOperationResult {
    /// Source file path
    pub source: PathBuf,
    /// Resolved destination path; differs from the naive destination
    /// when the file was renamed
    pub destination: PathBuf,
    /// What was done with the file
    pub action: FileAction,
    /// Whether the operation succeeded
    pub success: bool,
    /// Error message when the operation failed
    pub error: Option<String>,
    /// Source file size in bytes
    pub size: u64,
    /// When the file was processed
    pub timestamp: DateTime<Utc>,
}

impl FileOperationResult {
    /// Record a successful copy
    pub fn copied(source: PathBuf, destination: PathBuf, size: u64) -> Self {
        Self::finished(source, destination, FileAction::Copied, size)
    }

    /// Record a skip (destination already equivalent)
    pub fn skipped(source: PathBuf, destination: PathBuf, size: u64) -> Self {
        Self::finished(source, destination, FileAction::Skipped, size)
    }

    /// Record a successful copy under an alternate name
    pub fn renamed(source: PathBuf, destination: PathBuf, size: u64) -> Self {
        Self::finished(source, destination, FileAction::Renamed, size)
    }

    fn finished(source: PathBuf, destination: PathBuf, action: FileAction, size: u64) -> Self {
        Self {
            source,
            destination,
            action,
            success: true,
            error: None,
            size,
            timestamp: Utc::now(),
        }
    }

    /// Record a per-file failure
    pub fn failed(
        source: PathBuf,
        destination: PathBuf,
        size: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            source,
            destination,
            action: FileAction::Copied,
            success: false,
            error: Some(error.into()),
            size,
            timestamp: Utc::now(),
        }
    }
}

/// Result of one full task execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyOperationResult {
    /// Identifier of the executed task
    pub task_id: TaskId,
    /// Denormalized task name, for logging
    pub task_name: String,
    /// Overall status
    pub status: CopyStatus,
    /// When the execution started
    pub start_time: DateTime<Utc>,
    /// When the execution finished
    pub end_time: Option<DateTime<Utc>>,
    /// Number of file/destination pairs considered
    pub total_files: usize,
    /// Number of successful file operations
    pub successful_files: usize,
    /// Number of failed file operations
    pub failed_files: usize,
    /// Per-file outcomes, in processing order
    pub file_results: Vec<FileOperationResult>,
    /// Operation-level error, when the execution failed as a whole
    pub general_error: Option<String>,
}

impl CopyOperationResult {
    /// Start a new in-progress result for a task
    pub fn started(task_id: TaskId, task_name: impl Into<String>) -> Self {
        Self {
            task_id,
            task_name: task_name.into(),
            status: CopyStatus::InProgress,
            start_time: Utc::now(),
            end_time: None,
            total_files: 0,
            successful_files: 0,
            failed_files: 0,
            file_results: Vec::new(),
            general_error: None,
        }
    }

    /// Record a per-file result, updating the success/failure counters
    pub fn record(&mut self, file_result: FileOperationResult) {
        if file_result.success {
            self.successful_files += 1;
        } else {
            self.failed_files += 1;
        }
        self.file_results.push(file_result);
    }

    /// Finish with a status derived from the per-file counters:
    /// Completed when nothing failed, PartialSuccess on a mix, Failed
    /// when nothing succeeded
    pub fn finish(&mut self) {
        self.status = if self.failed_files == 0 {
            CopyStatus::Completed
        } else if self.successful_files > 0 {
            CopyStatus::PartialSuccess
        } else {
            CopyStatus::Failed
        };
        self.end_time = Some(Utc::now());
    }

    /// Finish as failed with an operation-level error
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = CopyStatus::Failed;
        self.general_error = Some(error.into());
        self.end_time = Some(Utc::now());
    }

    /// Wall-clock duration of the execution, zero while in progress
    pub fn duration(&self) -> Duration {
        self.end_time
            .and_then(|end| (end - self.start_time).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }
}
