//! Engine events raised to collaborators
//!
//! Events are best-effort notifications, not control flow: the engine
//! publishes them whether or not anyone is listening.

use crate::result::{CopyOperationResult, FileOperationResult};
use crate::task::TaskId;
use chrono::{DateTime, NaiveDateTime, Utc};

/// Notification raised by the engine at an operation boundary
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A task execution has started
    OperationStarted {
        /// Identifier of the task
        task_id: TaskId,
        /// Name of the task
        task_name: String,
        /// When the execution started
        start_time: DateTime<Utc>,
    },
    /// A task execution has finished, with its full result
    OperationCompleted(CopyOperationResult),
    /// One file/destination pair was processed
    FileProcessed {
        /// Identifier of the task
        task_id: TaskId,
        /// Outcome for the file/destination pair
        result: FileOperationResult,
    },
    /// A task was (re)scheduled
    TaskScheduled {
        /// Identifier of the task
        task_id: TaskId,
        /// Name of the task
        task_name: String,
        /// The next computed fire time
        next_fire_time: NaiveDateTime,
    },
    /// A due task is about to execute
    TaskExecuting {
        /// Identifier of the task
        task_id: TaskId,
        /// Name of the task
        task_name: String,
        /// The fire time this execution was scheduled for
        scheduled_for: NaiveDateTime,
    },
}

impl EngineEvent {
    /// Identifier of the task this event concerns
    pub fn task_id(&self) -> TaskId {
        match self {
            Self::OperationStarted { task_id, .. }
            | Self::TaskScheduled { task_id, .. }
            | Self::TaskExecuting { task_id, .. }
            | Self::FileProcessed { task_id, .. } => *task_id,
            Self::OperationCompleted(result) => result.task_id,
        }
    }
}
