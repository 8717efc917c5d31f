//! Core type system and error handling for tidesync
//!
//! This crate provides the foundational types shared across the tidesync
//! workspace:
//!
//! - **Task model**: [`CopyTask`], selection conditions, duplicate policies
//! - **Schedule model**: [`ScheduleConfig`] and its validation rules
//! - **Results**: per-operation and per-file outcome types
//! - **Events**: best-effort notifications raised by the engine
//! - **Error handling**: structured [`Error`] type and [`Result`] alias
//!
//! # Examples
//!
//! ```rust
//! use tidesync_types::{CopyTask, DuplicatePolicy, ComparisonStrategy};
//!
//! let task = CopyTask::new("nightly-reports", "/data/reports")
//!     .add_destination("/backup/reports")
//!     .add_pattern("*.csv")
//!     .with_policy(DuplicatePolicy::Skip)
//!     .with_comparison(ComparisonStrategy::HashContent);
//! assert!(task.enabled);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod event;
pub mod result;
pub mod schedule;
pub mod task;

pub use error::Error;
pub use event::EngineEvent;
pub use result::{CopyOperationResult, CopyStatus, FileAction, FileOperationResult};
pub use schedule::{ScheduleConfig, ScheduleKind};
pub use task::{ComparisonStrategy, CopyTask, DuplicatePolicy, SelectionCondition, TaskId};

/// Result type alias used throughout tidesync.
pub type Result<T> = std::result::Result<T, Error>;
