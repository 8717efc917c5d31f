//! Duplicate-aware streaming copy engine
//!
//! Two pieces: the [`resolver`], which decides per file whether to copy,
//! skip, overwrite, or rename based on the task's duplicate policy and
//! comparison strategy, and the [`executor`], which streams one file to
//! its destination through a bounded buffer with cooperative
//! cancellation.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod compare;
pub mod executor;
pub mod resolver;

pub use compare::files_equal;
pub use executor::{copy_file, COPY_BUFFER_SIZE};
pub use resolver::{resolve, CopyDecision, DecisionReason};
