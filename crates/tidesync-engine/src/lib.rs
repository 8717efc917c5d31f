//! Schedule engine and orchestration for periodic file synchronization
//!
//! The engine computes fire times from declarative schedules
//! ([`planner`]), keeps per-task queues with an overlap guard
//! ([`runtime`]), drives due tasks from a periodic tick ([`scheduler`]),
//! and exposes the whole system through [`SyncService`].

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod execution;
pub mod planner;
pub mod runtime;
pub mod scheduler;
pub mod service;

pub use planner::{compute_fire_times, DEFAULT_FIRE_COUNT};
pub use runtime::RuntimeStore;
pub use scheduler::{TickLoop, DEFAULT_TICK_PERIOD};
pub use service::{SyncService, DEFAULT_PREVIEW_COUNT};
