//! Durable task and schedule stores for tidesync
//!
//! Both stores keep their collections in memory behind an async lock and
//! mirror them to a human-readable JSON document, written wholesale on
//! every mutation. Mutations persist first and commit to memory only when
//! the write succeeded, so a failed save surfaces as an error and the
//! in-memory state never diverges from disk.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tidesync_types::{Error, Result};
use tracing::debug;

pub mod schedule_store;
pub mod task_store;

pub use schedule_store::ScheduleStore;
pub use task_store::TaskStore;

/// Serialize a collection to pretty JSON and write it wholesale
async fn write_json<T: Serialize>(path: &Path, values: &[T]) -> Result<()> {
    let json = serde_json::to_vec_pretty(values)
        .map_err(|e| Error::persistence(format!("failed to serialize {}: {e}", path.display())))?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            Error::persistence(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    tokio::fs::write(path, json)
        .await
        .map_err(|e| Error::persistence(format!("failed to write {}: {e}", path.display())))?;
    debug!("Persisted {} records to {}", values.len(), path.display());
    Ok(())
}

/// Read a collection back from JSON; a missing file is an empty collection
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| Error::persistence(format!("failed to parse {}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Store file {} does not exist yet", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(Error::persistence(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}
