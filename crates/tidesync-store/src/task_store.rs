//! Durable mapping from task identifier to copy-task definition

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tidesync_types::{CopyTask, Error, Result, TaskId};
use tokio::sync::RwLock;
use tracing::{debug, info};

const TASKS_FILE: &str = "tasks.json";

/// Durable store of [`CopyTask`] definitions, keyed by task id
#[derive(Debug)]
pub struct TaskStore {
    inner: RwLock<HashMap<TaskId, CopyTask>>,
    path: PathBuf,
}

impl TaskStore {
    /// Create a store persisting to `tasks.json` under `config_dir`
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            path: config_dir.as_ref().join(TASKS_FILE),
        }
    }

    /// Load tasks from disk, replacing the in-memory collection
    ///
    /// A missing file yields an empty store; a malformed file is an error.
    pub async fn load(&self) -> Result<()> {
        let tasks: Vec<CopyTask> = super::read_json(&self.path).await?;
        let count = tasks.len();
        let mut map = self.inner.write().await;
        map.clear();
        for task in tasks {
            map.insert(task.id, task);
        }
        info!("Loaded {} tasks from {}", count, self.path.display());
        Ok(())
    }

    /// Add a new task, persisting the updated collection
    pub async fn add(&self, task: CopyTask) -> Result<TaskId> {
        let task_id = task.id;
        let mut map = self.inner.write().await;
        let mut next = map.clone();
        next.insert(task_id, task);
        self.persist(&next).await?;
        *map = next;
        info!("Task added: {}", task_id);
        Ok(task_id)
    }

    /// Update an existing task; returns false when the id is unknown
    pub async fn update(&self, task: CopyTask) -> Result<bool> {
        let mut map = self.inner.write().await;
        if !map.contains_key(&task.id) {
            return Ok(false);
        }
        let task_id = task.id;
        let mut next = map.clone();
        next.insert(task_id, task);
        self.persist(&next).await?;
        *map = next;
        debug!("Task updated: {}", task_id);
        Ok(true)
    }

    /// Remove a task; returns false when the id is unknown
    pub async fn remove(&self, task_id: TaskId) -> Result<bool> {
        let mut map = self.inner.write().await;
        if !map.contains_key(&task_id) {
            return Ok(false);
        }
        let mut next = map.clone();
        next.remove(&task_id);
        self.persist(&next).await?;
        *map = next;
        info!("Task removed: {}", task_id);
        Ok(true)
    }

    /// Record when a task last executed
    pub async fn set_last_executed(&self, task_id: TaskId, when: DateTime<Utc>) -> Result<()> {
        let mut map = self.inner.write().await;
        let Some(task) = map.get(&task_id) else {
            return Err(Error::TaskNotFound {
                task_id: task_id.to_string(),
            });
        };
        let mut updated = task.clone();
        updated.last_executed = Some(when);
        let mut next = map.clone();
        next.insert(task_id, updated);
        self.persist(&next).await?;
        *map = next;
        Ok(())
    }

    /// Look up one task by id
    pub async fn get(&self, task_id: TaskId) -> Option<CopyTask> {
        self.inner.read().await.get(&task_id).cloned()
    }

    /// All tasks, in unspecified order
    pub async fn all(&self) -> Vec<CopyTask> {
        self.inner.read().await.values().cloned().collect()
    }

    /// All enabled tasks
    pub async fn enabled(&self) -> Vec<CopyTask> {
        self.inner
            .read()
            .await
            .values()
            .filter(|t| t.enabled)
            .cloned()
            .collect()
    }

    async fn persist(&self, map: &HashMap<TaskId, CopyTask>) -> Result<()> {
        let values: Vec<&CopyTask> = map.values().collect();
        super::write_json(&self.path, &values).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_task(name: &str) -> CopyTask {
        CopyTask::new(name, "/data/src").add_destination("/data/dst")
    }

    #[tokio::test]
    async fn test_add_get_remove() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());

        let task = sample_task("one");
        let id = store.add(task.clone()).await.unwrap();

        assert_eq!(store.get(id).await.unwrap().name, "one");
        assert!(store.remove(id).await.unwrap());
        assert!(store.get(id).await.is_none());
        assert!(!store.remove(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_unknown_task() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());
        assert!(!store.update(sample_task("ghost")).await.unwrap());
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let task = sample_task("persisted");
        let id = {
            let store = TaskStore::new(dir.path());
            store.add(task.clone()).await.unwrap()
        };

        let reloaded = TaskStore::new(dir.path());
        reloaded.load().await.unwrap();
        let loaded = reloaded.get(id).await.unwrap();
        assert_eq!(loaded, task);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());
        store.load().await.unwrap();
        assert!(store.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_leaves_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());
        let id = store.add(sample_task("kept")).await.unwrap();

        // Make the store path unwritable by replacing the file with a
        // directory of the same name.
        tokio::fs::remove_file(dir.path().join("tasks.json"))
            .await
            .unwrap();
        tokio::fs::create_dir(dir.path().join("tasks.json"))
            .await
            .unwrap();

        assert!(store.remove(id).await.is_err());
        // The failed removal must not have been committed.
        assert!(store.get(id).await.is_some());
    }

    #[tokio::test]
    async fn test_set_last_executed() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());
        let id = store.add(sample_task("ran")).await.unwrap();

        let when = Utc::now();
        store.set_last_executed(id, when).await.unwrap();
        assert_eq!(store.get(id).await.unwrap().last_executed, Some(when));

        let missing = TaskId::new();
        assert!(store.set_last_executed(missing, when).await.is_err());
    }

    #[tokio::test]
    async fn test_enabled_filter() {
        let dir = TempDir::new().unwrap();
        let store = TaskStore::new(dir.path());
        store.add(sample_task("on")).await.unwrap();
        store
            .add(sample_task("off").with_enabled(false))
            .await
            .unwrap();

        let enabled = store.enabled().await;
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "on");
    }
}
