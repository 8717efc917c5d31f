//! Durable mapping from task identifier to schedule configuration

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tidesync_types::{Result, ScheduleConfig, TaskId};
use tokio::sync::RwLock;
use tracing::{debug, info};

const SCHEDULES_FILE: &str = "schedules.json";

/// Durable store of [`ScheduleConfig`] records, one per task id
#[derive(Debug)]
pub struct ScheduleStore {
    inner: RwLock<HashMap<TaskId, ScheduleConfig>>,
    path: PathBuf,
}

impl ScheduleStore {
    /// Create a store persisting to `schedules.json` under `config_dir`
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            path: config_dir.as_ref().join(SCHEDULES_FILE),
        }
    }

    /// Load schedules from disk, replacing the in-memory collection
    pub async fn load(&self) -> Result<()> {
        let schedules: Vec<ScheduleConfig> = super::read_json(&self.path).await?;
        let count = schedules.len();
        let mut map = self.inner.write().await;
        map.clear();
        for schedule in schedules {
            map.insert(schedule.task_id, schedule);
        }
        info!("Loaded {} schedules from {}", count, self.path.display());
        Ok(())
    }

    /// Insert or replace the schedule for its task, persisting the
    /// updated collection
    pub async fn upsert(&self, schedule: ScheduleConfig) -> Result<()> {
        let task_id = schedule.task_id;
        let mut map = self.inner.write().await;
        let mut next = map.clone();
        next.insert(task_id, schedule);
        self.persist(&next).await?;
        *map = next;
        debug!("Schedule stored for task {}", task_id);
        Ok(())
    }

    /// Remove the schedule for a task; returns false when none existed
    pub async fn remove(&self, task_id: TaskId) -> Result<bool> {
        let mut map = self.inner.write().await;
        if !map.contains_key(&task_id) {
            return Ok(false);
        }
        let mut next = map.clone();
        next.remove(&task_id);
        self.persist(&next).await?;
        *map = next;
        info!("Schedule removed for task {}", task_id);
        Ok(true)
    }

    /// Look up the schedule for a task
    pub async fn get(&self, task_id: TaskId) -> Option<ScheduleConfig> {
        self.inner.read().await.get(&task_id).cloned()
    }

    /// All schedules, in unspecified order
    pub async fn all(&self) -> Vec<ScheduleConfig> {
        self.inner.read().await.values().cloned().collect()
    }

    /// All enabled schedules
    pub async fn enabled(&self) -> Vec<ScheduleConfig> {
        self.inner
            .read()
            .await
            .values()
            .filter(|s| s.enabled)
            .cloned()
            .collect()
    }

    async fn persist(&self, map: &HashMap<TaskId, ScheduleConfig>) -> Result<()> {
        let values: Vec<&ScheduleConfig> = map.values().collect();
        super::write_json(&self.path, &values).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upsert_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let store = ScheduleStore::new(dir.path());
        let task_id = TaskId::new();

        store
            .upsert(ScheduleConfig::interval(task_id, 15))
            .await
            .unwrap();
        store
            .upsert(ScheduleConfig::daily(
                task_id,
                vec![NaiveTime::from_hms_opt(8, 0, 0).unwrap()],
            ))
            .await
            .unwrap();

        assert_eq!(store.all().await.len(), 1);
        let schedule = store.get(task_id).await.unwrap();
        assert_eq!(schedule.kind, tidesync_types::ScheduleKind::Daily);
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let task_id = TaskId::new();
        let schedule = ScheduleConfig::weekly(
            task_id,
            vec![chrono::Weekday::Tue],
            vec![NaiveTime::from_hms_opt(17, 30, 0).unwrap()],
        );

        {
            let store = ScheduleStore::new(dir.path());
            store.upsert(schedule.clone()).await.unwrap();
        }

        let reloaded = ScheduleStore::new(dir.path());
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.get(task_id).await.unwrap(), schedule);
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = ScheduleStore::new(dir.path());
        let task_id = TaskId::new();

        store
            .upsert(ScheduleConfig::interval(task_id, 5))
            .await
            .unwrap();
        assert!(store.remove(task_id).await.unwrap());
        assert!(!store.remove(task_id).await.unwrap());
        assert!(store.get(task_id).await.is_none());
    }

    #[tokio::test]
    async fn test_enabled_filter() {
        let dir = TempDir::new().unwrap();
        let store = ScheduleStore::new(dir.path());

        store
            .upsert(ScheduleConfig::interval(TaskId::new(), 5))
            .await
            .unwrap();
        store
            .upsert(ScheduleConfig::interval(TaskId::new(), 5).with_enabled(false))
            .await
            .unwrap();

        assert_eq!(store.enabled().await.len(), 1);
    }
}
