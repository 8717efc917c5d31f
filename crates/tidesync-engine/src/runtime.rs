//! In-memory runtime state for scheduled tasks
//!
//! Holds the per-task queue of pending fire times and the executing
//! flag. Queues are never persisted; a restart recomputes them from the
//! stored schedules.

use crate::planner;
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet, VecDeque};
use tidesync_types::{ScheduleConfig, TaskId};
use tokio::sync::RwLock;
use tracing::debug;

/// Queue length below which a schedule's fire times are replenished
const LOW_WATER_MARK: usize = 3;

#[derive(Debug)]
struct ScheduledTaskRuntime {
    schedule: ScheduleConfig,
    queue: VecDeque<NaiveDateTime>,
    executing: bool,
    last_executed: Option<NaiveDateTime>,
}

#[derive(Debug, Default)]
struct State {
    tasks: HashMap<TaskId, ScheduledTaskRuntime>,
    /// Manual executions of tasks with no scheduled runtime entry
    manual: HashSet<TaskId>,
}

/// Runtime map `TaskId -> queue + executing flag` behind a narrow
/// interface
///
/// The map itself is never exposed; every state transition goes through
/// a method holding the write lock, so the due check and the executing
/// flag cannot race across ticks.
#[derive(Debug, Default)]
pub struct RuntimeStore {
    inner: RwLock<State>,
}

impl RuntimeStore {
    /// Create an empty runtime store
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the runtime for a schedule with its initial
    /// fire-time queue
    pub async fn insert(&self, schedule: ScheduleConfig, initial: Vec<NaiveDateTime>) {
        let task_id = schedule.task_id;
        let mut state = self.inner.write().await;
        state.tasks.insert(
            task_id,
            ScheduledTaskRuntime {
                schedule,
                queue: initial.into(),
                executing: false,
                last_executed: None,
            },
        );
        debug!("Runtime installed for task {}", task_id);
    }

    /// Drop the runtime for a task; returns false when none existed
    pub async fn remove(&self, task_id: TaskId) -> bool {
        self.inner.write().await.tasks.remove(&task_id).is_some()
    }

    /// Whether a runtime exists for the task
    pub async fn contains(&self, task_id: TaskId) -> bool {
        self.inner.read().await.tasks.contains_key(&task_id)
    }

    /// Tasks whose head fire time has passed and that are not already
    /// executing
    pub async fn due_tasks(&self, now: NaiveDateTime) -> Vec<TaskId> {
        self.inner
            .read()
            .await
            .tasks
            .iter()
            .filter(|(_, rt)| {
                rt.schedule.enabled
                    && !rt.executing
                    && rt.queue.front().is_some_and(|head| *head <= now)
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// Atomically claim a due task for execution
    ///
    /// Pops every fire time at or before `now` (missed firings while the
    /// queue sat due are skipped, not replayed), sets the executing flag,
    /// and returns the earliest popped time. Returns `None` when the task
    /// is unknown, disabled, already executing, or not due.
    pub async fn begin_execution(
        &self,
        task_id: TaskId,
        now: NaiveDateTime,
    ) -> Option<NaiveDateTime> {
        let mut state = self.inner.write().await;
        let rt = state.tasks.get_mut(&task_id)?;
        if !rt.schedule.enabled || rt.executing {
            return None;
        }
        let mut fired = None;
        while rt.queue.front().is_some_and(|head| *head <= now) {
            let head = rt.queue.pop_front();
            if fired.is_none() {
                fired = head;
            }
        }
        if fired.is_some() {
            rt.executing = true;
        }
        fired
    }

    /// Claim a task for a manual execution without consuming a fire time
    ///
    /// Returns false when the task is already executing. Tasks with no
    /// runtime entry are tracked in a separate executing set, so the
    /// overlap guard holds for unscheduled tasks too.
    pub async fn begin_manual(&self, task_id: TaskId) -> bool {
        let mut guard = self.inner.write().await;
        let state = &mut *guard;
        match state.tasks.get_mut(&task_id) {
            Some(rt) if rt.executing => false,
            Some(rt) => {
                rt.executing = true;
                true
            }
            None => state.manual.insert(task_id),
        }
    }

    /// Clear the executing flag and record when the task last ran
    pub async fn finish_execution(&self, task_id: TaskId, when: NaiveDateTime) {
        let mut state = self.inner.write().await;
        state.manual.remove(&task_id);
        if let Some(rt) = state.tasks.get_mut(&task_id) {
            rt.executing = false;
            rt.last_executed = Some(when);
        }
    }

    /// Replenish every enabled queue below the low-water mark
    ///
    /// Newly computed times are merged future-only and deduplicated, so
    /// repeated top-ups never produce double firings.
    pub async fn top_up_low_queues(&self, now: NaiveDateTime) {
        let mut state = self.inner.write().await;
        for (task_id, rt) in state.tasks.iter_mut() {
            if !rt.schedule.enabled || rt.queue.len() >= LOW_WATER_MARK {
                continue;
            }
            let fresh = planner::compute_fire_times(&rt.schedule, now, planner::DEFAULT_FIRE_COUNT);
            let before = rt.queue.len();
            for t in fresh {
                if t > now && !rt.queue.contains(&t) {
                    rt.queue.push_back(t);
                }
            }
            let mut sorted: Vec<_> = rt.queue.drain(..).collect();
            sorted.sort_unstable();
            rt.queue = sorted.into();
            if rt.queue.len() > before {
                debug!(
                    "Queue for task {} topped up from {} to {} fire times",
                    task_id,
                    before,
                    rt.queue.len()
                );
            }
        }
    }

    /// The next up-to-`count` fire times for a task, ascending
    pub async fn next_times(&self, task_id: TaskId, count: usize) -> Vec<NaiveDateTime> {
        self.inner
            .read()
            .await
            .tasks
            .get(&task_id)
            .map(|rt| rt.queue.iter().take(count).copied().collect())
            .unwrap_or_default()
    }

    /// Whether the task is currently executing
    pub async fn is_executing(&self, task_id: TaskId) -> bool {
        let state = self.inner.read().await;
        state.manual.contains(&task_id)
            || state.tasks.get(&task_id).is_some_and(|rt| rt.executing)
    }

    /// Number of executions currently in flight
    pub async fn executing_count(&self) -> usize {
        let state = self.inner.read().await;
        state.manual.len() + state.tasks.values().filter(|rt| rt.executing).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tidesync_types::ScheduleConfig;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn interval_schedule() -> ScheduleConfig {
        ScheduleConfig::interval(TaskId::new(), 30)
    }

    #[tokio::test]
    async fn test_due_then_begin_then_finish() {
        let store = RuntimeStore::new();
        let schedule = interval_schedule();
        let id = schedule.task_id;
        store
            .insert(schedule, vec![at(2, 9, 0), at(2, 9, 30)])
            .await;

        assert!(store.due_tasks(at(2, 8, 0)).await.is_empty());
        assert_eq!(store.due_tasks(at(2, 9, 5)).await, vec![id]);

        let fired = store.begin_execution(id, at(2, 9, 5)).await;
        assert_eq!(fired, Some(at(2, 9, 0)));
        assert!(store.is_executing(id).await);
        // While executing the task is never reported due again.
        assert!(store.due_tasks(at(2, 9, 35)).await.is_empty());
        assert!(store.begin_execution(id, at(2, 9, 35)).await.is_none());

        store.finish_execution(id, at(2, 9, 6)).await;
        assert!(!store.is_executing(id).await);
        assert_eq!(store.begin_execution(id, at(2, 9, 35)).await, Some(at(2, 9, 30)));
    }

    #[tokio::test]
    async fn test_begin_drains_all_missed_times() {
        let store = RuntimeStore::new();
        let schedule = interval_schedule();
        let id = schedule.task_id;
        store
            .insert(schedule, vec![at(2, 9, 0), at(2, 9, 30), at(2, 10, 0), at(2, 11, 0)])
            .await;

        // Three fire times have passed; one execution fires, two are
        // dropped rather than replayed.
        let fired = store.begin_execution(id, at(2, 10, 30)).await;
        assert_eq!(fired, Some(at(2, 9, 0)));
        assert_eq!(store.next_times(id, 10).await, vec![at(2, 11, 0)]);
    }

    #[tokio::test]
    async fn test_disabled_schedule_never_due() {
        let store = RuntimeStore::new();
        let schedule = interval_schedule().with_enabled(false);
        let id = schedule.task_id;
        store.insert(schedule, vec![at(2, 9, 0)]).await;

        assert!(store.due_tasks(at(2, 12, 0)).await.is_empty());
        assert!(store.begin_execution(id, at(2, 12, 0)).await.is_none());
    }

    #[tokio::test]
    async fn test_top_up_merges_future_only_deduplicated() {
        let store = RuntimeStore::new();
        let schedule = interval_schedule(); // every 30 minutes
        let id = schedule.task_id;
        // Two entries: below the low-water mark.
        store
            .insert(schedule, vec![at(2, 9, 30), at(2, 10, 0)])
            .await;

        store.top_up_low_queues(at(2, 9, 0)).await;
        let times = store.next_times(id, 20).await;
        // 9:30 and 10:00 regenerate from the planner as well; no dupes.
        assert_eq!(times.iter().filter(|t| **t == at(2, 9, 30)).count(), 1);
        assert!(times.len() >= 10);
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        assert!(times.iter().all(|t| *t > at(2, 9, 0)));
    }

    #[tokio::test]
    async fn test_top_up_skips_full_queues() {
        let store = RuntimeStore::new();
        let schedule = interval_schedule();
        let id = schedule.task_id;
        let full = vec![at(3, 1, 0), at(3, 2, 0), at(3, 3, 0), at(3, 4, 0)];
        store.insert(schedule, full.clone()).await;

        store.top_up_low_queues(at(2, 9, 0)).await;
        assert_eq!(store.next_times(id, 10).await, full);
    }

    #[tokio::test]
    async fn test_begin_manual_guard() {
        let store = RuntimeStore::new();
        let schedule = interval_schedule();
        let id = schedule.task_id;
        store.insert(schedule, vec![at(2, 9, 0)]).await;

        assert!(store.begin_manual(id).await);
        assert!(!store.begin_manual(id).await);
        store.finish_execution(id, at(2, 9, 1)).await;
        assert!(store.begin_manual(id).await);
    }

    #[tokio::test]
    async fn test_begin_manual_guards_unscheduled_tasks() {
        let store = RuntimeStore::new();
        let id = TaskId::new();

        // No runtime entry exists, yet the second claim is refused.
        assert!(store.begin_manual(id).await);
        assert!(!store.begin_manual(id).await);
        assert!(store.is_executing(id).await);
        assert_eq!(store.executing_count().await, 1);

        store.finish_execution(id, at(2, 9, 1)).await;
        assert!(!store.is_executing(id).await);
        assert_eq!(store.executing_count().await, 0);
        assert!(store.begin_manual(id).await);
    }

    #[tokio::test]
    async fn test_remove_and_executing_count() {
        let store = RuntimeStore::new();
        let schedule = interval_schedule();
        let id = schedule.task_id;
        store.insert(schedule, vec![at(2, 9, 0)]).await;

        store.begin_execution(id, at(2, 9, 5)).await.unwrap();
        assert_eq!(store.executing_count().await, 1);

        assert!(store.remove(id).await);
        assert!(!store.remove(id).await);
        assert_eq!(store.executing_count().await, 0);
        assert!(store.next_times(id, 5).await.is_empty());
    }
}
