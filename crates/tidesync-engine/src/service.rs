//! Orchestration facade tying stores, runtime, and the tick loop
//! together

use crate::execution;
use crate::planner::{self, DEFAULT_FIRE_COUNT};
use crate::runtime::RuntimeStore;
use crate::scheduler::{Dispatch, TickLoop, DEFAULT_TICK_PERIOD};
use chrono::{Local, NaiveDateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tidesync_store::{ScheduleStore, TaskStore};
use tidesync_types::{
    CopyOperationResult, CopyTask, EngineEvent, Error, Result, ScheduleConfig, TaskId,
};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How many fire times a queue preview returns by default
pub const DEFAULT_PREVIEW_COUNT: usize = 5;

/// How long [`SyncService::stop`] waits for in-flight executions
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const EVENT_CAPACITY: usize = 128;

/// The periodic file synchronization service
///
/// Owns the durable stores, the runtime queues, and the tick loop.
/// Construct once, [`start`](Self::start) to begin scheduling, and
/// [`stop`](Self::stop) to shut down; `stop` is terminal for the
/// service instance.
#[derive(Debug)]
pub struct SyncService {
    tasks: Arc<TaskStore>,
    schedules: Arc<ScheduleStore>,
    runtime: Arc<RuntimeStore>,
    events: broadcast::Sender<EngineEvent>,
    cancel: CancellationToken,
    tick: Mutex<Option<TickLoop>>,
    tick_period: Duration,
}

impl SyncService {
    /// Create a service persisting under `config_dir`
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self::with_tick_period(config_dir, DEFAULT_TICK_PERIOD)
    }

    /// Create a service with a custom tick period
    pub fn with_tick_period(config_dir: impl AsRef<Path>, tick_period: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            tasks: Arc::new(TaskStore::new(&config_dir)),
            schedules: Arc::new(ScheduleStore::new(&config_dir)),
            runtime: Arc::new(RuntimeStore::new()),
            events,
            cancel: CancellationToken::new(),
            tick: Mutex::new(None),
            tick_period,
        }
    }

    /// Subscribe to engine events
    ///
    /// Events are best-effort; a lagging receiver misses old events
    /// rather than slowing the engine down.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Load both stores and begin scheduling
    ///
    /// Runtime queues are recomputed from persisted schedules: every
    /// enabled schedule whose task still exists and is enabled gets a
    /// fresh fire-time queue. Starting an already-started service is an
    /// error.
    pub async fn start(&self) -> Result<()> {
        let mut tick = self.tick.lock().await;
        if tick.is_some() {
            return Err(Error::other("service is already started"));
        }
        self.tasks.load().await?;
        self.schedules.load().await?;

        let now = Local::now().naive_local();
        for schedule in self.schedules.enabled().await {
            let Some(task) = self.tasks.get(schedule.task_id).await else {
                warn!(
                    "Schedule for unknown task {} left dormant",
                    schedule.task_id
                );
                continue;
            };
            if !task.enabled {
                continue;
            }
            let times = planner::compute_fire_times(&schedule, now, DEFAULT_FIRE_COUNT);
            self.runtime.insert(schedule, times).await;
        }

        let dispatch = self.make_dispatch();
        let tick_loop = TickLoop::spawn(self.tick_period, Arc::clone(&self.runtime), dispatch);
        *tick = Some(tick_loop);
        info!("Service started ({} tasks)", self.tasks.all().await.len());
        Ok(())
    }

    /// Stop the tick loop, cancel in-flight copies, and wait a bounded
    /// grace period for executions to drain
    pub async fn stop(&self) {
        if let Some(tick_loop) = self.tick.lock().await.take() {
            tick_loop.stop().await;
        }
        self.cancel.cancel();

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        while self.runtime.executing_count().await > 0 {
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    "{} execution(s) still in flight at shutdown",
                    self.runtime.executing_count().await
                );
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        info!("Service stopped");
    }

    /// Create a task, optionally scheduling it in the same call
    pub async fn create_task(
        &self,
        task: CopyTask,
        schedule: Option<ScheduleConfig>,
    ) -> Result<TaskId> {
        let task_id = self.tasks.add(task).await?;
        if let Some(config) = schedule {
            self.schedule_task(task_id, config).await?;
        }
        Ok(task_id)
    }

    /// Replace an existing task definition
    pub async fn update_task(&self, task: CopyTask) -> Result<()> {
        let task_id = task.id;
        if !self.tasks.update(task).await? {
            return Err(Error::TaskNotFound {
                task_id: task_id.to_string(),
            });
        }
        Ok(())
    }

    /// Delete a task, unscheduling it and dropping its schedule
    pub async fn delete_task(&self, task_id: TaskId) -> Result<()> {
        self.runtime.remove(task_id).await;
        self.schedules.remove(task_id).await?;
        if !self.tasks.remove(task_id).await? {
            return Err(Error::TaskNotFound {
                task_id: task_id.to_string(),
            });
        }
        Ok(())
    }

    /// Look up one task
    pub async fn get_task(&self, task_id: TaskId) -> Option<CopyTask> {
        self.tasks.get(task_id).await
    }

    /// All tasks
    pub async fn tasks(&self) -> Vec<CopyTask> {
        self.tasks.all().await
    }

    /// Schedule (or reschedule) a task
    ///
    /// The config is validated and the task must exist before anything
    /// is persisted or queued.
    pub async fn schedule_task(&self, task_id: TaskId, mut config: ScheduleConfig) -> Result<()> {
        config.task_id = task_id;
        config.validate()?;
        let Some(task) = self.tasks.get(task_id).await else {
            return Err(Error::TaskNotFound {
                task_id: task_id.to_string(),
            });
        };

        let now = Local::now().naive_local();
        let times = planner::compute_fire_times(&config, now, DEFAULT_FIRE_COUNT);
        self.schedules.upsert(config.clone()).await?;
        self.runtime.insert(config, times.clone()).await;

        if let Some(first) = times.first() {
            info!("Task '{}' scheduled; next fire at {}", task.name, first);
            let _ = self.events.send(EngineEvent::TaskScheduled {
                task_id,
                task_name: task.name,
                next_fire_time: *first,
            });
        } else {
            warn!("Task '{}' scheduled but no future fire times exist", task.name);
        }
        Ok(())
    }

    /// Remove a task's schedule and runtime queue; returns false when
    /// the task had no schedule
    pub async fn unschedule_task(&self, task_id: TaskId) -> Result<bool> {
        self.runtime.remove(task_id).await;
        self.schedules.remove(task_id).await
    }

    /// Look up the schedule for a task
    pub async fn get_schedule(&self, task_id: TaskId) -> Option<ScheduleConfig> {
        self.schedules.get(task_id).await
    }

    /// All schedules
    pub async fn schedules(&self) -> Vec<ScheduleConfig> {
        self.schedules.all().await
    }

    /// Preview the next [`DEFAULT_PREVIEW_COUNT`] fire times for a task
    pub async fn next_execution_times(&self, task_id: TaskId) -> Vec<NaiveDateTime> {
        self.next_execution_times_n(task_id, DEFAULT_PREVIEW_COUNT)
            .await
    }

    /// Preview the next `count` fire times for a task
    pub async fn next_execution_times_n(
        &self,
        task_id: TaskId,
        count: usize,
    ) -> Vec<NaiveDateTime> {
        self.runtime.next_times(task_id, count).await
    }

    /// Execute a task immediately, outside its schedule
    ///
    /// Shares the scheduled code path, including the per-task overlap
    /// guard: a task already executing is rejected rather than doubled.
    pub async fn execute_task_now(&self, task_id: TaskId) -> Result<CopyOperationResult> {
        let Some(task) = self.tasks.get(task_id).await else {
            return Err(Error::TaskNotFound {
                task_id: task_id.to_string(),
            });
        };
        if !self.runtime.begin_manual(task_id).await {
            return Err(Error::other(format!(
                "task '{}' is already executing",
                task.name
            )));
        }

        let result = execution::run_task(&task, &self.cancel, &self.events).await;
        self.finish(task_id).await;
        Ok(result)
    }

    async fn finish(&self, task_id: TaskId) {
        let now = Local::now().naive_local();
        self.runtime.finish_execution(task_id, now).await;
        if let Err(e) = self.tasks.set_last_executed(task_id, Utc::now()).await {
            warn!("Failed to persist last-executed for {}: {}", task_id, e);
        }
    }

    fn make_dispatch(&self) -> Dispatch {
        let tasks = Arc::clone(&self.tasks);
        let runtime = Arc::clone(&self.runtime);
        let events = self.events.clone();
        let cancel = self.cancel.clone();
        Arc::new(move |task_id, scheduled_for| {
            let tasks = Arc::clone(&tasks);
            let runtime = Arc::clone(&runtime);
            let events = events.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let Some(task) = tasks.get(task_id).await else {
                    error!("Due task {} has no stored definition", task_id);
                    runtime.remove(task_id).await;
                    return;
                };
                if !task.enabled {
                    runtime
                        .finish_execution(task_id, Local::now().naive_local())
                        .await;
                    return;
                }
                let _ = events.send(EngineEvent::TaskExecuting {
                    task_id,
                    task_name: task.name.clone(),
                    scheduled_for,
                });
                execution::run_task(&task, &cancel, &events).await;
                runtime
                    .finish_execution(task_id, Local::now().naive_local())
                    .await;
                if let Err(e) = tasks.set_last_executed(task_id, Utc::now()).await {
                    warn!("Failed to persist last-executed for {}: {}", task_id, e);
                }
            });
        })
    }
}
