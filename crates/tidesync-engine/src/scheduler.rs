//! Periodic tick loop driving due-task dispatch
//!
//! The loop's only job is to notice due tasks and hand them to the
//! dispatcher; it never awaits dispatched work, so a slow copy cannot
//! stall scheduling for every other task.

use crate::runtime::RuntimeStore;
use chrono::{Local, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;
use tidesync_types::TaskId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default tick period
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(30);

/// Callback invoked for each claimed due task
///
/// Implementations must return promptly; spawn the actual execution.
pub type Dispatch = Arc<dyn Fn(TaskId, NaiveDateTime) + Send + Sync>;

/// Handle to the spawned scheduling loop
#[derive(Debug)]
pub struct TickLoop {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl TickLoop {
    /// Spawn the loop over a runtime store
    ///
    /// Each tick claims every due task (setting its executing flag),
    /// invokes `dispatch` for it, then replenishes low fire-time queues.
    pub fn spawn(period: Duration, runtime: Arc<RuntimeStore>, dispatch: Dispatch) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Tick loop shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let now = Local::now().naive_local();
                        tick(&runtime, &dispatch, now).await;
                    }
                }
            }
        });
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Signal the loop to stop and wait for it to exit
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.handle.await {
            warn!("Tick loop task failed: {}", e);
        }
    }
}

async fn tick(runtime: &RuntimeStore, dispatch: &Dispatch, now: NaiveDateTime) {
    for task_id in runtime.due_tasks(now).await {
        // Claim atomically; another claimant may have won in between.
        if let Some(fired) = runtime.begin_execution(task_id, now).await {
            debug!("Task {} due (scheduled for {})", task_id, fired);
            dispatch(task_id, fired);
        }
    }
    runtime.top_up_low_queues(now).await;
}
