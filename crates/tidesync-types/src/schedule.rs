//! Schedule configuration model and validation

use crate::error::Error;
use crate::task::TaskId;
use chrono::{NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Cadence of a schedule, determining how fire times are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleKind {
    /// Fixed interval in minutes, unaligned to wall-clock boundaries
    Interval,
    /// One or more times of day, every day
    Daily,
    /// One or more times of day on a set of weekdays
    Weekly,
    /// One or more times of day on the first day of each month
    Monthly,
}

/// Declarative schedule for one task
///
/// Exactly one schedule exists per task identifier; it is removed when
/// its task is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Identifier of the owning task
    pub task_id: TaskId,
    /// Cadence of the schedule
    pub kind: ScheduleKind,
    /// Times of day to fire (Daily/Weekly/Monthly)
    #[serde(default)]
    pub execution_times: Vec<NaiveTime>,
    /// Weekdays to fire on (Weekly)
    #[serde(default)]
    pub days_of_week: Vec<Weekday>,
    /// Minutes between firings (Interval)
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
    /// Fire times before this instant are excluded
    #[serde(default)]
    pub start_date: Option<NaiveDateTime>,
    /// Fire times after this instant are excluded
    #[serde(default)]
    pub end_date: Option<NaiveDateTime>,
    /// Whether the schedule is active
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_interval_minutes() -> u32 {
    60
}

fn default_enabled() -> bool {
    true
}

impl ScheduleConfig {
    /// Create an interval schedule firing every `minutes` minutes
    pub fn interval(task_id: TaskId, minutes: u32) -> Self {
        Self {
            task_id,
            kind: ScheduleKind::Interval,
            execution_times: Vec::new(),
            days_of_week: Vec::new(),
            interval_minutes: minutes,
            start_date: None,
            end_date: None,
            enabled: true,
        }
    }

    /// Create a daily schedule firing at the given times of day
    pub fn daily(task_id: TaskId, times: Vec<NaiveTime>) -> Self {
        Self {
            task_id,
            kind: ScheduleKind::Daily,
            execution_times: times,
            days_of_week: Vec::new(),
            interval_minutes: default_interval_minutes(),
            start_date: None,
            end_date: None,
            enabled: true,
        }
    }

    /// Create a weekly schedule firing at the given times on the given days
    pub fn weekly(task_id: TaskId, days: Vec<Weekday>, times: Vec<NaiveTime>) -> Self {
        Self {
            task_id,
            kind: ScheduleKind::Weekly,
            execution_times: times,
            days_of_week: days,
            interval_minutes: default_interval_minutes(),
            start_date: None,
            end_date: None,
            enabled: true,
        }
    }

    /// Create a monthly schedule firing at the given times on the first
    /// day of each month
    pub fn monthly(task_id: TaskId, times: Vec<NaiveTime>) -> Self {
        Self {
            task_id,
            kind: ScheduleKind::Monthly,
            execution_times: times,
            days_of_week: Vec::new(),
            interval_minutes: default_interval_minutes(),
            start_date: None,
            end_date: None,
            enabled: true,
        }
    }

    /// Restrict fire times to the given validity window
    pub fn with_window(
        mut self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Enable or disable the schedule
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Validate the configuration against its kind
    ///
    /// Malformed schedules are rejected here, at creation time, before
    /// anything is queued.
    pub fn validate(&self) -> Result<(), Error> {
        match self.kind {
            ScheduleKind::Interval => {
                if self.interval_minutes == 0 {
                    return Err(Error::config(
                        "interval schedule requires interval_minutes > 0",
                    ));
                }
            }
            ScheduleKind::Daily | ScheduleKind::Monthly => {
                if self.execution_times.is_empty() {
                    return Err(Error::config(format!(
                        "{:?} schedule requires at least one execution time",
                        self.kind
                    )));
                }
            }
            ScheduleKind::Weekly => {
                if self.execution_times.is_empty() {
                    return Err(Error::config(
                        "weekly schedule requires at least one execution time",
                    ));
                }
                if self.days_of_week.is_empty() {
                    return Err(Error::config(
                        "weekly schedule requires at least one day of week",
                    ));
                }
            }
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(Error::config("schedule end_date precedes start_date"));
            }
        }
        Ok(())
    }
}
