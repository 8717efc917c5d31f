//! Fire-time computation
//!
//! Pure functions from a schedule and a reference instant to the list of
//! upcoming fire times. Nothing here touches a clock; callers inject
//! "now", which keeps every cadence testable at fixed instants.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use tidesync_types::{ScheduleConfig, ScheduleKind};

/// How many fire times a schedule's queue is seeded with
pub const DEFAULT_FIRE_COUNT: usize = 10;

/// Cap on day offsets scanned for Daily schedules
const DAILY_SCAN_CAP_DAYS: i64 = 366;

/// Cap on day offsets scanned for Weekly schedules
const WEEKLY_SCAN_CAP_DAYS: i64 = 365;

/// Compute up to `count` fire times strictly after `now`
///
/// Results are filtered by the schedule's validity window, sorted
/// ascending, and truncated to `count`. An empty result is valid: a
/// schedule whose window has closed simply has nothing left to fire.
///
/// Monthly schedules fire only on the first day of each month; no
/// day-of-month selection exists.
pub fn compute_fire_times(
    schedule: &ScheduleConfig,
    now: NaiveDateTime,
    count: usize,
) -> Vec<NaiveDateTime> {
    if count == 0 {
        return Vec::new();
    }
    let mut times = match schedule.kind {
        ScheduleKind::Interval => interval_times(schedule, now, count),
        ScheduleKind::Daily => daily_times(schedule, now, count),
        ScheduleKind::Weekly => weekly_times(schedule, now, count),
        ScheduleKind::Monthly => monthly_times(schedule, now, count),
    };
    times.retain(|t| in_window(schedule, *t));
    times.sort_unstable();
    times.truncate(count);
    times
}

fn in_window(schedule: &ScheduleConfig, t: NaiveDateTime) -> bool {
    if let Some(start) = schedule.start_date {
        if t < start {
            return false;
        }
    }
    if let Some(end) = schedule.end_date {
        if t > end {
            return false;
        }
    }
    true
}

/// `now + k * interval` for k = 1..=count, unaligned to the wall clock
fn interval_times(schedule: &ScheduleConfig, now: NaiveDateTime, count: usize) -> Vec<NaiveDateTime> {
    let step = Duration::minutes(i64::from(schedule.interval_minutes));
    (1..=count).map(|k| now + step * (k as i32)).collect()
}

fn daily_times(schedule: &ScheduleConfig, now: NaiveDateTime, count: usize) -> Vec<NaiveDateTime> {
    let mut times = Vec::with_capacity(count);
    for offset in 0..DAILY_SCAN_CAP_DAYS {
        let day = now.date() + Duration::days(offset);
        for time in &schedule.execution_times {
            let candidate = day.and_time(*time);
            if candidate > now {
                times.push(candidate);
            }
        }
        if times.len() >= count {
            break;
        }
    }
    times
}

fn weekly_times(schedule: &ScheduleConfig, now: NaiveDateTime, count: usize) -> Vec<NaiveDateTime> {
    let mut times = Vec::with_capacity(count);
    for offset in 0..WEEKLY_SCAN_CAP_DAYS {
        let day = now.date() + Duration::days(offset);
        if !schedule.days_of_week.contains(&day.weekday()) {
            continue;
        }
        for time in &schedule.execution_times {
            let candidate = day.and_time(*time);
            if candidate > now {
                times.push(candidate);
            }
        }
        if times.len() >= count {
            break;
        }
    }
    times
}

fn monthly_times(schedule: &ScheduleConfig, now: NaiveDateTime, count: usize) -> Vec<NaiveDateTime> {
    let mut times = Vec::with_capacity(count);
    for months_ahead in 0..=count as u32 {
        let Some(first) = first_of_month(now.date(), months_ahead) else {
            continue;
        };
        for time in &schedule.execution_times {
            let candidate = first.and_time(*time);
            if candidate > now {
                times.push(candidate);
            }
        }
        if times.len() >= count {
            break;
        }
    }
    times
}

/// First day of the month `months_ahead` months after `date`'s month
fn first_of_month(date: NaiveDate, months_ahead: u32) -> Option<NaiveDate> {
    let total = date.year() * 12 + date.month0() as i32 + months_ahead as i32;
    NaiveDate::from_ymd_opt(total.div_euclid(12), (total.rem_euclid(12) + 1) as u32, 1)
}
