//! Candidate file selection for copy tasks
//!
//! Given a task, the selector produces the ordered list of source files
//! to copy: explicit file names take precedence when present, otherwise
//! glob patterns are unioned against the top level of the source
//! directory (all files when no pattern is given). The result is
//! deduplicated and filtered by the task's attribute conditions.
//!
//! Selection never fails: enumeration errors are logged and whatever was
//! gathered so far is returned. An unreadable source directory yields an
//! empty list; the caller decides whether that is a task-level failure.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use chrono::{DateTime, Local, NaiveDateTime};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tidesync_types::{CopyTask, SelectionCondition};
use tracing::{debug, warn};

/// Select the files a task should copy, in ascending path order
pub async fn select_files(task: &CopyTask) -> Vec<PathBuf> {
    let candidates = if task.specific_files.is_empty() {
        enumerate_by_pattern(&task.source_dir, &task.patterns).await
    } else {
        resolve_specific_files(&task.source_dir, &task.specific_files).await
    };

    let mut selected = Vec::with_capacity(candidates.len());
    for path in candidates {
        if evaluate_conditions(&path, &task.conditions).await {
            selected.push(path);
        }
    }
    selected
}

/// Resolve explicit file names against the source directory
///
/// A named file that does not exist is omitted, not an error.
async fn resolve_specific_files(source_dir: &Path, names: &[String]) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();
    for name in names {
        let path = source_dir.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                found.insert(path);
            }
            Ok(_) => {
                debug!("Named entry {} is not a regular file", path.display());
            }
            Err(_) => {
                debug!("Named file {} not found in source", path.display());
            }
        }
    }
    found.into_iter().collect()
}

/// Union glob patterns against the top level of the source directory
async fn enumerate_by_pattern(source_dir: &Path, patterns: &[String]) -> Vec<PathBuf> {
    let glob_set = match build_glob_set(patterns) {
        Some(set) => set,
        None => return Vec::new(),
    };

    let mut entries = match tokio::fs::read_dir(source_dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                "Failed to read source directory {}: {}",
                source_dir.display(),
                e
            );
            return Vec::new();
        }
    };

    let mut found = BTreeSet::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(
                    "Error while enumerating {}: {}",
                    source_dir.display(),
                    e
                );
                break;
            }
        };
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        match glob_set {
            Some(ref set) if !set.is_match(entry.file_name()) => {}
            _ => {
                found.insert(entry.path());
            }
        }
    }
    found.into_iter().collect()
}

/// Compile patterns into a glob set; `None` inner value means match-all
///
/// Returns `None` (match nothing) only when every given pattern was
/// invalid; individual bad patterns are logged and dropped.
fn build_glob_set(patterns: &[String]) -> Option<Option<GlobSet>> {
    if patterns.is_empty() {
        return Some(None);
    }
    let mut builder = GlobSetBuilder::new();
    let mut valid = 0usize;
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
                valid += 1;
            }
            Err(e) => warn!("Ignoring invalid glob pattern '{}': {}", pattern, e),
        }
    }
    if valid == 0 {
        return None;
    }
    match builder.build() {
        Ok(set) => Some(Some(set)),
        Err(e) => {
            warn!("Failed to build glob set: {}", e);
            None
        }
    }
}

/// Evaluate a conjunction of conditions against one file
///
/// A file that no longer exists at evaluation time is excluded.
pub async fn evaluate_conditions(path: &Path, conditions: &[SelectionCondition]) -> bool {
    if conditions.is_empty() {
        return true;
    }
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(_) => return false,
    };
    conditions.iter().all(|c| check_condition(path, &meta, c))
}

fn check_condition(path: &Path, meta: &Metadata, condition: &SelectionCondition) -> bool {
    match condition {
        SelectionCondition::ModifiedToday => {
            matches_today(meta.modified().ok(), path, "modified")
        }
        SelectionCondition::ModifiedSince(since) => {
            matches_since(meta.modified().ok(), *since, path, "modified")
        }
        SelectionCondition::CreatedToday => matches_today(meta.created().ok(), path, "created"),
        SelectionCondition::CreatedSince(since) => {
            matches_since(meta.created().ok(), *since, path, "created")
        }
        SelectionCondition::SizeGreaterThan(bytes) => meta.len() > *bytes,
        SelectionCondition::SizeLessThan(bytes) => meta.len() < *bytes,
        SelectionCondition::Extension(ext) => extension_matches(path, ext),
        SelectionCondition::NameContains(needle) => name_contains(path, needle),
    }
}

fn matches_today(time: Option<SystemTime>, path: &Path, what: &str) -> bool {
    match to_local(time) {
        Some(ts) => ts.date_naive() == Local::now().date_naive(),
        None => {
            warn!("No {} timestamp available for {}", what, path.display());
            false
        }
    }
}

fn matches_since(
    time: Option<SystemTime>,
    since: NaiveDateTime,
    path: &Path,
    what: &str,
) -> bool {
    match to_local(time) {
        Some(ts) => ts.naive_local() >= since,
        None => {
            warn!("No {} timestamp available for {}", what, path.display());
            false
        }
    }
}

fn to_local(time: Option<SystemTime>) -> Option<DateTime<Local>> {
    time.map(DateTime::<Local>::from)
}

/// Case-insensitive, dot-insensitive extension match
fn extension_matches(path: &Path, ext: &str) -> bool {
    let wanted = ext.trim_start_matches('.');
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
}

/// Case-insensitive substring match against the name without extension
fn name_contains(path: &Path, needle: &str) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| stem.to_lowercase().contains(&needle.to_lowercase()))
}
