//! One full task execution: select, resolve, copy, report

use tidesync_copy::{copy_file, resolve};
use tidesync_types::{CopyOperationResult, CopyTask, EngineEvent, FileOperationResult};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Execute a copy task to completion (or cancellation)
///
/// Every selected file is attempted against every destination; per-file
/// failures are recorded and do not abort the run. Cancellation aborts
/// between files and marks the whole operation failed.
pub(crate) async fn run_task(
    task: &CopyTask,
    token: &CancellationToken,
    events: &broadcast::Sender<EngineEvent>,
) -> CopyOperationResult {
    let mut result = CopyOperationResult::started(task.id, &task.name);
    let _ = events.send(EngineEvent::OperationStarted {
        task_id: task.id,
        task_name: task.name.clone(),
        start_time: result.start_time,
    });
    info!("Executing task '{}' ({})", task.name, task.id);

    match tokio::fs::metadata(&task.source_dir).await {
        Ok(meta) if meta.is_dir() => {}
        _ => {
            result.fail(format!(
                "source directory does not exist: {}",
                task.source_dir.display()
            ));
            let _ = events.send(EngineEvent::OperationCompleted(result.clone()));
            return result;
        }
    }

    let files = tidesync_select::select_files(task).await;

    for dest_dir in &task.destinations {
        if let Err(e) = tokio::fs::create_dir_all(dest_dir).await {
            warn!("Cannot create destination {}: {}", dest_dir.display(), e);
        }
    }

    'outer: for file in &files {
        let size = tokio::fs::metadata(file).await.map(|m| m.len()).unwrap_or(0);
        for dest_dir in &task.destinations {
            if token.is_cancelled() {
                result.fail("operation cancelled");
                break 'outer;
            }
            let Some(file_name) = file.file_name() else {
                continue;
            };
            let naive_dest = dest_dir.join(file_name);
            result.total_files += 1;

            let file_result =
                process_one(task, file, &naive_dest, size, token).await;
            match file_result {
                Some(fr) => {
                    let _ = events.send(EngineEvent::FileProcessed {
                        task_id: task.id,
                        result: fr.clone(),
                    });
                    result.record(fr);
                }
                None => {
                    result.fail("operation cancelled");
                    break 'outer;
                }
            }
        }
    }

    if !result.status.is_finished() {
        result.finish();
    }
    info!(
        "Task '{}' finished: {:?} ({}/{} files ok)",
        task.name, result.status, result.successful_files, result.total_files
    );
    let _ = events.send(EngineEvent::OperationCompleted(result.clone()));
    result
}

/// Resolve and (maybe) copy one file to one destination
///
/// Returns `None` only on cancellation.
async fn process_one(
    task: &CopyTask,
    source: &std::path::Path,
    naive_dest: &std::path::Path,
    size: u64,
    token: &CancellationToken,
) -> Option<FileOperationResult> {
    let decision = match resolve(source, naive_dest, task.duplicate_policy, task.comparison).await {
        Ok(d) => d,
        Err(e) if e.is_cancelled() => return None,
        Err(e) => {
            return Some(FileOperationResult::failed(
                source.to_path_buf(),
                naive_dest.to_path_buf(),
                size,
                e.to_string(),
            ));
        }
    };

    if !decision.copy {
        return Some(FileOperationResult::skipped(
            source.to_path_buf(),
            decision.dest,
            size,
        ));
    }

    match copy_file(source, &decision.dest, token).await {
        Ok(bytes) => Some(if decision.is_renamed() {
            FileOperationResult::renamed(source.to_path_buf(), decision.dest, bytes)
        } else {
            FileOperationResult::copied(source.to_path_buf(), decision.dest, bytes)
        }),
        Err(e) if e.is_cancelled() => None,
        Err(e) => Some(FileOperationResult::failed(
            source.to_path_buf(),
            decision.dest,
            size,
            e.to_string(),
        )),
    }
}
