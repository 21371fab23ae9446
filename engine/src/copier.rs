//! Parallel copy pipeline.
//!
//! Each task runs the state machine
//! `Pending → [Hashing] → Copying → [Verifying] → Done | Failed`.
//! A fixed pool of worker threads drains a shared task queue. Workers send
//! results back over a channel; the coordinating thread is the only writer
//! to the progress sink and to the error list.

use crossbeam_channel::unbounded;
use std::io;
use std::path::Path;
use std::thread;
use tracing::{debug, trace, warn};

use crate::checksums::compute_file_checksum;
use crate::error::FileError;
use crate::fs_ops::copy_file_buffered;
use crate::model::{CopyResult, CopyStage, CopyTask, EngineConfig, TaskState};
use crate::progress::{emit, ProgressEvent, ProgressSink};

/// Outcome of a whole pool run.
#[derive(Debug, Default)]
pub struct PoolOutcome {
    /// Failed tasks only
    pub errors: Vec<CopyResult>,
    /// Sum of the `Item` payloads emitted
    pub bytes_reported: u64,
}

/// Copy one file through the per-task state machine.
pub fn copy_one(source: &Path, destination: &Path, config: &EngineConfig) -> CopyResult {
    copy_one_with(source, destination, config, &|_| Ok(()))
}

/// Like `copy_one`, with a hook that runs between the copy and the verify read.
pub(crate) fn copy_one_with(
    source: &Path,
    destination: &Path,
    config: &EngineConfig,
    after_copy: &(dyn Fn(&Path) -> io::Result<()> + Sync),
) -> CopyResult {
    let mut state = TaskState::Pending;
    let mut advance = |next: TaskState| {
        trace!(path = %source.display(), from = ?state, to = ?next, "Task state");
        state = next;
    };

    let expected = if config.verify {
        advance(TaskState::Hashing);
        match compute_file_checksum(source, config.buffer_size) {
            Ok(checksum) => Some(checksum),
            Err(e) => return fail(source, FileError::io(CopyStage::Hashing, source, e)),
        }
    } else {
        None
    };

    advance(TaskState::Copying);
    if let Err(e) = copy_file_buffered(source, destination, config.buffer_size) {
        return fail(source, FileError::io(CopyStage::Copying, source, e));
    }
    if let Err(e) = after_copy(destination) {
        return fail(source, FileError::io(CopyStage::Copying, destination, e));
    }

    if let Some(expected) = expected {
        advance(TaskState::Verifying);
        let actual = match compute_file_checksum(destination, config.buffer_size) {
            Ok(checksum) => checksum,
            Err(e) => return fail(source, FileError::io(CopyStage::Verifying, destination, e)),
        };
        if actual != expected {
            return fail(
                source,
                FileError::ChecksumMismatch {
                    path: destination.to_path_buf(),
                    expected: expected.hex().to_string(),
                    actual: actual.hex().to_string(),
                },
            );
        }
    }

    advance(TaskState::Done);
    debug!(path = %source.display(), "Copied");
    CopyResult::ok(source.to_path_buf())
}

fn fail(source: &Path, error: FileError) -> CopyResult {
    warn!(path = %source.display(), error = %error, "Task failed");
    CopyResult::failed(source.to_path_buf(), error)
}

/// Run `tasks` on a pool of `config.worker_count` threads.
///
/// Emits one `Item` per task (the task's size, or 0 on failure). Does not
/// emit `Start`/`Finish`; the caller brackets the run. Directories must
/// already exist under `destination_root`.
pub fn run_pool(
    tasks: Vec<CopyTask>,
    destination_root: &Path,
    config: &EngineConfig,
    sink: Option<&dyn ProgressSink>,
) -> PoolOutcome {
    run_pool_with(tasks, destination_root, config, sink, &|_| Ok(()))
}

pub(crate) fn run_pool_with(
    tasks: Vec<CopyTask>,
    destination_root: &Path,
    config: &EngineConfig,
    sink: Option<&dyn ProgressSink>,
    after_copy: &(dyn Fn(&Path) -> io::Result<()> + Sync),
) -> PoolOutcome {
    let mut outcome = PoolOutcome::default();
    if tasks.is_empty() {
        return outcome;
    }

    let workers = config.worker_count.max(1).min(tasks.len());
    let (task_tx, task_rx) = unbounded::<CopyTask>();
    let (result_tx, result_rx) = unbounded::<(u64, CopyResult)>();

    for task in tasks {
        // Receiver is alive for the whole function
        let _ = task_tx.send(task);
    }
    drop(task_tx);

    thread::scope(|scope| {
        for worker_id in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                trace!(worker_id, "Worker started");
                for task in task_rx.iter() {
                    let destination = task.destination_in(destination_root);
                    let result = copy_one_with(&task.source_path, &destination, config, after_copy);
                    if result_tx.send((task.size, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        for (size, result) in result_rx.iter() {
            let bytes = if result.is_ok() { size } else { 0 };
            outcome.bytes_reported += bytes;
            emit(sink, ProgressEvent::Item { bytes });
            if !result.is_ok() {
                outcome.errors.push(result);
            }
        }
    });

    outcome
}
