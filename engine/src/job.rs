//! Job orchestration module.
//!
//! This module ties the engine stages together:
//! - Copy mode: resolve destination → enumerate → materialize directories →
//!   parallel copy (or a synchronous single-file copy)
//! - Unpack mode: dispatch to a format extractor
//!
//! Setup errors are returned before any filesystem mutation. Per-file
//! errors are collected into the returned report.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::archive::ArchiveDispatcher;
use crate::copier::{copy_one, run_pool_with, PoolOutcome};
use crate::error::EngineError;
use crate::fs_ops;
use crate::model::{CopyReport, EngineConfig, UnpackReport};
use crate::paths::{resolve_destination, ResolvedTarget};
use crate::progress::{emit, ProgressEvent, ProgressSink};

/// Copy a file or directory tree to `destination`.
///
/// # Errors
/// Returns EngineError for setup failures (invalid config, missing source,
/// destination conflict, directory creation). Per-file failures are
/// recorded in `CopyReport::errors` and never abort the run.
pub fn run_copy(
    source: &Path,
    destination: &Path,
    config: &EngineConfig,
    progress: Option<&dyn ProgressSink>,
) -> Result<CopyReport, EngineError> {
    config.validate()?;
    match resolve_destination(source, destination)? {
        ResolvedTarget::Directory(root) => copy_tree(source, &root, config, progress, &|_| Ok(())),
        ResolvedTarget::File(target) => copy_single_file(source, &target, config, progress),
    }
}

fn copy_tree(
    source: &Path,
    root: &Path,
    config: &EngineConfig,
    progress: Option<&dyn ProgressSink>,
    after_copy: &(dyn Fn(&Path) -> io::Result<()> + Sync),
) -> Result<CopyReport, EngineError> {
    let started = Instant::now();
    let (tasks, total_bytes) = fs_ops::enumerate_tree(source);
    let file_count = tasks.len();

    if tasks.is_empty() {
        info!(source = %source.display(), "Source directory is empty, nothing to copy");
        emit(progress, ProgressEvent::Start { file_count: 0, total_bytes: 0 });
        emit(progress, ProgressEvent::Finish);
        return Ok(empty_report(root));
    }

    let dirs = fs_ops::materialize_directories(&tasks, root)?;
    info!(
        source = %source.display(),
        destination = %root.display(),
        files = file_count,
        bytes = total_bytes,
        directories = dirs,
        workers = config.worker_count,
        verify = config.verify,
        "Starting copy"
    );

    emit(progress, ProgressEvent::Start { file_count, total_bytes });
    let outcome = run_pool_with(tasks, root, config, progress, after_copy);
    emit(progress, ProgressEvent::Finish);

    Ok(finish_report(root, file_count, total_bytes, outcome, started))
}

fn copy_single_file(
    source: &Path,
    target: &Path,
    config: &EngineConfig,
    progress: Option<&dyn ProgressSink>,
) -> Result<CopyReport, EngineError> {
    let started = Instant::now();
    let size = fs::metadata(source)
        .map_err(|e| EngineError::SourceAccessDenied {
            path: source.to_path_buf(),
            source: e,
        })?
        .len();
    fs_ops::ensure_parent_dir_exists(target)?;

    info!(source = %source.display(), destination = %target.display(), bytes = size, "Starting single-file copy");
    emit(progress, ProgressEvent::Start { file_count: 1, total_bytes: size });

    let result = copy_one(source, target, config);
    let mut outcome = PoolOutcome::default();
    let bytes = if result.is_ok() { size } else { 0 };
    outcome.bytes_reported = bytes;
    emit(progress, ProgressEvent::Item { bytes });
    if !result.is_ok() {
        outcome.errors.push(result);
    }

    emit(progress, ProgressEvent::Finish);
    Ok(finish_report(target, 1, size, outcome, started))
}

fn empty_report(root: &Path) -> CopyReport {
    CopyReport {
        destination_root: root.to_path_buf(),
        file_count: 0,
        total_bytes: 0,
        bytes_reported: 0,
        errors: Vec::new(),
    }
}

fn finish_report(
    root: &Path,
    file_count: usize,
    total_bytes: u64,
    outcome: PoolOutcome,
    started: Instant,
) -> CopyReport {
    info!(
        files = file_count,
        bytes = outcome.bytes_reported,
        errors = outcome.errors.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Copy finished"
    );
    CopyReport {
        destination_root: root.to_path_buf(),
        file_count,
        total_bytes,
        bytes_reported: outcome.bytes_reported,
        errors: outcome.errors,
    }
}

/// Extract an archive into `destination` with the default dispatcher.
pub fn run_unpack(
    source: &Path,
    destination: &Path,
    progress: Option<&dyn ProgressSink>,
) -> Result<UnpackReport, EngineError> {
    ArchiveDispatcher::new().unpack(source, destination, progress)
}
