//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Enumerating a source tree into copy tasks
//! - Materializing the destination directory skeleton
//! - Buffered file copies

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::EngineError;
use crate::model::CopyTask;

/// Enumerate every regular file under `source`.
///
/// Entries that cannot be read or sized are skipped without being reported
/// (best-effort enumeration). Symlinks are included when they resolve to a
/// regular file.
///
/// # Returns
/// The task list and the sum of all task sizes.
pub fn enumerate_tree(source: &Path) -> (Vec<CopyTask>, u64) {
    let mut tasks = Vec::new();
    let mut total_bytes = 0u64;

    for entry in WalkDir::new(source).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }

        // Follows symlinks; dangling links and unreadable files drop out here
        let metadata = match fs::metadata(entry.path()) {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "Skipping file that cannot be sized");
                continue;
            }
        };

        let relative_dir = entry
            .path()
            .parent()
            .and_then(|parent| parent.strip_prefix(source).ok())
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let size = metadata.len();
        total_bytes += size;
        tasks.push(CopyTask {
            source_path: entry.path().to_path_buf(),
            relative_dir,
            file_name: entry.file_name().to_string_lossy().into_owned(),
            size,
        });
    }

    (tasks, total_bytes)
}

/// The distinct destination directories implied by `tasks`.
pub fn required_directories(tasks: &[CopyTask], destination_root: &Path) -> BTreeSet<PathBuf> {
    tasks
        .iter()
        .map(|task| destination_root.join(&task.relative_dir))
        .collect()
}

/// Create every destination directory before any file is copied.
///
/// Sequential and idempotent: directories that already exist are fine.
///
/// # Returns
/// Number of distinct directories ensured
///
/// # Errors
/// Returns `DirectoryCreationFailed` for the first directory that cannot be created
pub fn materialize_directories(tasks: &[CopyTask], destination_root: &Path) -> Result<usize, EngineError> {
    let dirs = required_directories(tasks, destination_root);
    for dir in &dirs {
        debug!(path = %dir.display(), "Creating destination directory");
        fs::create_dir_all(dir).map_err(|e| EngineError::DirectoryCreationFailed {
            path: dir.clone(),
            source: e,
        })?;
    }
    Ok(dirs.len())
}

/// Ensure the parent directory of a path exists, creating it if necessary.
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), EngineError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| EngineError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })
        }
        _ => Ok(()),
    }
}

/// Copy `src` to `dst` through a `buffer_size` buffer, replacing `dst`.
///
/// # Returns
/// Number of bytes copied
pub fn copy_file_buffered(src: &Path, dst: &Path, buffer_size: usize) -> io::Result<u64> {
    let mut reader = File::open(src)?;
    let mut writer = File::create(dst)?;
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut copied = 0u64;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..n])?;
        copied += n as u64;
    }
    writer.flush()?;

    Ok(copied)
}
