//! Destination path resolution.
//!
//! Decides where a copy lands for every file/directory and
//! existing/missing destination combination. Pure path computation: the
//! only filesystem access is reading metadata.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// The kind of source, as observed when resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Directory,
}

/// The effective destination of a copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// Directory source: root directory the tree is copied into
    Directory(PathBuf),
    /// File source: final file path
    File(PathBuf),
}

impl ResolvedTarget {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedTarget::Directory(p) | ResolvedTarget::File(p) => p,
        }
    }
}

/// Inspect the source, mapping a missing path to `SourceNotFound`.
pub fn inspect_source(source: &Path) -> Result<SourceKind, EngineError> {
    match std::fs::metadata(source) {
        Ok(metadata) if metadata.is_dir() => Ok(SourceKind::Directory),
        Ok(_) => Ok(SourceKind::File),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(EngineError::SourceNotFound {
            path: source.to_path_buf(),
        }),
        Err(e) => Err(EngineError::SourceAccessDenied {
            path: source.to_path_buf(),
            source: e,
        }),
    }
}

/// Compute the destination root for `source` copied to `destination`.
///
/// - directory → existing directory: `destination/basename(source)`
/// - directory → missing path: `destination`
/// - directory → existing file: `DestinationConflict`
/// - file → existing directory: `destination/basename(source)`
/// - file → anything else: `destination`
///
/// # Errors
/// `DestinationOverlapsSource` when the target is the source itself or lies
/// inside a source directory; copying would truncate files while reading them.
pub fn resolve_destination(source: &Path, destination: &Path) -> Result<ResolvedTarget, EngineError> {
    let kind = inspect_source(source)?;
    let target = resolve_unchecked(source, kind, destination)?;
    reject_overlap(source, kind, target.path())?;
    Ok(target)
}

fn resolve_unchecked(source: &Path, kind: SourceKind, destination: &Path) -> Result<ResolvedTarget, EngineError> {
    let dest_meta = std::fs::metadata(destination).ok();
    let dest_is_dir = dest_meta.as_ref().map(|m| m.is_dir()).unwrap_or(false);

    match kind {
        SourceKind::Directory => {
            if dest_meta.is_some() && !dest_is_dir {
                return Err(EngineError::DestinationConflict {
                    source_dir: source.to_path_buf(),
                    destination: destination.to_path_buf(),
                });
            }
            if dest_is_dir {
                Ok(ResolvedTarget::Directory(join_basename(destination, source)))
            } else {
                Ok(ResolvedTarget::Directory(destination.to_path_buf()))
            }
        }
        SourceKind::File => {
            if dest_is_dir {
                Ok(ResolvedTarget::File(join_basename(destination, source)))
            } else {
                Ok(ResolvedTarget::File(destination.to_path_buf()))
            }
        }
    }
}

fn reject_overlap(source: &Path, kind: SourceKind, target: &Path) -> Result<(), EngineError> {
    let (Some(real_source), Some(real_target)) = (existing_prefix_path(source), existing_prefix_path(target)) else {
        return Ok(());
    };
    let overlaps = match kind {
        SourceKind::Directory => real_target.starts_with(&real_source),
        SourceKind::File => real_target == real_source,
    };
    if overlaps {
        return Err(EngineError::DestinationOverlapsSource {
            source_path: source.to_path_buf(),
            destination: target.to_path_buf(),
        });
    }
    Ok(())
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the rest.
fn existing_prefix_path(path: &Path) -> Option<PathBuf> {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        let probe = if current.as_os_str().is_empty() { Path::new(".") } else { current };
        if let Ok(real) = std::fs::canonicalize(probe) {
            return Some(missing.iter().rev().fold(real, |acc: PathBuf, part| acc.join(part)));
        }
        missing.push(current.file_name()?.to_os_string());
        current = current.parent()?;
    }
}

fn join_basename(destination: &Path, source: &Path) -> PathBuf {
    match basename(source) {
        Some(name) => destination.join(name),
        None => destination.to_path_buf(),
    }
}

/// Final path component, canonicalizing first so `.` and `dir/..` have a name.
fn basename(source: &Path) -> Option<PathBuf> {
    if let Some(name) = source.file_name() {
        return Some(PathBuf::from(name));
    }
    std::fs::canonicalize(source)
        .ok()
        .and_then(|p| p.file_name().map(PathBuf::from))
}
