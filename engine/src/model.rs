//! Core data model for copy and unpack runs.
//!
//! This module defines the value objects passed between the engine stages:
//! - CopyTask / CopyResult: one file's instruction and its outcome
//! - EngineConfig: caller-supplied tuning (workers, buffer, verification)
//! - ArchiveMember / ArchiveFormat / Granularity: unpack-mode listing data
//! - CopyReport / UnpackReport: what a finished run hands back to the caller

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, FileError};

/// Default read/write buffer size (1 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 1_048_576;

/// A single file to copy. Immutable once enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTask {
    /// Absolute (or caller-relative) source file path
    pub source_path: PathBuf,

    /// Directory relative to the destination root; empty for top-level files
    pub relative_dir: PathBuf,

    /// File name, joined under `relative_dir` at the destination
    pub file_name: String,

    /// Size in bytes as observed during enumeration
    pub size: u64,
}

impl CopyTask {
    /// Destination path of this task under `destination_root`.
    pub fn destination_in(&self, destination_root: &Path) -> PathBuf {
        destination_root.join(&self.relative_dir).join(&self.file_name)
    }
}

/// Outcome of one CopyTask.
#[derive(Debug)]
pub struct CopyResult {
    pub source_path: PathBuf,
    pub error: Option<FileError>,
}

impl CopyResult {
    pub fn ok(source_path: PathBuf) -> Self {
        CopyResult {
            source_path,
            error: None,
        }
    }

    pub fn failed(source_path: PathBuf, error: FileError) -> Self {
        CopyResult {
            source_path,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A step of the per-task pipeline that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStage {
    Hashing,
    Copying,
    Verifying,
}

impl fmt::Display for CopyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyStage::Hashing => write!(f, "Hashing"),
            CopyStage::Copying => write!(f, "Copying"),
            CopyStage::Verifying => write!(f, "Verifying"),
        }
    }
}

/// The state of an individual task.
///
/// `Pending → [Hashing] → Copying → [Verifying] → Done | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Hashing,
    Copying,
    Verifying,
    Done,
    Failed,
}

impl TaskState {
    /// Returns true if this state is terminal (no further changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed)
    }
}

impl From<CopyStage> for TaskState {
    fn from(stage: CopyStage) -> Self {
        match stage {
            CopyStage::Hashing => TaskState::Hashing,
            CopyStage::Copying => TaskState::Copying,
            CopyStage::Verifying => TaskState::Verifying,
        }
    }
}

/// Caller-supplied engine tuning.
///
/// The engine never chooses a worker count on its own; resolving a default
/// (for instance from the host's core count) is the caller's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of parallel copy workers (>= 1)
    pub worker_count: usize,

    /// Read/write buffer size in bytes (> 0)
    pub buffer_size: usize,

    /// Hash the source before copying and verify the destination afterwards
    pub verify: bool,
}

impl EngineConfig {
    /// Build and validate a configuration.
    pub fn new(worker_count: usize, buffer_size: usize, verify: bool) -> Result<Self, EngineError> {
        let config = EngineConfig {
            worker_count,
            buffer_size,
            verify,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the `worker_count >= 1` and `buffer_size > 0` invariants.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.worker_count == 0 {
            return Err(EngineError::InvalidConfig {
                reason: "worker count must be at least 1".to_string(),
            });
        }
        if self.buffer_size == 0 {
            return Err(EngineError::InvalidConfig {
                reason: "buffer size must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// One entry of an archive listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    /// Path inside the archive, `/`-separated
    pub path: String,
    /// Uncompressed size (0 for directories)
    pub size: u64,
    pub is_dir: bool,
}

impl ArchiveMember {
    /// Bytes this member contributes to progress.
    pub fn progress_bytes(&self) -> u64 {
        if self.is_dir {
            0
        } else {
            self.size
        }
    }
}

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    SevenZ,
    Rar,
}

impl ArchiveFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "zip" => Some(ArchiveFormat::Zip),
            "7z" => Some(ArchiveFormat::SevenZ),
            "rar" => Some(ArchiveFormat::Rar),
            _ => None,
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveFormat::Zip => write!(f, "zip"),
            ArchiveFormat::SevenZ => write!(f, "7z"),
            ArchiveFormat::Rar => write!(f, "rar"),
        }
    }
}

/// How precisely an extractor can report per-member progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Members are extracted one at a time; `Item` follows each member
    PerMember,
    /// One call extracts everything; `Item` events are replayed afterwards
    WholeArchive,
}

/// Summary of a finished copy run.
#[derive(Debug)]
pub struct CopyReport {
    /// Resolved destination root (directory, or file path for single-file copies)
    pub destination_root: PathBuf,
    pub file_count: usize,
    pub total_bytes: u64,
    /// Sum of the `Item` payloads emitted; equals `total_bytes` only for error-free runs
    pub bytes_reported: u64,
    /// Failed tasks only
    pub errors: Vec<CopyResult>,
}

impl CopyReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Summary of a finished unpack run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackReport {
    pub format: ArchiveFormat,
    /// Members reported in `Start` (1 when the format offers no listing)
    pub member_count: usize,
    pub total_bytes: u64,
    pub granularity: Granularity,
}
