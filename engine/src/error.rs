//! Error types for the copy/extract engine.
//!
//! There are two layers of errors:
//! - `EngineError` represents run-level failures detected during setup (or a
//!   fatal archive/tool failure). These abort the operation.
//! - `FileError` represents a single task's failure during the parallel copy
//!   phase. These are collected into the run's error list and never stop
//!   sibling tasks.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::CopyStage;

/// Errors that abort a whole copy or unpack run.
///
/// Setup-phase variants are raised before the filesystem is mutated.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Source path does not exist
    #[error("Source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// Source exists but its metadata cannot be read
    #[error("Source access denied: {}", path.display())]
    SourceAccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A directory source was pointed at an existing destination file
    #[error(
        "Cannot copy directory {} onto existing file {}",
        source_dir.display(),
        destination.display()
    )]
    DestinationConflict {
        source_dir: PathBuf,
        destination: PathBuf,
    },

    /// The destination is the source itself, or lies inside a source directory
    #[error(
        "Destination {} overlaps source {}",
        destination.display(),
        source_path.display()
    )]
    DestinationOverlapsSource {
        source_path: PathBuf,
        destination: PathBuf,
    },

    /// Archive extension is not one of zip, 7z or rar
    #[error("Unsupported archive format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    /// External archiver executable could not be located
    #[error("External tool not found: {tool}")]
    ExternalToolMissing { tool: String },

    /// External archiver exited unsuccessfully
    #[error("External tool {tool} failed (exit status {}): {output}", status.map(|s| s.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ExternalToolFailed {
        tool: String,
        status: Option<i32>,
        output: String,
    },

    /// Archive could not be opened or listed
    #[error("Failed to read archive {}: {reason}", path.display())]
    ArchiveReadFailed { path: PathBuf, reason: String },

    /// Archive extraction failed part-way through
    #[error("Failed to extract archive {}: {reason}", path.display())]
    ArchiveExtractFailed { path: PathBuf, reason: String },

    /// Failed to create a destination directory
    #[error("Failed to create directory: {}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Caller supplied an unusable engine configuration
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// A per-task failure recorded in a `CopyResult`.
#[derive(Debug, Error)]
pub enum FileError {
    /// I/O failure while hashing, copying or verifying
    #[error("{stage} failed for {}: {source}", path.display())]
    Io {
        stage: CopyStage,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Destination digest differs from the source digest
    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

impl FileError {
    pub(crate) fn io(stage: CopyStage, path: impl Into<PathBuf>, source: io::Error) -> Self {
        FileError::Io {
            stage,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_message_prefix() {
        let err = FileError::ChecksumMismatch {
            path: PathBuf::from("a.bin"),
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        assert!(err.to_string().starts_with("Checksum mismatch"));
    }

    #[test]
    fn test_tool_failed_message_includes_output() {
        let err = EngineError::ExternalToolFailed {
            tool: "unrar".to_string(),
            status: Some(3),
            output: "CRC failed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("unrar"));
        assert!(msg.contains("exit status 3"));
        assert!(msg.contains("CRC failed"));
    }

    #[test]
    fn test_overlap_message_names_both_paths() {
        let err = EngineError::DestinationOverlapsSource {
            source_path: PathBuf::from("/data/photos"),
            destination: PathBuf::from("/data/photos/backup"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/data/photos/backup"));
        assert!(msg.starts_with("Destination /data/photos/backup"));
    }
}
