//! # SuperCopy Engine - Bulk Copy and Unpack Library
//!
//! A headless engine that copies a file or directory tree to a destination
//! (optionally verifying every file with SHA-256), or extracts a zip, 7z or
//! rar archive into a directory. Progress is reported through a sink trait
//! so any front end (CLI, GUI, automation) can observe a run.
//!
//! ## Overview
//!
//! - Destination resolution that copies *into* existing directories and *as*
//!   new ones
//! - Best-effort enumeration (unreadable entries are skipped)
//! - Directory skeleton created up front, before any file is written
//! - Bounded worker pool with per-file error isolation
//! - Archive dispatch by extension, with per-member or whole-archive progress
//!
//! ## Basic Usage
//!
//! ```no_run
//! use std::path::Path;
//! use supercopy_engine::{run_copy, EngineConfig, DEFAULT_BUFFER_SIZE};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::new(8, DEFAULT_BUFFER_SIZE, true)?;
//! let report = run_copy(Path::new("/data/photos"), Path::new("/backup"), &config, None)?;
//!
//! println!("Copied {} files", report.file_count - report.errors.len());
//! for failure in &report.errors {
//!     if let Some(error) = &failure.error {
//!         eprintln!("{}: {}", failure.source_path.display(), error);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (CopyTask, CopyResult, EngineConfig, reports)
//! - **error**: Run-level and per-file error types
//! - **paths**: Destination resolution
//! - **fs_ops**: Enumeration, directory materialization, buffered copy
//! - **checksums**: SHA-256 streaming digests
//! - **copier**: Per-task pipeline and worker pool
//! - **progress**: Progress sink trait, tally and channel sink
//! - **archive**: Archive dispatcher and extractors
//! - **job**: Copy and unpack orchestration

pub mod archive;
pub mod checksums;
pub mod copier;
pub mod error;
pub mod fs_ops;
pub mod job;
pub mod model;
pub mod paths;
pub mod progress;

// Re-export main types and functions
pub use archive::{ArchiveDispatcher, Extractor, RarExtractor, SevenZExtractor, ZipExtractor};
pub use error::{EngineError, FileError};
pub use job::{run_copy, run_unpack};
pub use model::{
    ArchiveFormat, ArchiveMember, CopyReport, CopyResult, CopyStage, CopyTask, EngineConfig,
    Granularity, TaskState, UnpackReport, DEFAULT_BUFFER_SIZE,
};
pub use paths::{resolve_destination, ResolvedTarget};
pub use progress::{ChannelSink, ProgressEvent, ProgressSink, ProgressTally};
