//! Archive extraction.
//!
//! The dispatcher selects an extractor by file extension and drives it
//! through the progress protocol. Extractors differ in what their backend
//! can do, which they declare up front:
//! - `Granularity::PerMember` extractors report each member as it lands.
//! - `Granularity::WholeArchive` extractors extract in one call; the
//!   dispatcher replays the listed members as `Item` events afterwards.
//! - Extractors that cannot list at all return `None` from `list_members`;
//!   the run is reported as a single `Start{1,1}` / `Item{1}` pair.

mod rar;
mod sevenz;
mod zip_format;

pub use rar::{RarExtractor, DEFAULT_RAR_TOOL};
pub use sevenz::SevenZExtractor;
pub use zip_format::ZipExtractor;

use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::model::{ArchiveFormat, ArchiveMember, Granularity, UnpackReport};
use crate::paths::{inspect_source, SourceKind};
use crate::progress::{emit, ProgressEvent, ProgressSink};

/// A format-specific extraction backend.
pub trait Extractor {
    fn format(&self) -> ArchiveFormat;

    fn granularity(&self) -> Granularity;

    /// Check external prerequisites before anything is written.
    fn preflight(&self) -> Result<(), EngineError> {
        Ok(())
    }

    /// List members before extraction; `Ok(None)` if the backend cannot list.
    fn list_members(&self, archive: &Path) -> Result<Option<Vec<ArchiveMember>>, EngineError>;

    /// Extract everything into `destination` in one call.
    fn extract_all(&self, archive: &Path, destination: &Path) -> Result<(), EngineError>;

    /// Extract member by member, calling `on_member` after each one lands.
    ///
    /// Only `PerMember` extractors need to override this.
    fn extract_each(
        &self,
        archive: &Path,
        destination: &Path,
        on_member: &mut dyn FnMut(&ArchiveMember),
    ) -> Result<(), EngineError> {
        let members = self.list_members(archive)?.unwrap_or_default();
        self.extract_all(archive, destination)?;
        for member in &members {
            on_member(member);
        }
        Ok(())
    }
}

/// Selects an extractor by extension and runs the unpack protocol.
#[derive(Debug, Clone)]
pub struct ArchiveDispatcher {
    rar_tool: PathBuf,
}

impl Default for ArchiveDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveDispatcher {
    pub fn new() -> Self {
        ArchiveDispatcher {
            rar_tool: PathBuf::from(DEFAULT_RAR_TOOL),
        }
    }

    /// Use a specific external archiver (name on `PATH`, or a path) for rar.
    pub fn with_rar_tool(mut self, tool: impl Into<PathBuf>) -> Self {
        self.rar_tool = tool.into();
        self
    }

    /// The extractor for `archive`, or `UnsupportedFormat`.
    pub fn extractor_for(&self, archive: &Path) -> Result<Box<dyn Extractor>, EngineError> {
        match ArchiveFormat::from_path(archive) {
            Some(ArchiveFormat::Zip) => Ok(Box::new(ZipExtractor)),
            Some(ArchiveFormat::SevenZ) => Ok(Box::new(SevenZExtractor)),
            Some(ArchiveFormat::Rar) => Ok(Box::new(RarExtractor::new(self.rar_tool.clone()))),
            None => Err(EngineError::UnsupportedFormat {
                path: archive.to_path_buf(),
            }),
        }
    }

    /// Extract `archive` into `destination`, reporting through `sink`.
    ///
    /// Nothing is created on disk until the format is known, any external
    /// tool has been located, and the archive has been listed. A fatal error
    /// after `Start` returns without `Finish`.
    pub fn unpack(
        &self,
        archive: &Path,
        destination: &Path,
        sink: Option<&dyn ProgressSink>,
    ) -> Result<UnpackReport, EngineError> {
        if inspect_source(archive)? == SourceKind::Directory {
            return Err(EngineError::UnsupportedFormat {
                path: archive.to_path_buf(),
            });
        }
        let extractor = self.extractor_for(archive)?;
        extractor.preflight()?;
        let listing = extractor.list_members(archive)?;

        fs::create_dir_all(destination).map_err(|e| EngineError::DirectoryCreationFailed {
            path: destination.to_path_buf(),
            source: e,
        })?;

        let report = match listing {
            Some(members) => {
                let member_count = members.len();
                let total_bytes: u64 = members.iter().map(ArchiveMember::progress_bytes).sum();
                info!(
                    archive = %archive.display(),
                    format = %extractor.format(),
                    members = member_count,
                    bytes = total_bytes,
                    "Unpacking"
                );
                emit(sink, ProgressEvent::Start { file_count: member_count, total_bytes });

                match extractor.granularity() {
                    Granularity::PerMember => {
                        extractor.extract_each(archive, destination, &mut |member| {
                            debug!(member = %member.path, "Extracted");
                            emit(sink, ProgressEvent::Item { bytes: member.progress_bytes() });
                        })?;
                    }
                    Granularity::WholeArchive => {
                        extractor.extract_all(archive, destination)?;
                        for member in &members {
                            emit(sink, ProgressEvent::Item { bytes: member.progress_bytes() });
                        }
                    }
                }

                UnpackReport {
                    format: extractor.format(),
                    member_count,
                    total_bytes,
                    granularity: extractor.granularity(),
                }
            }
            None => {
                info!(archive = %archive.display(), format = %extractor.format(), "Unpacking without listing");
                emit(sink, ProgressEvent::Start { file_count: 1, total_bytes: 1 });
                extractor.extract_all(archive, destination)?;
                emit(sink, ProgressEvent::Item { bytes: 1 });

                UnpackReport {
                    format: extractor.format(),
                    member_count: 1,
                    total_bytes: 1,
                    granularity: Granularity::WholeArchive,
                }
            }
        };

        emit(sink, ProgressEvent::Finish);
        Ok(report)
    }
}

/// Join a member name under `root`, rejecting absolute and `..` paths.
pub(crate) fn sanitize_member_path(root: &Path, name: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(root.join(clean))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_member_path_blocks_unsafe_paths() {
        let root = PathBuf::from("/tmp/base");
        assert_eq!(
            sanitize_member_path(&root, "ok/file.txt"),
            Some(root.join("ok").join("file.txt"))
        );
        assert!(sanitize_member_path(&root, "../evil").is_none());
        assert!(sanitize_member_path(&root, "/abs/path").is_none());
        assert!(sanitize_member_path(&root, "a/../../b").is_none());
    }

    #[test]
    fn test_extractor_selection() {
        let dispatcher = ArchiveDispatcher::new();
        let zip = dispatcher.extractor_for(Path::new("a.zip")).expect("zip supported");
        assert_eq!(zip.format(), ArchiveFormat::Zip);
        assert_eq!(zip.granularity(), Granularity::PerMember);

        let sevenz = dispatcher.extractor_for(Path::new("a.7z")).expect("7z supported");
        assert_eq!(sevenz.granularity(), Granularity::WholeArchive);

        let rar = dispatcher.extractor_for(Path::new("a.RAR")).expect("rar supported");
        assert_eq!(rar.format(), ArchiveFormat::Rar);

        assert!(matches!(
            dispatcher.extractor_for(Path::new("archive.xyz")),
            Err(EngineError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_unsupported_format_creates_nothing() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let archive = temp_dir.path().join("archive.xyz");
        fs::write(&archive, b"not an archive").expect("Failed to write archive");
        let dest = temp_dir.path().join("out");

        let result = ArchiveDispatcher::new().unpack(&archive, &dest, None);
        assert!(matches!(result, Err(EngineError::UnsupportedFormat { .. })));
        assert!(!dest.exists());
    }

    #[test]
    fn test_missing_archive_is_source_not_found() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = ArchiveDispatcher::new().unpack(
            &temp_dir.path().join("missing.zip"),
            &temp_dir.path().join("out"),
            None,
        );
        assert!(matches!(result, Err(EngineError::SourceNotFound { .. })));
    }
}
