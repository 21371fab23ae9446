//! Zip extraction, member by member.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::warn;
use ::zip::result::ZipError;
use ::zip::ZipArchive;

use super::{sanitize_member_path, Extractor};
use crate::error::EngineError;
use crate::model::{ArchiveFormat, ArchiveMember, Granularity};

/// Fine-grained extractor backed by the `zip` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

fn open_archive(path: &Path) -> Result<ZipArchive<File>, EngineError> {
    let file = File::open(path).map_err(|e| EngineError::ArchiveReadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    ZipArchive::new(file).map_err(|e| read_failed(path, e))
}

fn read_failed(path: &Path, e: ZipError) -> EngineError {
    EngineError::ArchiveReadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn extract_failed(path: &Path, member: &str, reason: impl ToString) -> EngineError {
    EngineError::ArchiveExtractFailed {
        path: path.to_path_buf(),
        reason: format!("{}: {}", member, reason.to_string()),
    }
}

impl Extractor for ZipExtractor {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn granularity(&self) -> Granularity {
        Granularity::PerMember
    }

    fn list_members(&self, archive: &Path) -> Result<Option<Vec<ArchiveMember>>, EngineError> {
        let mut zip = open_archive(archive)?;
        let mut members = Vec::with_capacity(zip.len());
        for idx in 0..zip.len() {
            let entry = zip.by_index(idx).map_err(|e| read_failed(archive, e))?;
            if sanitize_member_path(Path::new(""), entry.name()).is_none() {
                warn!(archive = %archive.display(), member = entry.name(), "Unsafe member path");
                return Err(EngineError::ArchiveReadFailed {
                    path: archive.to_path_buf(),
                    reason: format!("unsafe member path: {}", entry.name()),
                });
            }
            members.push(ArchiveMember {
                path: entry.name().to_string(),
                size: entry.size(),
                is_dir: entry.is_dir(),
            });
        }
        Ok(Some(members))
    }

    fn extract_all(&self, archive: &Path, destination: &Path) -> Result<(), EngineError> {
        self.extract_each(archive, destination, &mut |_| {})
    }

    fn extract_each(
        &self,
        archive: &Path,
        destination: &Path,
        on_member: &mut dyn FnMut(&ArchiveMember),
    ) -> Result<(), EngineError> {
        let mut zip = open_archive(archive)?;
        for idx in 0..zip.len() {
            let mut entry = zip.by_index(idx).map_err(|e| read_failed(archive, e))?;
            let name = entry.name().to_string();
            let target = sanitize_member_path(destination, &name)
                .ok_or_else(|| extract_failed(archive, &name, "unsafe member path"))?;

            if entry.is_dir() {
                fs::create_dir_all(&target).map_err(|e| extract_failed(archive, &name, e))?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| extract_failed(archive, &name, e))?;
                }
                let mut out = File::create(&target).map_err(|e| extract_failed(archive, &name, e))?;
                io::copy(&mut entry, &mut out).map_err(|e| extract_failed(archive, &name, e))?;
            }

            on_member(&ArchiveMember {
                path: name,
                size: entry.size(),
                is_dir: entry.is_dir(),
            });
        }
        Ok(())
    }
}
