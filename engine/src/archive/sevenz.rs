//! 7z extraction in a single call.

use std::fs::File;
use std::path::Path;
use sevenz_rust2::Password as SevenZPassword;
use tracing::warn;

use super::{sanitize_member_path, Extractor};
use crate::error::EngineError;
use crate::model::{ArchiveFormat, ArchiveMember, Granularity};

/// Coarse-grained extractor backed by `sevenz-rust2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SevenZExtractor;

impl Extractor for SevenZExtractor {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::SevenZ
    }

    fn granularity(&self) -> Granularity {
        Granularity::WholeArchive
    }

    fn list_members(&self, archive: &Path) -> Result<Option<Vec<ArchiveMember>>, EngineError> {
        let read_failed = |reason: String| EngineError::ArchiveReadFailed {
            path: archive.to_path_buf(),
            reason,
        };
        let file = File::open(archive).map_err(|e| read_failed(e.to_string()))?;
        let reader = sevenz_rust2::SevenZReader::new(file, SevenZPassword::empty())
            .map_err(|e| read_failed(e.to_string()))?;

        let mut members = Vec::new();
        for entry in &reader.archive().files {
            if sanitize_member_path(Path::new(""), &entry.name).is_none() {
                warn!(archive = %archive.display(), member = %entry.name, "Unsafe member path");
                return Err(read_failed(format!("unsafe member path: {}", entry.name)));
            }
            members.push(ArchiveMember {
                path: entry.name.clone(),
                size: entry.size,
                is_dir: entry.is_directory,
            });
        }
        Ok(Some(members))
    }

    fn extract_all(&self, archive: &Path, destination: &Path) -> Result<(), EngineError> {
        sevenz_rust2::decompress_file(archive, destination).map_err(|e| EngineError::ArchiveExtractFailed {
            path: archive.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
