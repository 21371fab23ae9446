//! Rar extraction through an external archiver.
//!
//! No listing is attempted: the whole archive is one unit of progress, and
//! any tool failure fails the run.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use super::Extractor;
use crate::error::EngineError;
use crate::model::{ArchiveFormat, ArchiveMember, Granularity};

/// Executable looked up on `PATH` when no tool is configured.
pub const DEFAULT_RAR_TOOL: &str = "unrar";

/// Tool-backed extractor.
#[derive(Debug, Clone)]
pub struct RarExtractor {
    tool: PathBuf,
}

impl RarExtractor {
    pub fn new(tool: impl Into<PathBuf>) -> Self {
        RarExtractor { tool: tool.into() }
    }

    fn tool_name(&self) -> String {
        self.tool.display().to_string()
    }

    /// Resolve the configured tool to an executable path.
    pub fn locate(&self) -> Result<PathBuf, EngineError> {
        which::which(&self.tool).map_err(|_| EngineError::ExternalToolMissing {
            tool: self.tool_name(),
        })
    }
}

impl Default for RarExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_RAR_TOOL)
    }
}

impl Extractor for RarExtractor {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Rar
    }

    fn granularity(&self) -> Granularity {
        Granularity::WholeArchive
    }

    fn preflight(&self) -> Result<(), EngineError> {
        self.locate().map(|_| ())
    }

    fn list_members(&self, _archive: &Path) -> Result<Option<Vec<ArchiveMember>>, EngineError> {
        Ok(None)
    }

    fn extract_all(&self, archive: &Path, destination: &Path) -> Result<(), EngineError> {
        let executable = self.locate()?;

        // unrar treats the last argument as a directory only with a trailing separator
        let mut dest_arg = OsString::from(destination.as_os_str());
        dest_arg.push(std::path::MAIN_SEPARATOR_STR);

        debug!(tool = %executable.display(), archive = %archive.display(), "Running external archiver");
        let output = Command::new(&executable)
            .arg("x")
            .arg("-o+")
            .arg("-y")
            .arg(archive)
            .arg(&dest_arg)
            .output()
            .map_err(|e| EngineError::ExternalToolFailed {
                tool: self.tool_name(),
                status: None,
                output: e.to_string(),
            })?;

        if !output.status.success() {
            let mut diagnostic = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.trim().is_empty() {
                if !diagnostic.is_empty() {
                    diagnostic.push('\n');
                }
                diagnostic.push_str(stdout.trim());
            }
            return Err(EngineError::ExternalToolFailed {
                tool: self.tool_name(),
                status: output.status.code(),
                output: diagnostic,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveDispatcher;
    use std::fs;

    #[test]
    fn test_rar_never_lists() {
        let listing = RarExtractor::default()
            .list_members(Path::new("anything.rar"))
            .expect("listing is infallible");
        assert!(listing.is_none());
    }

    #[test]
    fn test_missing_tool_is_fatal() {
        let temp = tempfile::tempdir().expect("create tempdir");
        let archive = temp.path().join("data.rar");
        fs::write(&archive, b"Rar!").expect("write archive");

        let extractor = RarExtractor::new("supercopy-no-such-archiver");
        let result = extractor.extract_all(&archive, temp.path());
        assert!(matches!(
            result,
            Err(EngineError::ExternalToolMissing { ref tool }) if tool == "supercopy-no-such-archiver"
        ));
    }

    #[test]
    fn test_preflight_reports_missing_tool() {
        let missing = RarExtractor::new("supercopy-no-such-archiver").preflight();
        assert!(matches!(missing, Err(EngineError::ExternalToolMissing { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_tool_is_fatal_through_dispatcher() {
        let temp = tempfile::tempdir().expect("create tempdir");
        let archive = temp.path().join("data.rar");
        fs::write(&archive, b"Rar!").expect("write archive");
        let dest = temp.path().join("out");

        let result = ArchiveDispatcher::new()
            .with_rar_tool("false")
            .unpack(&archive, &dest, None);
        assert!(matches!(
            result,
            Err(EngineError::ExternalToolFailed { status: Some(1), .. })
        ));
    }
}
