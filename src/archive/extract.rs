//! External extractor driver.
//!
//! Extraction is delegated to the host `unar` utility, invoked once per
//! archive with captured output. The trait seam exists so the walker and
//! the tests can substitute an extractor that does not shell out.

use std::fmt;
use std::path::Path;
use std::process::Command;

/// Extraction failure, carrying the tool's trimmed combined output.
#[derive(Debug)]
pub struct ExtractError {
    output: String,
}

impl ExtractError {
    pub fn new(output: impl Into<String>) -> Self {
        ExtractError {
            output: output.into(),
        }
    }
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.output)
    }
}

impl std::error::Error for ExtractError {}

/// Something that can expand an archive into a directory.
///
/// Implementations are best-effort collaborators: the walker scans the
/// archive file itself regardless, so extraction failures are survivable.
pub trait Extractor: Send + Sync {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ExtractError>;
}

/// Drives `unar -o <dest> <archive>`.
pub struct UnarExtractor;

impl Extractor for UnarExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ExtractError> {
        let result = Command::new("unar")
            .arg("-o")
            .arg(dest)
            .arg(archive)
            .output()
            .map_err(|e| ExtractError::new(format!("failed to run unar: {e}")))?;

        if result.status.success() {
            return Ok(());
        }
        let mut combined = result.stdout;
        combined.extend_from_slice(&result.stderr);
        Err(ExtractError::new(
            String::from_utf8_lossy(&combined).trim().to_string(),
        ))
    }
}
