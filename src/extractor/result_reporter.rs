use crate::error::{ErrorKind, HashBakerError, Result, UserFriendlyError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
}

/// Terminal outcome of one invocation. A success always carries the artifact path
/// and a failure always carries its reason.
#[derive(Debug)]
pub enum ExtractionResult {
    Success { output_path: PathBuf },
    Failure { error: HashBakerError },
}

impl ExtractionResult {
    pub fn status(&self) -> Status {
        match self {
            ExtractionResult::Success { .. } => Status::Success,
            ExtractionResult::Failure { .. } => Status::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == Status::Success
    }

    pub fn output_path(&self) -> Option<&Path> {
        match self {
            ExtractionResult::Success { output_path } => Some(output_path),
            ExtractionResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&HashBakerError> {
        match self {
            ExtractionResult::Success { .. } => None,
            ExtractionResult::Failure { error } => Some(error),
        }
    }

    /// One-line reason, only for failures.
    pub fn error_reason(&self) -> Option<String> {
        self.error().map(UserFriendlyError::user_message)
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error().map(HashBakerError::kind)
    }

    pub fn exit_code(&self) -> i32 {
        self.error().map_or(0, HashBakerError::exit_code)
    }
}

impl From<Result<PathBuf>> for ExtractionResult {
    fn from(result: Result<PathBuf>) -> Self {
        match result {
            Ok(output_path) => ExtractionResult::Success { output_path },
            Err(error) => ExtractionResult::Failure { error },
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ResultReporter;

impl ResultReporter {
    pub fn new() -> Self {
        Self
    }

    /// `<stem>.hash` next to the source file.
    pub fn artifact_path(&self, source: &Path) -> PathBuf {
        source.with_extension("hash")
    }

    /// Persists `hash` next to `source`, replacing any previous artifact.
    ///
    /// The bytes are staged in a temporary file in the same directory and renamed
    /// over the final name, so readers see either the old artifact or the complete
    /// new one.
    pub fn write_artifact(&self, source: &Path, hash: &[u8]) -> Result<PathBuf> {
        let output_path = self.artifact_path(source);
        let write_failed = |reason: String| HashBakerError::OutputWriteFailed {
            path: output_path.clone(),
            reason,
        };

        if output_path == source {
            return Err(write_failed(
                "refusing to overwrite the source file".to_string(),
            ));
        }

        if hash.is_empty() {
            return Err(write_failed("nothing to write".to_string()));
        }

        let directory = output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let stem = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut staged = tempfile::Builder::new()
            .prefix(&format!(".{}.", stem))
            .suffix(".hash.tmp")
            .tempfile_in(directory)
            .map_err(|e| write_failed(e.to_string()))?;

        staged
            .write_all(hash)
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|e| write_failed(e.to_string()))?;

        if output_path.exists() {
            debug!(path = %output_path.display(), "replacing existing hash file");
        }

        staged
            .persist(&output_path)
            .map_err(|e| write_failed(e.error.to_string()))?;

        info!(path = %output_path.display(), bytes = hash.len(), "hash file written");
        Ok(output_path)
    }

    /// The two fixed stdout templates.
    pub fn render(&self, result: &ExtractionResult) -> String {
        match result {
            ExtractionResult::Success { output_path } => {
                format!("Extraction successful.\n{}", output_path.display())
            }
            ExtractionResult::Failure { error } => {
                format!("Extraction failed.\n{}", error.user_message())
            }
        }
    }
}
