use crate::runner::{CommandRunner, OutputMode, ProcessRunner, ToolCommand};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Content sniffing collaborator used when a file's name is not conclusive.
pub trait MimeProbe {
    /// Lowercased MIME type of `path`, or `None` when it cannot be determined.
    fn probe(&self, path: &Path) -> Option<String>;
}

/// Probes with `file -b --mime-type`.
pub struct FileCommandProbe {
    runner: ProcessRunner,
    timeout: Duration,
}

impl FileCommandProbe {
    pub fn new() -> Self {
        Self {
            runner: ProcessRunner::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for FileCommandProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MimeProbe for FileCommandProbe {
    fn probe(&self, path: &Path) -> Option<String> {
        let program = match which::which("file") {
            Ok(program) => program,
            Err(_) => {
                debug!("`file` not on PATH, skipping content probe");
                return None;
            }
        };

        let command = ToolCommand::new("file", program)
            .args(["-b", "--mime-type"])
            .arg(path);

        let output = self
            .runner
            .run(&command, OutputMode::Capture, self.timeout)
            .ok()?;

        let mime = String::from_utf8_lossy(&output.stdout).trim().to_lowercase();
        debug!(%mime, "content probe result");

        if mime.is_empty() {
            None
        } else {
            Some(mime)
        }
    }
}
