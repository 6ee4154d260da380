use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why an external tool run did not yield usable output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDetail {
    /// Last lines of the tool's stderr, collapsed onto one line.
    Stderr(String),
    /// The tool ran past its deadline and was killed.
    Timeout(Duration),
    /// The tool exited cleanly but produced nothing.
    NoOutput,
    /// The program could not be started at all.
    Launch(String),
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureDetail::Stderr(tail) if tail.is_empty() => write!(f, "no error output"),
            FailureDetail::Stderr(tail) => write!(f, "{}", tail),
            FailureDetail::Timeout(limit) => write!(f, "timed out after {:?}", limit),
            FailureDetail::NoOutput => write!(f, "no hash output produced"),
            FailureDetail::Launch(reason) => write!(f, "could not be started: {}", reason),
        }
    }
}

#[derive(Error, Debug)]
pub enum HashBakerError {
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported file format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("Missing dependencies: {}", names.join(", "))]
    DependencyMissing {
        names: Vec<String>,
        install_hint: String,
    },

    #[error("Dependency installation failed: {reason}")]
    InstallFailed {
        packages: Vec<String>,
        reason: String,
    },

    #[error("Failed to download helper script {name}: {reason}")]
    NetworkError { name: String, reason: String },

    #[error("{tool} failed: {detail}")]
    ToolInvocationFailed {
        tool: String,
        exit_code: Option<i32>,
        detail: FailureDetail,
    },

    #[error("Failed to write hash file {path}: {reason}")]
    OutputWriteFailed { path: PathBuf, reason: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Stable classification of failures, one per exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FileNotFound,
    UnsupportedFormat,
    DependencyMissing,
    InstallFailed,
    NetworkError,
    ToolInvocationFailed,
    OutputWriteFailed,
    Config,
}

impl ErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::FileNotFound => 1,
            ErrorKind::DependencyMissing => 2,
            ErrorKind::UnsupportedFormat => 3,
            ErrorKind::ToolInvocationFailed => 4,
            ErrorKind::InstallFailed => 5,
            ErrorKind::NetworkError => 6,
            ErrorKind::OutputWriteFailed => 7,
            ErrorKind::Config => 8,
        }
    }
}

impl HashBakerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HashBakerError::FileNotFound { .. } => ErrorKind::FileNotFound,
            HashBakerError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            HashBakerError::DependencyMissing { .. } => ErrorKind::DependencyMissing,
            HashBakerError::InstallFailed { .. } => ErrorKind::InstallFailed,
            HashBakerError::NetworkError { .. } => ErrorKind::NetworkError,
            HashBakerError::ToolInvocationFailed { .. } => ErrorKind::ToolInvocationFailed,
            HashBakerError::OutputWriteFailed { .. } => ErrorKind::OutputWriteFailed,
            HashBakerError::Config { .. } => ErrorKind::Config,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for HashBakerError {
    fn user_message(&self) -> String {
        let message = match self {
            HashBakerError::FileNotFound { path } => {
                format!("Error: file not found: {}", path.display())
            }
            HashBakerError::UnsupportedFormat { .. } => {
                "Unsupported file format: no extractor matches this file.".to_string()
            }
            HashBakerError::DependencyMissing {
                names,
                install_hint,
            } => {
                format!(
                    "Missing dependency: {} (install with: {})",
                    names.join(", "),
                    install_hint
                )
            }
            HashBakerError::InstallFailed { packages, reason } => {
                format!(
                    "Dependency installation failed for {}: {}",
                    packages.join(", "),
                    reason
                )
            }
            HashBakerError::NetworkError { name, reason } => {
                format!("Could not download helper script {}: {}", name, reason)
            }
            HashBakerError::ToolInvocationFailed {
                tool,
                exit_code: Some(code),
                detail,
            } if !matches!(detail, FailureDetail::NoOutput) => {
                format!("{} exited with code {}: {}", tool, code, detail)
            }
            HashBakerError::ToolInvocationFailed { tool, detail, .. } => {
                format!("{} failed: {}", tool, detail)
            }
            _ => self.to_string(),
        };

        single_line(&message)
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            HashBakerError::FileNotFound { .. } => Some(
                "Check the path and make sure the file is readable.".to_string()
            ),
            HashBakerError::UnsupportedFormat { .. } => Some(
                "Supported formats: pdf, doc(x), xls(x), ppt(x), zip, rar, 7z, pcap/cap/pcapng and ntds.dit.".to_string()
            ),
            HashBakerError::DependencyMissing { .. } => Some(
                "Install the listed tools manually, or re-run as root to let HashBaker install them.".to_string()
            ),
            HashBakerError::InstallFailed { .. } => Some(
                "Run the package manager by hand to see the full error; another instance may hold its lock.".to_string()
            ),
            HashBakerError::NetworkError { .. } => Some(
                "Check your internet connection, or place the script in the helper directory yourself.".to_string()
            ),
            HashBakerError::ToolInvocationFailed {
                detail: FailureDetail::Timeout(_),
                ..
            } => Some(
                "Increase the time limit with --timeout.".to_string()
            ),
            HashBakerError::ToolInvocationFailed { .. } => Some(
                "The file may not be password protected, or may be damaged.".to_string()
            ),
            HashBakerError::Config { .. } => Some(
                "Check your configuration file syntax and values.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for HashBakerError {
    fn from(error: toml::de::Error) -> Self {
        HashBakerError::Config {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HashBakerError>;

/// Collapses any multi-line text into a single line for the failure template.
pub(crate) fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_user_friendly_messages() {
        let error = HashBakerError::DependencyMissing {
            names: vec!["zip2john".to_string(), "perl".to_string()],
            install_hint: "apt-get install -y john perl".to_string(),
        };
        let message = error.user_message();
        assert!(message.contains("zip2john"));
        assert!(message.contains("perl"));
        assert!(message.contains("apt-get install -y john perl"));
        assert!(error.suggestion().is_some());
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let kinds = [
            ErrorKind::FileNotFound,
            ErrorKind::UnsupportedFormat,
            ErrorKind::DependencyMissing,
            ErrorKind::InstallFailed,
            ErrorKind::NetworkError,
            ErrorKind::ToolInvocationFailed,
            ErrorKind::OutputWriteFailed,
            ErrorKind::Config,
        ];

        let codes: HashSet<i32> = kinds.iter().map(|k| k.exit_code()).collect();
        assert_eq!(codes.len(), kinds.len());
        assert!(!codes.contains(&0));
        assert_eq!(ErrorKind::DependencyMissing.exit_code(), 2);
        assert_eq!(ErrorKind::UnsupportedFormat.exit_code(), 3);
        assert_eq!(ErrorKind::ToolInvocationFailed.exit_code(), 4);
    }

    #[test]
    fn test_stderr_tail_is_one_line() {
        let error = HashBakerError::ToolInvocationFailed {
            tool: "zip2john".to_string(),
            exit_code: Some(1),
            detail: FailureDetail::Stderr("first line\nsecond   line\n".to_string()),
        };
        let message = error.user_message();
        assert!(!message.contains('\n'));
        assert_eq!(message, "zip2john exited with code 1: first line second line");
    }

    #[test]
    fn test_timeout_marker() {
        let error = HashBakerError::ToolInvocationFailed {
            tool: "rar2john".to_string(),
            exit_code: None,
            detail: FailureDetail::Timeout(Duration::from_secs(30)),
        };
        assert!(error.user_message().contains("timed out after 30s"));
        assert!(error.suggestion().unwrap().contains("--timeout"));
        assert_eq!(error.kind(), ErrorKind::ToolInvocationFailed);
    }

    #[test]
    fn test_no_output_message() {
        let error = HashBakerError::ToolInvocationFailed {
            tool: "zip2john".to_string(),
            exit_code: Some(0),
            detail: FailureDetail::NoOutput,
        };
        assert_eq!(error.user_message(), "zip2john failed: no hash output produced");
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_error = toml::from_str::<toml::Value>("not = [valid").unwrap_err();
        let error = HashBakerError::from(toml_error);
        assert_eq!(error.kind(), ErrorKind::Config);
    }
}
