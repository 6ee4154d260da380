use crate::error::{HashBakerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolConfig,
    pub network: NetworkConfig,
    pub helpers: HelperConfig,
    pub install: InstallConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolConfig {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HelperConfig {
    pub directory: PathBuf,
    /// Per-script download URL overrides, keyed by script name.
    pub sources: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InstallConfig {
    pub enabled: bool,
    /// Run once before `command` to refresh package lists. Empty skips it.
    pub refresh: Vec<String>,
    pub command: Vec<String>,
    pub timeout_secs: u64,
    /// Whether this process may run the package manager. Detected at startup, never read from disk.
    #[serde(skip)]
    pub elevated: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300, // 5 minutes
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { timeout_secs: 15 }
    }
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            directory: default_helper_directory(),
            sources: BTreeMap::new(),
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh: vec!["apt-get".to_string(), "update".to_string()],
            command: vec![
                "apt-get".to_string(),
                "install".to_string(),
                "-y".to_string(),
            ],
            timeout_secs: 600,
            elevated: false,
        }
    }
}

fn default_helper_directory() -> PathBuf {
    let base = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("helper_scripts")
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(HashBakerError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| HashBakerError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| HashBakerError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["hashbaker.toml", ".hashbaker.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref helper_dir) = cli_args.helper_dir {
            self.helpers.directory = helper_dir.clone();
        }

        if let Some(timeout) = cli_args.timeout {
            self.tools.timeout_secs = timeout;
        }

        if cli_args.no_install {
            self.install.enabled = false;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| HashBakerError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| HashBakerError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.tools.timeout_secs == 0 {
            return Err(HashBakerError::Config {
                message: "Tool timeout must be greater than 0".to_string(),
            });
        }

        if self.network.timeout_secs == 0 {
            return Err(HashBakerError::Config {
                message: "Network timeout must be greater than 0".to_string(),
            });
        }

        if self.install.timeout_secs == 0 {
            return Err(HashBakerError::Config {
                message: "Install timeout must be greater than 0".to_string(),
            });
        }

        if !names_program(&self.install.command) {
            return Err(HashBakerError::Config {
                message: "Install command must start with a program name".to_string(),
            });
        }

        if !self.install.refresh.is_empty() && !names_program(&self.install.refresh) {
            return Err(HashBakerError::Config {
                message: "Install refresh command must start with a program name".to_string(),
            });
        }

        for (name, source) in &self.helpers.sources {
            let url = Url::parse(source).map_err(|e| HashBakerError::Config {
                message: format!("Invalid source URL for helper {}: {}", name, e),
            })?;

            if !matches!(url.scheme(), "http" | "https") {
                return Err(HashBakerError::Config {
                    message: format!(
                        "Helper {} must be fetched over http or https, got {}",
                        name,
                        url.scheme()
                    ),
                });
            }
        }

        Ok(())
    }

    /// Effective permission to run the package manager this invocation.
    pub fn can_install(&self) -> bool {
        self.install.enabled && self.install.elevated
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tools.timeout_secs)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network.timeout_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install.timeout_secs)
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

fn names_program(command: &[String]) -> bool {
    command
        .first()
        .map(|program| !program.trim().is_empty())
        .unwrap_or(false)
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub helper_dir: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub no_install: bool,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_helper_dir(mut self, helper_dir: Option<PathBuf>) -> Self {
        self.helper_dir = helper_dir;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<u64>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_no_install(mut self, no_install: bool) -> Self {
        self.no_install = no_install;
        self
    }
}

/// Whether the current process runs with package-manager privilege.
#[cfg(unix)]
pub fn running_elevated() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn running_elevated() -> bool {
    false
}
