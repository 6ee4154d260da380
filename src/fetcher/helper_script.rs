use crate::config::HelperConfig;
use crate::error::{HashBakerError, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Static description of an auxiliary script a strategy depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelperSpec {
    pub name: &'static str,
    pub default_source: &'static str,
}

/// A helper script bound to a concrete source and cache location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperScript {
    pub name: String,
    pub source: Url,
    pub cache_path: PathBuf,
}

impl HelperScript {
    pub fn from_spec(spec: &HelperSpec, config: &HelperConfig) -> Result<Self> {
        let source = config
            .sources
            .get(spec.name)
            .map(String::as_str)
            .unwrap_or(spec.default_source);

        let source = Url::parse(source).map_err(|e| HashBakerError::Config {
            message: format!("Invalid source URL for helper {}: {}", spec.name, e),
        })?;

        Ok(Self {
            name: spec.name.to_string(),
            source,
            cache_path: config.directory.join(spec.name),
        })
    }
}

pub trait ScriptSource {
    /// Streams the body at `source` into `sink`, returning the byte count.
    fn download(&self, source: &Url, sink: &mut dyn Write) -> io::Result<u64>;
}

/// Blocking HTTP(S) transport.
pub struct HttpSource {
    agent: ureq::Agent,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }
}

impl ScriptSource for HttpSource {
    fn download(&self, source: &Url, sink: &mut dyn Write) -> io::Result<u64> {
        let response = self
            .agent
            .get(source.as_str())
            .call()
            .map_err(|e| io::Error::other(e.to_string()))?;

        let mut reader = response.into_reader();
        io::copy(&mut reader, sink)
    }
}

pub struct HelperScriptFetcher {
    source: Box<dyn ScriptSource>,
}

impl HelperScriptFetcher {
    pub fn new(source: Box<dyn ScriptSource>) -> Self {
        Self { source }
    }

    pub fn fetch(&self, script: &HelperScript) -> Result<PathBuf> {
        if is_cached(&script.cache_path) {
            debug!(helper = %script.name, path = %script.cache_path.display(), "helper cache hit");
            return Ok(script.cache_path.clone());
        }

        let network_error = |reason: String| HashBakerError::NetworkError {
            name: script.name.clone(),
            reason,
        };

        let directory = script
            .cache_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        fs::create_dir_all(directory).map_err(|e| {
            network_error(format!("cannot create {}: {}", directory.display(), e))
        })?;

        info!(helper = %script.name, source = %script.source, "downloading helper script");

        // Staged beside the final path so the rename below never crosses filesystems.
        let mut staged = tempfile::Builder::new()
            .prefix(&format!(".{}.", script.name))
            .suffix(".part")
            .tempfile_in(directory)
            .map_err(|e| network_error(format!("cannot stage download: {}", e)))?;

        let bytes = self
            .source
            .download(&script.source, staged.as_file_mut())
            .map_err(|e| network_error(e.to_string()))?;

        if bytes == 0 {
            return Err(network_error("empty response".to_string()));
        }

        staged
            .as_file()
            .sync_all()
            .map_err(|e| network_error(e.to_string()))?;

        make_executable(staged.path()).map_err(|e| network_error(e.to_string()))?;

        staged
            .persist(&script.cache_path)
            .map_err(|e| network_error(e.error.to_string()))?;

        debug!(helper = %script.name, bytes, "helper script cached");
        Ok(script.cache_path.clone())
    }
}

fn is_cached(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o700);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
