use crate::error::{HashBakerError, Result, UserFriendlyError};
use crate::runner::{CommandRunner, OutputMode, ToolCommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// An external binary a strategy needs on PATH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub name: &'static str,
    /// Any one of these executable names satisfies the dependency.
    pub executables: &'static [&'static str],
    /// Package providing it.
    pub package: &'static str,
}

pub trait ExecutableLookup {
    fn find(&self, executable: &str) -> Option<PathBuf>;
}

/// Looks executables up on the process PATH.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPath;

impl ExecutableLookup for SystemPath {
    fn find(&self, executable: &str) -> Option<PathBuf> {
        which::which(executable).ok()
    }
}

/// Absolute paths of the executables that satisfied each dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedDependencies {
    paths: BTreeMap<&'static str, PathBuf>,
}

impl ResolvedDependencies {
    pub fn get(&self, dependency: &Dependency) -> Option<&Path> {
        self.paths.get(dependency.name).map(PathBuf::as_path)
    }

    pub fn require(&self, dependency: &Dependency) -> Result<&Path> {
        self.get(dependency)
            .ok_or_else(|| HashBakerError::DependencyMissing {
                names: vec![dependency.name.to_string()],
                install_hint: dependency.package.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct InstallSettings {
    pub allowed: bool,
    /// Package-list refresh run ahead of `command`; empty skips it.
    pub refresh: Vec<String>,
    pub command: Vec<String>,
    /// Shared by the refresh and the install.
    pub timeout: Duration,
}

pub struct DependencyResolver<'a> {
    lookup: &'a dyn ExecutableLookup,
    runner: &'a dyn CommandRunner,
    settings: InstallSettings,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(
        lookup: &'a dyn ExecutableLookup,
        runner: &'a dyn CommandRunner,
        settings: InstallSettings,
    ) -> Self {
        Self {
            lookup,
            runner,
            settings,
        }
    }

    pub fn resolve(&self, dependencies: &[Dependency]) -> Result<ResolvedDependencies> {
        let (resolved, missing) = self.locate(dependencies);
        if missing.is_empty() {
            return Ok(resolved);
        }

        let packages = packages_for(&missing);

        if !self.settings.allowed {
            return Err(HashBakerError::DependencyMissing {
                names: names_of(&missing),
                install_hint: self.install_hint(&packages),
            });
        }

        // One batched attempt; whatever is still missing afterwards is reported, not retried.
        self.install(&packages)?;

        let (resolved, still_missing) = self.locate(dependencies);
        if !still_missing.is_empty() {
            return Err(HashBakerError::InstallFailed {
                packages,
                reason: format!(
                    "{} still missing after install",
                    names_of(&still_missing).join(", ")
                ),
            });
        }

        Ok(resolved)
    }

    fn locate(&self, dependencies: &[Dependency]) -> (ResolvedDependencies, Vec<Dependency>) {
        let mut resolved = ResolvedDependencies::default();
        let mut missing = Vec::new();

        for dependency in dependencies {
            let found = dependency
                .executables
                .iter()
                .find_map(|executable| self.lookup.find(executable));

            match found {
                Some(path) => {
                    debug!(dependency = dependency.name, path = %path.display(), "dependency resolved");
                    resolved.paths.insert(dependency.name, path);
                }
                None => {
                    debug!(dependency = dependency.name, "dependency missing");
                    missing.push(*dependency);
                }
            }
        }

        (resolved, missing)
    }

    fn install(&self, packages: &[String]) -> Result<()> {
        let failed = |reason: String| HashBakerError::InstallFailed {
            packages: packages.to_vec(),
            reason,
        };

        let install = to_command(&self.settings.command)
            .ok_or_else(|| failed("no install command configured".to_string()))?
            .args(packages);

        let started = Instant::now();

        if let Some(refresh) = to_command(&self.settings.refresh) {
            info!(program = %refresh.tool, "refreshing package lists");
            self.runner
                .run(&refresh, OutputMode::Quiet, self.settings.timeout)
                .map_err(|e| failed(e.user_message()))?;
        }

        info!(packages = %packages.join(" "), "installing missing dependencies");

        let remaining = self.settings.timeout.saturating_sub(started.elapsed());
        self.runner
            .run(&install, OutputMode::Quiet, remaining)
            .map(|_| ())
            .map_err(|e| failed(e.user_message()))
    }

    pub fn install_hint(&self, packages: &[String]) -> String {
        let mut parts = self.settings.command.clone();
        parts.extend(packages.iter().cloned());
        parts.join(" ")
    }
}

fn to_command(parts: &[String]) -> Option<ToolCommand> {
    let (program, args) = parts.split_first()?;
    Some(ToolCommand::new(program.clone(), program).args(args))
}

fn names_of(dependencies: &[Dependency]) -> Vec<String> {
    dependencies.iter().map(|d| d.name.to_string()).collect()
}

fn packages_for(dependencies: &[Dependency]) -> Vec<String> {
    let mut packages: Vec<String> = Vec::new();
    for dependency in dependencies {
        if !packages.iter().any(|p| p == dependency.package) {
            packages.push(dependency.package.to_string());
        }
    }
    packages
}
