use crate::classifier::{FormatTag, TargetFile};
use crate::config::HelperConfig;
use crate::error::{FailureDetail, HashBakerError, Result};
use crate::fetcher::{HelperScript, HelperScriptFetcher, HelperSpec};
use crate::resolver::{Dependency, DependencyResolver, ExecutableLookup, ResolvedDependencies};
use crate::runner::{CommandRunner, OutputMode, ToolCommand};
use crate::ui::ProgressManager;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const PYTHON3: Dependency = Dependency {
    name: "python3",
    executables: &["python3"],
    package: "python3",
};

pub const PERL: Dependency = Dependency {
    name: "perl",
    executables: &["perl"],
    package: "perl",
};

pub const ZIP2JOHN: Dependency = Dependency {
    name: "zip2john",
    executables: &["zip2john"],
    package: "john",
};

pub const RAR2JOHN: Dependency = Dependency {
    name: "rar2john",
    executables: &["rar2john"],
    package: "john",
};

pub const OFFICE2JOHN: Dependency = Dependency {
    name: "office2john",
    executables: &["office2john.py", "office2john"],
    package: "john",
};

pub const NTDS2JOHN: Dependency = Dependency {
    name: "ntds2john",
    executables: &["ntds2john.py", "ntds2john"],
    package: "john",
};

pub const HCXPCAPNGTOOL: Dependency = Dependency {
    name: "hcxpcapngtool",
    executables: &["hcxpcapngtool", "hcxpcaptool"],
    package: "hcxtools",
};

pub const PDF2JOHN: HelperSpec = HelperSpec {
    name: "pdf2john.py",
    default_source:
        "https://raw.githubusercontent.com/magnumripper/JohnTheRipper/bleeding-jumbo/run/pdf2john.py",
};

pub const SEVENZ2HASHCAT: HelperSpec = HelperSpec {
    name: "7z2hashcat.pl",
    default_source: "https://raw.githubusercontent.com/philsmd/7z2hashcat/master/7z2hashcat.pl",
};

/// Where a tool leaves the hash it extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChannel {
    Stdout,
    /// The tool writes to a file named on its command line.
    File,
}

/// Per-invocation progress through the extraction pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Classified,
    DependenciesResolved,
    HelperReady,
    Extracted,
    /// The `.hash` artifact is persisted and the result is ready to print.
    Reported,
}

#[derive(Debug)]
pub struct StageTracker {
    current: Stage,
}

impl StageTracker {
    pub fn new() -> Self {
        Self {
            current: Stage::Idle,
        }
    }

    pub fn advance(&mut self, next: Stage) {
        debug!(from = ?self.current, to = ?next, "stage");
        self.current = next;
    }

    pub fn current(&self) -> Stage {
        self.current
    }
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// What a strategy needs from the outside world to run.
pub struct StrategyContext<'a> {
    pub resolver: DependencyResolver<'a>,
    pub lookup: &'a dyn ExecutableLookup,
    pub fetcher: &'a HelperScriptFetcher,
    pub runner: &'a dyn CommandRunner,
    pub helpers: &'a HelperConfig,
    pub timeout: Duration,
    pub progress: &'a ProgressManager,
}

impl StrategyContext<'_> {
    /// A helper already on PATH wins over the cached download.
    fn helper_path(&self, spec: &HelperSpec) -> Result<PathBuf> {
        if let Some(path) = self.lookup.find(spec.name) {
            debug!(helper = spec.name, path = %path.display(), "helper found on PATH");
            return Ok(path);
        }

        let script = HelperScript::from_spec(spec, self.helpers)?;
        let spinner = self
            .progress
            .create_spinner(&format!("Downloading {}", script.name));
        let fetched = self.fetcher.fetch(&script);
        spinner.finish_and_clear();
        fetched
    }
}

/// Inputs needed to build a concrete tool command.
pub struct CommandInputs<'a> {
    pub target: &'a Path,
    pub resolved: &'a ResolvedDependencies,
    pub helper: Option<&'a Path>,
    pub scratch: Option<&'a Path>,
}

impl<'a> CommandInputs<'a> {
    fn helper(&self, spec: &HelperSpec) -> Result<&'a Path> {
        self.helper.ok_or_else(|| HashBakerError::DependencyMissing {
            names: vec![spec.name.to_string()],
            install_hint: spec.default_source.to_string(),
        })
    }

    fn scratch(&self, tool: &str) -> Result<&'a Path> {
        self.scratch.ok_or_else(|| HashBakerError::ToolInvocationFailed {
            tool: tool.to_string(),
            exit_code: None,
            detail: FailureDetail::Launch("no output file prepared".to_string()),
        })
    }
}

/// Extraction procedure bound to one supported format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Pdf,
    Office,
    Zip,
    Rar,
    SevenZip,
    Pcap,
    Ntds,
}

impl Strategy {
    pub fn for_format(format: FormatTag) -> Option<Self> {
        match format {
            FormatTag::Pdf => Some(Strategy::Pdf),
            FormatTag::Office => Some(Strategy::Office),
            FormatTag::Zip => Some(Strategy::Zip),
            FormatTag::Rar => Some(Strategy::Rar),
            FormatTag::SevenZip => Some(Strategy::SevenZip),
            FormatTag::Pcap => Some(Strategy::Pcap),
            FormatTag::Ntds => Some(Strategy::Ntds),
            FormatTag::Unknown => None,
        }
    }

    pub fn format(&self) -> FormatTag {
        match self {
            Strategy::Pdf => FormatTag::Pdf,
            Strategy::Office => FormatTag::Office,
            Strategy::Zip => FormatTag::Zip,
            Strategy::Rar => FormatTag::Rar,
            Strategy::SevenZip => FormatTag::SevenZip,
            Strategy::Pcap => FormatTag::Pcap,
            Strategy::Ntds => FormatTag::Ntds,
        }
    }

    pub fn dependencies(&self) -> &'static [Dependency] {
        match self {
            Strategy::Pdf => &[PYTHON3],
            Strategy::Office => &[OFFICE2JOHN],
            Strategy::Zip => &[ZIP2JOHN],
            Strategy::Rar => &[RAR2JOHN],
            Strategy::SevenZip => &[PERL],
            Strategy::Pcap => &[HCXPCAPNGTOOL],
            Strategy::Ntds => &[NTDS2JOHN],
        }
    }

    pub fn helper(&self) -> Option<&'static HelperSpec> {
        match self {
            Strategy::Pdf => Some(&PDF2JOHN),
            Strategy::SevenZip => Some(&SEVENZ2HASHCAT),
            _ => None,
        }
    }

    pub fn output_channel(&self) -> OutputChannel {
        match self {
            Strategy::Pcap => OutputChannel::File,
            _ => OutputChannel::Stdout,
        }
    }

    pub fn command(&self, inputs: &CommandInputs<'_>) -> Result<ToolCommand> {
        let resolved = inputs.resolved;

        let command = match self {
            Strategy::Pdf => ToolCommand::new(PDF2JOHN.name, resolved.require(&PYTHON3)?)
                .arg(inputs.helper(&PDF2JOHN)?)
                .arg(inputs.target),
            Strategy::SevenZip => ToolCommand::new(SEVENZ2HASHCAT.name, resolved.require(&PERL)?)
                .arg(inputs.helper(&SEVENZ2HASHCAT)?)
                .arg(inputs.target),
            Strategy::Office => {
                ToolCommand::new(OFFICE2JOHN.name, resolved.require(&OFFICE2JOHN)?)
                    .arg(inputs.target)
            }
            Strategy::Zip => {
                ToolCommand::new(ZIP2JOHN.name, resolved.require(&ZIP2JOHN)?).arg(inputs.target)
            }
            Strategy::Rar => {
                ToolCommand::new(RAR2JOHN.name, resolved.require(&RAR2JOHN)?).arg(inputs.target)
            }
            Strategy::Ntds => {
                ToolCommand::new(NTDS2JOHN.name, resolved.require(&NTDS2JOHN)?).arg(inputs.target)
            }
            Strategy::Pcap => {
                ToolCommand::new(HCXPCAPNGTOOL.name, resolved.require(&HCXPCAPNGTOOL)?)
                    .arg("-o")
                    .arg(inputs.scratch(HCXPCAPNGTOOL.name)?)
                    .arg(inputs.target)
            }
        };

        Ok(command)
    }

    /// Runs the whole procedure for `target` and returns the raw hash bytes.
    ///
    /// Dependencies are resolved and the helper script is in place before the
    /// tool is launched; any failure stops the pipeline where it happened.
    pub fn extract(
        &self,
        target: &TargetFile,
        context: &StrategyContext<'_>,
        stages: &mut StageTracker,
    ) -> Result<Vec<u8>> {
        let resolved = context.resolver.resolve(self.dependencies())?;
        stages.advance(Stage::DependenciesResolved);

        let helper = match self.helper() {
            Some(spec) => Some(context.helper_path(spec)?),
            None => None,
        };
        stages.advance(Stage::HelperReady);

        let scratch = match self.output_channel() {
            OutputChannel::File => Some(tempfile::NamedTempFile::new().map_err(|e| {
                HashBakerError::ToolInvocationFailed {
                    tool: self.dependencies()[0].name.to_string(),
                    exit_code: None,
                    detail: FailureDetail::Launch(format!("cannot create output file: {}", e)),
                }
            })?),
            OutputChannel::Stdout => None,
        };

        let command = self.command(&CommandInputs {
            target: &target.path,
            resolved: &resolved,
            helper: helper.as_deref(),
            scratch: scratch.as_ref().map(|f| f.path()),
        })?;

        let mode = match self.output_channel() {
            OutputChannel::Stdout => OutputMode::Capture,
            OutputChannel::File => OutputMode::Quiet,
        };

        let spinner = context
            .progress
            .create_spinner(&format!("Running {}", command.tool));
        let output = context.runner.run(&command, mode, context.timeout);
        spinner.finish_and_clear();
        let output = output?;

        let hash = match scratch {
            Some(file) => fs::read(file.path()).unwrap_or_default(),
            None => output.stdout,
        };

        if hash.is_empty() {
            return Err(HashBakerError::ToolInvocationFailed {
                tool: command.tool,
                exit_code: Some(output.exit_code),
                detail: FailureDetail::NoOutput,
            });
        }

        stages.advance(Stage::Extracted);
        Ok(hash)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} extractor", self.format())
    }
}
