pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod resolver;
pub mod runner;
pub mod ui;

#[cfg(test)]
mod testing;

// Public API re-exports
pub use cli::Cli;
pub use config::{CliOverrides, Config};
pub use error::{ErrorKind, HashBakerError, Result, UserFriendlyError};

// Core functionality re-exports
pub use classifier::{FileTypeClassifier, FormatTag, MimeProbe, TargetFile};
pub use extractor::{ExtractionResult, ResultReporter, Stage, Strategy};
pub use fetcher::{HelperScriptFetcher, ScriptSource};
pub use resolver::{DependencyResolver, ExecutableLookup};
pub use runner::{CommandRunner, ProcessRunner, ToolCommand};
pub use ui::{OutputFormatter, ProgressManager};

use classifier::FileCommandProbe;
use extractor::{StageTracker, StrategyContext};
use fetcher::HttpSource;
use resolver::{InstallSettings, SystemPath};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Main library interface: one protected file in, one `.hash` file out.
pub struct HashBaker {
    config: Config,
    classifier: FileTypeClassifier,
    lookup: Box<dyn ExecutableLookup>,
    runner: Box<dyn CommandRunner>,
    fetcher: HelperScriptFetcher,
    reporter: ResultReporter,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
}

impl HashBaker {
    /// Wires the real collaborators: `file`, PATH lookup, child processes and HTTP.
    pub fn new(config: Config, verbose: u8, quiet: bool) -> Self {
        let show_progress = !quiet && console::Term::stderr().is_term();
        let fetcher = HelperScriptFetcher::new(Box::new(HttpSource::new(config.network_timeout())));

        Self {
            classifier: FileTypeClassifier::new(Box::new(FileCommandProbe::new())),
            lookup: Box::new(SystemPath),
            runner: Box::new(ProcessRunner::new()),
            fetcher,
            reporter: ResultReporter::new(),
            output_formatter: OutputFormatter::new(verbose, quiet),
            progress_manager: ProgressManager::new(show_progress),
            config,
        }
    }

    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        Ok(Self::new(config, cli_args.verbosity_level(), cli_args.quiet))
    }

    pub fn with_mime_probe(mut self, probe: Box<dyn MimeProbe>) -> Self {
        self.classifier = FileTypeClassifier::new(probe);
        self
    }

    pub fn with_lookup(mut self, lookup: Box<dyn ExecutableLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn with_runner(mut self, runner: Box<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_script_source(mut self, source: Box<dyn ScriptSource>) -> Self {
        self.fetcher = HelperScriptFetcher::new(source);
        self
    }

    /// Runs the full pipeline for `path` and reports how it ended.
    ///
    /// Nothing is written next to the input unless every earlier stage succeeded.
    pub fn extract<P: AsRef<Path>>(&self, path: P) -> ExtractionResult {
        let path = path.as_ref();
        let started = Instant::now();
        let mut stages = StageTracker::new();

        let result = ExtractionResult::from(self.extract_to_file(path, &mut stages));
        self.progress_manager.clear();

        match &result {
            ExtractionResult::Success { output_path } => {
                stages.advance(Stage::Reported);
                info!(
                    output = %output_path.display(),
                    elapsed = %ui::progress::format_duration(started.elapsed()),
                    "extraction finished"
                );
            }
            ExtractionResult::Failure { error } => {
                debug!(stage = ?stages.current(), kind = ?error.kind(), "extraction failed");
            }
        }

        result
    }

    fn extract_to_file(&self, path: &Path, stages: &mut StageTracker) -> Result<PathBuf> {
        let target = TargetFile::open(path)?;
        let request = self.classifier.request(target);
        stages.advance(Stage::Classified);

        let strategy = Strategy::for_format(request.format).ok_or_else(|| {
            HashBakerError::UnsupportedFormat {
                path: request.target.path.clone(),
            }
        })?;

        info!(
            file = %request.target.path.display(),
            format = %request.format,
            bytes = request.target.size,
            "selected {}",
            strategy
        );

        let context = StrategyContext {
            resolver: DependencyResolver::new(
                self.lookup.as_ref(),
                self.runner.as_ref(),
                self.install_settings(),
            ),
            lookup: self.lookup.as_ref(),
            fetcher: &self.fetcher,
            runner: self.runner.as_ref(),
            helpers: &self.config.helpers,
            timeout: self.config.tool_timeout(),
            progress: &self.progress_manager,
        };

        let hash = strategy.extract(&request.target, &context, stages)?;
        self.reporter.write_artifact(&request.target.path, &hash)
    }

    fn install_settings(&self) -> InstallSettings {
        InstallSettings {
            allowed: self.config.can_install(),
            refresh: self.config.install.refresh.clone(),
            command: self.config.install.command.clone(),
            timeout: self.config.install_timeout(),
        }
    }

    /// Extracts, prints the result templates and returns the process exit code.
    pub fn run<P: AsRef<Path>>(&self, path: P) -> i32 {
        let result = self.extract(path);
        self.progress_manager
            .suspend(|| self.output_formatter.print_result(&self.reporter, &result));
        result.exit_code()
    }

    /// Generate sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let output_path = output_path.as_ref();
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path, sample_config).map_err(|e| HashBakerError::Config {
            message: format!("Failed to write {}: {}", output_path.display(), e),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }
}

/// Get version information
pub fn version_info() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
