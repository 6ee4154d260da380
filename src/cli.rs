use crate::config::{running_elevated, CliOverrides, Config};
use crate::error::Result;
use crate::ui::BANNER;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hashbaker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract crackable password hashes from protected files")]
#[command(
    long_about = "HashBaker identifies the format of a password-protected file, makes sure the \
                  matching extractor is available and writes the extracted hash next to the \
                  input as <name>.hash, ready for John the Ripper or hashcat."
)]
#[command(before_help = BANNER)]
#[command(after_help = "EXAMPLES:\n  \
    hashbaker secret.zip\n  \
    hashbaker quarterly.xlsx --no-install\n  \
    hashbaker capture.pcapng --timeout 600 -v\n  \
    hashbaker /mnt/dc/ntds.dit --helper-dir ~/.cache/hashbaker\n\n\
    SUPPORTED FORMATS:\n  \
    pdf, doc, docx, xls, xlsx, ppt, pptx, zip, rar, 7z, pcap, cap, pcapng, ntds.dit")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Password-protected file to extract a hash from
    #[arg(value_name = "PROTECTED_FILE_PATH")]
    pub protected_file_path: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Helper script cache directory
    #[arg(
        long,
        env = "HASHBAKER_HELPER_DIR",
        help = "Directory where downloaded helper scripts are cached"
    )]
    pub helper_dir: Option<PathBuf>,

    /// Extractor timeout in seconds
    #[arg(
        long,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Time limit for the extractor run (seconds, default 300)"
    )]
    pub timeout: Option<u64>,

    /// Never install missing packages
    #[arg(long, help = "Never attempt package installation, even when running as root")]
    pub no_install: bool,

    /// Verbose output level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (no spinners, no suggestions)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Write a sample configuration file and exit")]
    pub generate_config: bool,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.install.elevated = running_elevated();
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_helper_dir(self.helper_dir.clone())
            .with_timeout(self.timeout)
            .with_no_install(self.no_install)
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Default filter directive for the log subscriber.
    pub fn log_level(&self) -> &'static str {
        match self.verbosity_level() {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
