use clap::error::ErrorKind as ClapErrorKind;
use clap::{CommandFactory, Parser};
use hashbaker::{Cli, HashBaker, OutputFormatter, UserFriendlyError};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

const USAGE_EXIT_CODE: i32 = 1;

fn main() {
    let exit_code = run(std::env::args_os());
    process::exit(exit_code);
}

fn run<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();

    // Decided on the raw arguments: clap treats env-supplied values as present.
    if args.len() <= 1 {
        eprintln!("{}", Cli::command().render_help());
        return 0;
    }

    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => return handle_parse_error(e),
    };

    init_logging(&cli);

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let path = match cli.protected_file_path.clone() {
        Some(path) => path,
        None => {
            eprintln!("{}", Cli::command().render_usage());
            return USAGE_EXIT_CODE;
        }
    };

    let baker = match HashBaker::from_cli(&cli) {
        Ok(baker) => baker,
        Err(e) => {
            let exit_code = e.exit_code();
            OutputFormatter::new(cli.verbosity_level(), cli.quiet).print_startup_error(e);
            return exit_code;
        }
    };

    baker.run(path)
}

fn handle_parse_error(error: clap::Error) -> i32 {
    let _ = error.print();

    match error.kind() {
        ClapErrorKind::DisplayHelp
        | ClapErrorKind::DisplayVersion
        | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => 0,
        _ => USAGE_EXIT_CODE,
    }
}

/// Diagnostics go to stderr; `RUST_LOG` takes precedence over `-v`.
fn init_logging(cli: &Cli) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hashbaker={}", cli.log_level())));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("hashbaker.toml"));

    match HashBaker::generate_sample_config(&config_path) {
        Ok(()) => {
            println!(
                "Generated sample configuration file: {}",
                config_path.display()
            );
            println!("\nTo use this configuration:");
            println!(
                "  hashbaker <protected-file> --config {}",
                config_path.display()
            );
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            e.exit_code()
        }
    }
}
