//! pkgpatch CLI - Command-line interface
//!
//! Stands in for a host package manager: resolves the project's patches and
//! replays post-install events for packages listed in the installed-state
//! file.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::Term;
use pkgpatch::logging::{init_logging, LoggingOptions};

use commands::apply::ApplyArgs;
use commands::config::ConfigArgs;
use commands::resolve::ResolveArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "pkgpatch")]
#[command(about = "Apply verified source patches to installed dependency packages", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the patches resolved from every source
    Resolve(ResolveArgs),

    /// Apply patches to installed packages and record them
    Apply(ApplyArgs),

    /// Show the effective patching configuration
    Config(ConfigArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _logging = match init_logging(LoggingOptions {
        verbose: cli.verbose,
        log_file: cli.log_file.clone(),
        ansi: Term::stderr().features().colors_supported(),
    }) {
        Ok(guard) => guard,
        Err(e) => {
            CliError::from(e).report();
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Resolve(args) => commands::resolve::run(args),
        Commands::Apply(args) => commands::apply::run(args),
        Commands::Config(args) => commands::config::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            e.report();
            ExitCode::FAILURE
        }
    }
}
