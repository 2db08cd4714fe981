//! CLI error type.

use std::fmt;
use std::path::PathBuf;

use console::style;
use pkgpatch::PatchError;

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Bad arguments or configuration.
    Config(String),
    /// The manifest could not be read or parsed.
    Manifest { path: PathBuf, message: String },
    /// The patching library failed.
    Patch(PatchError),
    /// The run finished but some patches failed.
    PatchFailures(usize),
    /// Some patch sources or declarations could not be read.
    ResolutionProblems(usize),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Manifest { path, message } => {
                write!(f, "Failed to load manifest {}: {}", path.display(), message)
            }
            CliError::Patch(e) => write!(f, "{}", e),
            CliError::PatchFailures(1) => write!(f, "1 patch failed to apply"),
            CliError::PatchFailures(n) => write!(f, "{} patches failed to apply", n),
            CliError::ResolutionProblems(1) => {
                write!(f, "1 patch source or declaration could not be resolved")
            }
            CliError::ResolutionProblems(n) => {
                write!(f, "{} patch sources or declarations could not be resolved", n)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Patch(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PatchError> for CliError {
    fn from(e: PatchError) -> Self {
        CliError::Patch(e)
    }
}

impl CliError {
    /// Print the error to stderr.
    pub fn report(&self) {
        eprintln!("{} {}", style("Error:").red().bold(), self);
    }
}
