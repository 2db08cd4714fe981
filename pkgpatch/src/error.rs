//! Error types for patch resolution, fetching and application.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for patch operations.
pub type PatchResult<T> = Result<T, PatchError>;

/// Errors that can occur while resolving, fetching, verifying or applying patches.
#[derive(Debug, Error)]
pub enum PatchError {
    /// A declaration is missing its description or URL, or carries an
    /// unusable field.
    #[error("invalid patch declaration for {package}: {reason}")]
    InvalidPatchDeclaration { package: String, reason: String },

    /// The supplied hash is not a 40 character hex SHA-1 digest.
    #[error("Invalid SHA-1 hash supplied for patch with url {url}")]
    InvalidHashFormat { url: String, hash: String },

    /// A patch-list file is malformed or has no `patches` key.
    #[error("invalid patches file {}: {message}", path.display())]
    InvalidPatchListFile { path: PathBuf, message: String },

    /// The patch could not be read from its source or written locally.
    #[error("{message}")]
    DownloadFailure { source_url: String, message: String },

    /// The patch content did not match its hash or could not be read back.
    #[error("{message}")]
    VerificationFailure { source_url: String, message: String },

    /// An operation was invoked out of order.
    #[error("logic error: {0}")]
    LogicViolation(String),

    /// Configuration is invalid (unknown option, wrong type, bad provider).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No applier accepted the patch at any permitted strip level.
    #[error("could not apply patch {source_url} to {package}: {reason}")]
    ApplyFailure {
        package: String,
        source_url: String,
        reason: String,
    },

    /// A patch failed while `stop-on-patch-failure` is on.
    #[error("patching {package} stopped at \"{description}\": {cause}")]
    Aborted {
        package: String,
        description: String,
        #[source]
        cause: Box<PatchError>,
    },

    /// Failed to read a file.
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// The installed-state record could not be parsed or updated.
    #[error("installed state {}: {reason}", path.display())]
    StateFile { path: PathBuf, reason: String },
}

impl PatchError {
    /// Whether this error must abort the run regardless of failure policy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::LogicViolation(_)
                | Self::InvalidConfiguration(_)
                | Self::StateFile { .. }
                | Self::Aborted { .. }
        )
    }

    /// Whether the `stop-on-patch-failure` policy decides what happens next.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DownloadFailure { .. }
                | Self::VerificationFailure { .. }
                | Self::ApplyFailure { .. }
        )
    }

    pub(crate) fn download(source_url: &str, message: impl Into<String>) -> Self {
        Self::DownloadFailure {
            source_url: source_url.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn verification(source_url: &str, message: impl Into<String>) -> Self {
        Self::VerificationFailure {
            source_url: source_url.to_string(),
            message: message.into(),
        }
    }
}
