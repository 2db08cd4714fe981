//! Logging setup.
//!
//! Human-readable output goes to stderr. An optional log file receives the
//! same events without colour through a non-blocking writer; keep the
//! returned [`LoggingGuard`] alive so buffered lines are flushed on exit.
//!
//! `RUST_LOG` overrides the default filter when set.

use std::fs;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{PatchError, PatchResult};

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Log at debug instead of info.
    pub verbose: bool,
    /// Also append to this file.
    pub log_file: Option<PathBuf>,
    /// Colour stderr output.
    pub ansi: bool,
}

/// Keeps the file writer alive.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "pkgpatch=debug"
    } else {
        "pkgpatch=info"
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(options: LoggingOptions) -> PatchResult<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(options.verbose)));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::rfc_3339())
        .with_target(false)
        .with_ansi(options.ansi);

    let (file_layer, guard) = match &options.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let name = path.file_name().ok_or_else(|| {
                PatchError::InvalidConfiguration(format!(
                    "log file {} has no file name",
                    path.display()
                ))
            })?;

            fs::create_dir_all(&dir).map_err(|e| PatchError::WriteFailed {
                path: dir.clone(),
                source: e,
            })?;

            let appender = tracing_appender::rolling::never(&dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(LocalTime::rfc_3339())
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| {
            PatchError::InvalidConfiguration(format!("failed to initialize logging: {}", e))
        })?;

    Ok(LoggingGuard { _file: guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(false), "pkgpatch=info");
        assert_eq!(default_filter(true), "pkgpatch=debug");
    }

    #[test]
    fn test_log_file_without_name() {
        let options = LoggingOptions {
            log_file: Some(PathBuf::from("/")),
            ..Default::default()
        };
        assert!(matches!(
            init_logging(options),
            Err(PatchError::InvalidConfiguration(_))
        ));
    }
}
