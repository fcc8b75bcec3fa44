//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events; binaries call [`init`] once at
//! startup. The filter comes from `RUST_LOG` and defaults to
//! [`DEFAULT_DIRECTIVE`].

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{Directive, EnvFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter directive used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "terrain_tiles=info";

/// Errors installing the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid filter directive {directive:?}: {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("Log file path has no file name: {0}")]
    InvalidLogPath(PathBuf),

    #[error("Failed to create log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("A global subscriber is already installed")]
    AlreadyInitialized,
}

/// Builds the `RUST_LOG` filter, falling back to `default_directive`.
pub fn env_filter(default_directive: &str) -> Result<EnvFilter, LoggingError> {
    let directive: Directive =
        default_directive
            .parse()
            .map_err(|e: tracing_subscriber::filter::ParseError| LoggingError::InvalidDirective {
                directive: default_directive.to_string(),
                reason: e.to_string(),
            })?;

    Ok(EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy())
}

/// Installs the global subscriber.
///
/// Output goes to stderr. With `log_file` set, events are also written to that
/// file through a non-blocking appender; the returned guard flushes it on drop
/// and must be held until the process exits.
pub fn init(log_file: Option<&Path>) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = env_filter(DEFAULT_DIRECTIVE)?;
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    match log_file {
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init()
                .map_err(|_| LoggingError::AlreadyInitialized)?;
            Ok(None)
        }
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .try_init()
                .map_err(|_| LoggingError::AlreadyInitialized)?;
            tracing::debug!(path = %path.display(), "File logging enabled");
            Ok(Some(guard))
        }
    }
}

fn file_writer(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggingError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidLogPath(path.to_path_buf()))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(directory)?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    Ok(tracing_appender::non_blocking(appender))
}
