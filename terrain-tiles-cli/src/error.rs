//! CLI error type and exit codes.

use std::fmt;

use terrain_tiles::config::ConfigError;
use terrain_tiles::coord::CoordError;
use terrain_tiles::fetch::FetchError;
use terrain_tiles::logging::LoggingError;
use terrain_tiles::protocol::ProtocolError;
use terrain_tiles::renderer::RendererError;
use terrain_tiles::scheme::SchemeError;

/// Exit code for configuration and usage errors.
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for everything else.
pub const EXIT_FAILURE: i32 = 1;

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid arguments or settings.
    Config(String),
    /// The configuration file could not be read or written.
    ConfigFile(ConfigError),
    /// A URL template or request option is malformed.
    Protocol(ProtocolError),
    /// Capabilities could not be fetched or understood.
    Scheme(SchemeError),
    Renderer(RendererError),
    Fetch(FetchError),
    Coord(CoordError),
    Logging(LoggingError),
    /// The async runtime could not be started.
    Runtime(std::io::Error),
    /// Streaming did not settle in time.
    Timeout(u64),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_)
            | CliError::ConfigFile(_)
            | CliError::Protocol(_)
            | CliError::Coord(_) => EXIT_CONFIG,
            CliError::Renderer(RendererError::InvalidConfig(_))
            | CliError::Renderer(RendererError::Protocol(_)) => EXIT_CONFIG,
            CliError::Renderer(RendererError::Scheme(e)) | CliError::Scheme(e)
                if is_config_error(e) =>
            {
                EXIT_CONFIG
            }
            _ => EXIT_FAILURE,
        }
    }
}

fn is_config_error(error: &SchemeError) -> bool {
    matches!(
        error,
        SchemeError::InvalidResolutionFactor(_) | SchemeError::InvalidConfig(_)
    )
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Protocol(e) => write!(f, "Invalid request settings: {}", e),
            CliError::Scheme(e) => write!(f, "{}", e),
            CliError::Renderer(e) => write!(f, "{}", e),
            CliError::Fetch(e) => write!(f, "{}", e),
            CliError::Coord(e) => write!(f, "{}", e),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Timeout(secs) => write!(f, "Tile streaming did not settle within {}s", secs),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<ProtocolError> for CliError {
    fn from(e: ProtocolError) -> Self {
        CliError::Protocol(e)
    }
}

impl From<SchemeError> for CliError {
    fn from(e: SchemeError) -> Self {
        CliError::Scheme(e)
    }
}

impl From<RendererError> for CliError {
    fn from(e: RendererError) -> Self {
        CliError::Renderer(e)
    }
}

impl From<FetchError> for CliError {
    fn from(e: FetchError) -> Self {
        CliError::Fetch(e)
    }
}

impl From<CoordError> for CliError {
    fn from(e: CoordError) -> Self {
        CliError::Coord(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_use_config_exit_code() {
        assert_eq!(CliError::Config("bad".into()).exit_code(), EXIT_CONFIG);
        assert_eq!(
            CliError::from(ProtocolError::MissingPlaceholder("TileRow")).exit_code(),
            EXIT_CONFIG
        );
        assert_eq!(
            CliError::from(CoordError::InvalidLatitude(10.0)).exit_code(),
            EXIT_CONFIG
        );
        assert_eq!(
            CliError::from(RendererError::InvalidConfig("zero".into())).exit_code(),
            EXIT_CONFIG
        );
    }

    #[test]
    fn test_runtime_errors_use_failure_exit_code() {
        assert_eq!(CliError::from(FetchError::Aborted).exit_code(), EXIT_FAILURE);
        assert_eq!(CliError::Timeout(5).exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn test_display_mentions_cause() {
        let err = CliError::Timeout(30);
        assert!(err.to_string().contains("30s"));
    }
}
