//! Terrain Tiles CLI - Command-line interface
//!
//! Inspects WMTS tile pyramids and runs the tile streaming engine against a
//! live service.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use terrain_tiles::logging;

use commands::common::{load_config, BasemapArgs};
use commands::config::ConfigCommands;
use commands::stream::StreamArgs;
use commands::url::UrlArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "terrain-tiles")]
#[command(version, about = "Level-of-detail tile streaming for WMTS basemaps", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.config/terrain-tiles/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tile matrix levels of the basemap pyramid
    Levels {
        #[command(flatten)]
        basemap: BasemapArgs,
    },

    /// Print the request URL of one tile
    Url {
        /// Matrix level, 0 = coarsest
        #[arg(long)]
        level: u32,

        /// Tile column
        #[arg(long)]
        col: u32,

        /// Tile row
        #[arg(long)]
        row: u32,

        #[command(flatten)]
        basemap: BasemapArgs,
    },

    /// Stream tiles along a straight pan and report engine statistics
    Stream {
        /// Latitude of the pan center (WGS84)
        #[arg(long, default_value = "52.3731")]
        lat: f64,

        /// Longitude of the pan center (WGS84)
        #[arg(long, default_value = "4.8926")]
        lon: f64,

        /// Camera height in metres
        #[arg(long, default_value = "900")]
        height: f64,

        /// Number of frames to run
        #[arg(long, default_value = "240")]
        frames: u32,

        /// Camera movement per frame in metres
        #[arg(long, default_value = "25")]
        speed: f64,

        /// Frame interval in milliseconds
        #[arg(long, default_value = "16")]
        frame_ms: u64,

        /// Seconds to wait for outstanding fetches after the last frame
        #[arg(long, default_value = "30")]
        settle_timeout: u64,

        #[command(flatten)]
        basemap: BasemapArgs,
    },

    /// View the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let _log_guard = match logging::init(cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => exit_with(CliError::from(e)),
    };

    if let Err(e) = run(cli) {
        exit_with(e);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Levels { basemap } => {
            let config = load_config(config_path)?;
            commands::levels::run(&basemap, &config)
        }
        Commands::Url {
            level,
            col,
            row,
            basemap,
        } => {
            let config = load_config(config_path)?;
            commands::url::run(
                &UrlArgs {
                    basemap,
                    level,
                    col,
                    row,
                },
                &config,
            )
        }
        Commands::Stream {
            lat,
            lon,
            height,
            frames,
            speed,
            frame_ms,
            settle_timeout,
            basemap,
        } => {
            let config = load_config(config_path)?;
            commands::stream::run(
                &StreamArgs {
                    basemap,
                    lat,
                    lon,
                    height,
                    frames,
                    speed,
                    frame_ms,
                    settle_timeout,
                },
                &config,
            )
        }
        Commands::Config { command } => commands::config::run(command, config_path),
    }
}

fn exit_with(error: CliError) -> ! {
    eprintln!("{} {}", style("Error:").red().bold(), error);
    std::process::exit(error.exit_code());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_url_command() {
        let cli = Cli::try_parse_from([
            "terrain-tiles",
            "url",
            "--level",
            "5",
            "--col",
            "3",
            "--row",
            "7",
            "--layer",
            "pastel",
        ])
        .unwrap();

        match cli.command {
            Commands::Url {
                level,
                col,
                row,
                basemap,
            } => {
                assert_eq!((level, col, row), (5, 3, 7));
                assert_eq!(basemap.layer.as_deref(), Some("pastel"));
                assert!(!basemap.capabilities);
            }
            _ => panic!("expected url command"),
        }
    }

    #[test]
    fn test_stream_defaults() {
        let cli = Cli::try_parse_from(["terrain-tiles", "stream"]).unwrap();
        match cli.command {
            Commands::Stream { frames, height, .. } => {
                assert_eq!(frames, 240);
                assert_eq!(height, 900.0);
            }
            _ => panic!("expected stream command"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["terrain-tiles", "config", "path", "--config", "/tmp/c.ini"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.ini")));
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Path
            }
        ));
    }

    #[test]
    fn test_url_requires_coordinates() {
        assert!(Cli::try_parse_from(["terrain-tiles", "url", "--level", "1"]).is_err());
    }
}
