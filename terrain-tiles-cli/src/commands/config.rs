//! Configuration CLI commands.
//!
//! Provides `config path`, `config show` and `config init`.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use terrain_tiles::config::{config_file_path, ConfigFile};

use super::common::load_config;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,

    /// Write a configuration file with the default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand. `path` overrides the default file location.
pub fn run(command: ConfigCommands, path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(path),
        ConfigCommands::Show => run_show(path),
        ConfigCommands::Init { force } => run_init(path, force),
    }
}

fn resolve_path(path: Option<&Path>) -> Result<PathBuf, CliError> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => config_file_path().ok_or_else(|| {
            CliError::Config("Could not determine the user configuration directory".to_string())
        }),
    }
}

/// Show the configuration file path.
fn run_path(path: Option<&Path>) -> Result<(), CliError> {
    println!("{}", resolve_path(path)?.display());
    Ok(())
}

/// Show the effective configuration.
fn run_show(path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(path)?;
    for line in describe(&config) {
        println!("{}", line);
    }
    Ok(())
}

/// Write the defaults to the configuration file.
fn run_init(path: Option<&Path>, force: bool) -> Result<(), CliError> {
    let path = resolve_path(path)?;
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }
    ConfigFile::default().save_to(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Effective settings, one `key = value` line each, grouped by section.
pub fn describe(config: &ConfigFile) -> Vec<String> {
    let b = &config.basemap;
    let r = &config.renderer;

    let mut lines = vec![
        "[basemap]".to_string(),
        format!("  url = {}", b.url),
        format!("  layer = {}", b.layer),
        format!("  style = {}", b.style),
        format!("  tile_matrix_set = {}", b.tile_matrix_set),
        format!("  format = {}", b.format),
        format!("  template = {}", b.template.as_deref().unwrap_or("(not set)")),
    ];
    for (key, value) in &b.extra {
        lines.push(format!("  param.{} = {}", key, value));
    }

    lines.extend([
        String::new(),
        "[renderer]".to_string(),
        format!("  resolution_factor = {}", r.resolution_factor),
        format!("  max_concurrent_fetches = {}", r.max_concurrent_fetches),
        format!("  max_active_tiles = {}", r.max_active_tiles),
        format!("  max_tiles_in_view = {}", r.scheme.max_tiles_in_view),
        format!("  max_view_distance_factor = {}", r.scheme.max_view_distance_factor),
    ]);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_describe_lists_every_section() {
        let lines = describe(&ConfigFile::default());
        assert!(lines.contains(&"[basemap]".to_string()));
        assert!(lines.contains(&"[renderer]".to_string()));
        assert!(lines.contains(&"  layer = grijs".to_string()));
        assert!(lines.contains(&"  template = (not set)".to_string()));
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");

        run_init(Some(&path), false).unwrap();
        assert!(path.exists());
        assert!(run_init(Some(&path), false).is_err());
        run_init(Some(&path), true).unwrap();
    }
}
