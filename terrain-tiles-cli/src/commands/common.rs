//! Common types and utilities shared across CLI commands.

use std::path::Path;

use clap::Args;
use terrain_tiles::config::ConfigFile;
use terrain_tiles::fetch::ReqwestClient;
use terrain_tiles::matrix::TileMatrixSet;
use terrain_tiles::protocol::WmtsOptions;
use terrain_tiles::scheme::WmtsTileScheme;

use crate::error::CliError;

/// Basemap source overrides. CLI flags take precedence over config.ini.
#[derive(Debug, Clone, Default, Args)]
pub struct BasemapArgs {
    /// WMTS service URL
    #[arg(long)]
    pub url: Option<String>,

    /// Layer identifier
    #[arg(long)]
    pub layer: Option<String>,

    /// Tile matrix set identifier (e.g., EPSG:28992)
    #[arg(long)]
    pub tile_matrix_set: Option<String>,

    /// RESTful URL template with {TileMatrix}, {TileCol} and {TileRow}
    #[arg(long)]
    pub template: Option<String>,

    /// Read the tile matrix set from the service capabilities instead of
    /// using the built-in RD New pyramid
    #[arg(long)]
    pub capabilities: bool,
}

impl BasemapArgs {
    /// Merges the overrides into the configured basemap.
    pub fn resolve(&self, config: &ConfigFile) -> WmtsOptions {
        let mut options = config.basemap.clone();
        if let Some(url) = &self.url {
            options.url = url.clone();
        }
        if let Some(layer) = &self.layer {
            options.layer = layer.clone();
        }
        if let Some(tile_matrix_set) = &self.tile_matrix_set {
            options.tile_matrix_set = tile_matrix_set.clone();
        }
        if let Some(template) = &self.template {
            options.template = Some(template.clone());
        }
        options
    }
}

/// Loads the config file from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}

/// Builds the multi-threaded runtime used by network commands.
pub fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
}

/// Returns the tile matrix set to work with: the built-in RD New pyramid, or
/// the one published in the service capabilities.
pub async fn resolve_matrix_set(
    args: &BasemapArgs,
    options: &WmtsOptions,
    config: &ConfigFile,
    client: &ReqwestClient,
) -> Result<TileMatrixSet, CliError> {
    if !args.capabilities {
        return Ok(TileMatrixSet::rd_new());
    }

    let scheme = WmtsTileScheme::from_capabilities(client, options, config.renderer.scheme).await?;
    Ok(scheme.matrix_set().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_overrides_replace_configured_values() {
        let config = ConfigFile::default();
        let args = BasemapArgs {
            layer: Some("standaard".to_string()),
            template: Some("https://h/{TileMatrix}/{TileCol}/{TileRow}.png".to_string()),
            ..BasemapArgs::default()
        };

        let options = args.resolve(&config);
        assert_eq!(options.layer, "standaard");
        assert_eq!(options.url, config.basemap.url);
        assert!(options.template.is_some());
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let config = ConfigFile::default();
        assert_eq!(BasemapArgs::default().resolve(&config), config.basemap);
    }

    #[test]
    fn test_load_config_from_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[basemap]\nlayer = pastel\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.basemap.layer, "pastel");
    }

    #[test]
    fn test_load_config_reports_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[renderer]\nresolution_factor = sharp\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_CONFIG);
    }
}
