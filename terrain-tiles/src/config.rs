//! INI configuration file.
//!
//! Lives at `~/.config/terrain-tiles/config.ini`:
//!
//! ```ini
//! [basemap]
//! url = https://service.pdok.nl/brt/achtergrondkaart/wmts/v2_0?
//! layer = grijs
//! tile_matrix_set = EPSG:28992
//! ; template = https://host/{TileMatrix}/{TileCol}/{TileRow}.png
//! ; param.apikey = ...
//!
//! [renderer]
//! resolution_factor = 4.5
//! max_concurrent_fetches = 10
//! max_active_tiles = 50
//! max_tiles_in_view = 40
//! max_view_distance_factor = 8
//! ```
//!
//! Every key is optional; a missing file yields the defaults.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;

use crate::protocol::WmtsOptions;
use crate::renderer::RendererConfig;

const BASEMAP_SECTION: &str = "basemap";
const RENDERER_SECTION: &str = "renderer";
const EXTRA_PARAM_PREFIX: &str = "param.";

/// Default basemap: PDOK's grey BRT background map.
pub const DEFAULT_BASEMAP_URL: &str = "https://service.pdok.nl/brt/achtergrondkaart/wmts/v2_0?";
pub const DEFAULT_BASEMAP_LAYER: &str = "grijs";

/// Errors reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid value for [{section}] {key}: {value:?} ({reason})")]
    InvalidValue {
        section: &'static str,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Could not determine the user configuration directory")]
    NoConfigDir,
}

/// Directory holding the configuration file.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("terrain-tiles"))
}

/// Default location of the configuration file.
pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.ini"))
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub basemap: WmtsOptions,
    pub renderer: RendererConfig,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            basemap: WmtsOptions::new(DEFAULT_BASEMAP_URL, DEFAULT_BASEMAP_LAYER),
            renderer: RendererConfig::default(),
        }
    }
}

impl ConfigFile {
    /// Loads the file at the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Loads `path`, or returns the defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = Self::from_ini(&ini)?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some(BASEMAP_SECTION)) {
            let basemap = &mut config.basemap;
            for (key, value) in section.iter() {
                match key {
                    "url" => basemap.url = value.to_string(),
                    "layer" => basemap.layer = value.to_string(),
                    "style" => basemap.style = value.to_string(),
                    "tile_matrix_set" => basemap.tile_matrix_set = value.to_string(),
                    "service" => basemap.service = value.to_string(),
                    "request" => basemap.request = value.to_string(),
                    "version" => basemap.version = value.to_string(),
                    "format" => basemap.format = value.to_string(),
                    "template" => {
                        basemap.template = Some(value.to_string()).filter(|t| !t.is_empty())
                    }
                    _ => match key.strip_prefix(EXTRA_PARAM_PREFIX) {
                        Some(param) => basemap.extra.push((param.to_string(), value.to_string())),
                        None => tracing::warn!(section = BASEMAP_SECTION, key, "Ignoring unknown config key"),
                    },
                }
            }
        }

        if let Some(section) = ini.section(Some(RENDERER_SECTION)) {
            let renderer = &mut config.renderer;
            for (key, value) in section.iter() {
                match key {
                    "resolution_factor" => renderer.resolution_factor = parse(RENDERER_SECTION, key, value)?,
                    "max_concurrent_fetches" => {
                        renderer.max_concurrent_fetches = parse(RENDERER_SECTION, key, value)?
                    }
                    "max_active_tiles" => renderer.max_active_tiles = parse(RENDERER_SECTION, key, value)?,
                    "max_tiles_in_view" => {
                        renderer.scheme.max_tiles_in_view = parse(RENDERER_SECTION, key, value)?
                    }
                    "max_view_distance_factor" => {
                        renderer.scheme.max_view_distance_factor = parse(RENDERER_SECTION, key, value)?
                    }
                    _ => tracing::warn!(section = RENDERER_SECTION, key, "Ignoring unknown config key"),
                }
            }
        }

        Ok(config)
    }

    /// Writes the file to the default location, creating its directory.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = config_file_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.to_ini().write_to_file(path)?;
        Ok(())
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        let b = &self.basemap;
        ini.with_section(Some(BASEMAP_SECTION))
            .set("url", b.url.as_str())
            .set("layer", b.layer.as_str())
            .set("style", b.style.as_str())
            .set("tile_matrix_set", b.tile_matrix_set.as_str())
            .set("service", b.service.as_str())
            .set("request", b.request.as_str())
            .set("version", b.version.as_str())
            .set("format", b.format.as_str());
        if let Some(template) = &b.template {
            ini.with_section(Some(BASEMAP_SECTION))
                .set("template", template.as_str());
        }
        for (key, value) in &b.extra {
            ini.with_section(Some(BASEMAP_SECTION))
                .set(format!("{}{}", EXTRA_PARAM_PREFIX, key), value.as_str());
        }

        let r = &self.renderer;
        ini.with_section(Some(RENDERER_SECTION))
            .set("resolution_factor", r.resolution_factor.to_string())
            .set("max_concurrent_fetches", r.max_concurrent_fetches.to_string())
            .set("max_active_tiles", r.max_active_tiles.to_string())
            .set("max_tiles_in_view", r.scheme.max_tiles_in_view.to_string())
            .set(
                "max_view_distance_factor",
                r.scheme.max_view_distance_factor.to_string(),
            );
        ini
    }
}

fn parse<T>(section: &'static str, key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        section,
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
