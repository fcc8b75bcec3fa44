//! Engine configuration.

use super::RendererError;
use crate::fetch::DEFAULT_MAX_CONCURRENT_FETCHES;
use crate::scheme::SchemeConfig;

/// Default LOD bias. Higher values pick coarser levels.
pub const DEFAULT_RESOLUTION_FACTOR: f64 = 4.5;

/// Default ceiling on live tiles before eviction starts.
pub const DEFAULT_MAX_ACTIVE_TILES: usize = 50;

/// Tunables for [`TilesRenderer`](super::TilesRenderer).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererConfig {
    /// Screen-pixel multiplier for the target tile resolution.
    pub resolution_factor: f64,
    /// Size of the concurrent fetch window.
    pub max_concurrent_fetches: usize,
    /// Live tile count above which tiles out of view are evicted.
    pub max_active_tiles: usize,
    /// Selector settings used when the engine builds its own scheme.
    pub scheme: SchemeConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            resolution_factor: DEFAULT_RESOLUTION_FACTOR,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            max_active_tiles: DEFAULT_MAX_ACTIVE_TILES,
            scheme: SchemeConfig::default(),
        }
    }
}

impl RendererConfig {
    pub fn with_resolution_factor(mut self, factor: f64) -> Self {
        self.resolution_factor = factor;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max;
        self
    }

    pub fn with_max_active_tiles(mut self, max: usize) -> Self {
        self.max_active_tiles = max;
        self
    }

    pub fn with_scheme(mut self, scheme: SchemeConfig) -> Self {
        self.scheme = scheme;
        self
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<(), RendererError> {
        if !(self.resolution_factor.is_finite() && self.resolution_factor > 0.0) {
            return Err(RendererError::InvalidConfig(format!(
                "resolution_factor must be > 0, got {}",
                self.resolution_factor
            )));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(RendererError::InvalidConfig(
                "max_concurrent_fetches must be > 0".to_string(),
            ));
        }
        if self.max_active_tiles == 0 {
            return Err(RendererError::InvalidConfig(
                "max_active_tiles must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
