//! Tile scheme: level-of-detail selection and visible tile enumeration.
//!
//! Given a camera, the [`TileScheme`] decides which matrix level fits the view
//! and which tiles of that level the view covers. The engine calls it once per
//! frame and diffs the result against its active tiles.
//!
//! # Algorithm
//!
//! 1. Project the view frustum onto the ground plane ([`GroundFootprint`]);
//!    rays near or above the horizon are clamped to a multiple of the camera
//!    height so oblique views stay bounded.
//! 2. Compute the ground size of one screen pixel at the focus point and scale
//!    it by the resolution factor to get the target tile resolution.
//! 3. Pick the level whose resolution is nearest the target in octaves, with a
//!    bias toward the coarser level when two levels are close.
//! 4. Enumerate every tile of that level intersecting the footprint, skipping
//!    indices outside the matrix. If there are more than `max_tiles_in_view`,
//!    step to a coarser level.
//! 5. Order tiles nearest-to-focus first so the most important fetches start
//!    first.

mod camera;

pub use camera::{Camera, GroundFootprint};

use std::ops::RangeInclusive;

use nalgebra::Vector3;
use thiserror::Error;

use crate::fetch::{FetchError, HttpClient};
use crate::matrix::{parse_capabilities, CapabilitiesError, TileAddress, TileMatrixLevel, TileMatrixSet};
use crate::protocol::WmtsOptions;

/// Default cap on the number of tiles returned for one view.
pub const DEFAULT_MAX_TILES_IN_VIEW: usize = 40;

/// Default far clamp for oblique rays, as a multiple of camera height.
pub const DEFAULT_MAX_VIEW_DISTANCE_FACTOR: f64 = 8.0;

/// How far (in octaves) a finer level must beat a coarser one to be chosen.
const COARSE_BIAS_OCTAVES: f64 = 0.25;

/// Errors raised by tile selection.
#[derive(Debug, Error)]
pub enum SchemeError {
    /// The resolution factor must be positive and finite.
    #[error("Invalid resolution factor {0}: must be > 0")]
    InvalidResolutionFactor(f64),

    /// The camera description is unusable.
    #[error("Invalid camera: {0}")]
    InvalidCamera(String),

    /// The scheme configuration is unusable.
    #[error("Invalid scheme configuration: {0}")]
    InvalidConfig(String),

    /// Capabilities could not be parsed.
    #[error("Capabilities error: {0}")]
    Capabilities(#[from] CapabilitiesError),

    /// Capabilities could not be fetched.
    #[error("Failed to fetch capabilities: {0}")]
    Fetch(#[from] FetchError),
}

/// Selects the tiles covering the current view.
pub trait TileScheme: Send {
    /// Returns the tiles of one matrix level that intersect the camera's view.
    ///
    /// All returned tiles share a level. An empty result means nothing of the
    /// pyramid is visible.
    ///
    /// # Errors
    ///
    /// Returns [`SchemeError::InvalidResolutionFactor`] when
    /// `resolution_factor <= 0` and [`SchemeError::InvalidCamera`] for a
    /// degenerate camera.
    fn tiles_in_view(
        &self,
        camera: &Camera,
        resolution_factor: f64,
        scene_center: &Vector3<f64>,
    ) -> Result<Vec<TileAddress>, SchemeError>;
}

/// Tunables for [`WmtsTileScheme`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchemeConfig {
    /// Maximum number of tiles returned for one view.
    pub max_tiles_in_view: usize,
    /// Far clamp for rays near the horizon, as a multiple of camera height.
    pub max_view_distance_factor: f64,
}

impl Default for SchemeConfig {
    fn default() -> Self {
        Self {
            max_tiles_in_view: DEFAULT_MAX_TILES_IN_VIEW,
            max_view_distance_factor: DEFAULT_MAX_VIEW_DISTANCE_FACTOR,
        }
    }
}

impl SchemeConfig {
    fn validate(&self) -> Result<(), SchemeError> {
        if self.max_tiles_in_view == 0 {
            return Err(SchemeError::InvalidConfig(
                "max_tiles_in_view must be > 0".to_string(),
            ));
        }
        if !(self.max_view_distance_factor.is_finite() && self.max_view_distance_factor > 0.0) {
            return Err(SchemeError::InvalidConfig(format!(
                "max_view_distance_factor {} must be > 0",
                self.max_view_distance_factor
            )));
        }
        Ok(())
    }
}

// =============================================================================
// WMTS Tile Scheme
// =============================================================================

/// Tile scheme over a WMTS tile matrix set.
#[derive(Debug, Clone)]
pub struct WmtsTileScheme {
    matrix_set: TileMatrixSet,
    config: SchemeConfig,
}

impl WmtsTileScheme {
    /// Creates a scheme over an already-known matrix set.
    pub fn new(matrix_set: TileMatrixSet, config: SchemeConfig) -> Result<Self, SchemeError> {
        config.validate()?;
        Ok(Self { matrix_set, config })
    }

    /// Fetches the server's capabilities and builds the scheme from the
    /// configured tile matrix set.
    pub async fn from_capabilities(
        client: &dyn HttpClient,
        options: &WmtsOptions,
        config: SchemeConfig,
    ) -> Result<Self, SchemeError> {
        let url = options.capabilities_url();
        tracing::info!(url = %url, tile_matrix_set = %options.tile_matrix_set, "Loading WMTS capabilities");

        let body = client.get(&url).await?;
        let xml = String::from_utf8_lossy(&body);
        let matrix_set = parse_capabilities(&xml, &options.tile_matrix_set)?;
        Self::new(matrix_set, config)
    }

    /// The pyramid this scheme selects from.
    pub fn matrix_set(&self) -> &TileMatrixSet {
        &self.matrix_set
    }

    /// Active configuration.
    pub fn config(&self) -> &SchemeConfig {
        &self.config
    }
}

impl TileScheme for WmtsTileScheme {
    fn tiles_in_view(
        &self,
        camera: &Camera,
        resolution_factor: f64,
        scene_center: &Vector3<f64>,
    ) -> Result<Vec<TileAddress>, SchemeError> {
        if !(resolution_factor.is_finite() && resolution_factor > 0.0) {
            return Err(SchemeError::InvalidResolutionFactor(resolution_factor));
        }
        camera.validate()?;

        let height = camera.position.z + scene_center.z;
        let max_distance = height * self.config.max_view_distance_factor;
        let Some(footprint) = GroundFootprint::project(camera, scene_center, max_distance) else {
            return Ok(Vec::new());
        };

        let target = camera.pixel_footprint(footprint.focus_distance) * resolution_factor;
        let levels = self.matrix_set.levels();
        let mut level = select_level(levels, target);

        loop {
            let matrix = &levels[level];
            let Some((cols, rows)) = covered_tiles(matrix, &footprint) else {
                return Ok(Vec::new());
            };

            let count = range_len(&cols) * range_len(&rows);
            if count > self.config.max_tiles_in_view && level > 0 {
                tracing::trace!(level, count, "Too many tiles in view, stepping to a coarser level");
                level -= 1;
                continue;
            }

            let mut tiles = Vec::with_capacity(count);
            for row in rows.clone() {
                for col in cols.clone() {
                    tiles.push(TileAddress::new(std::sync::Arc::clone(matrix), col, row));
                }
            }
            sort_by_focus(&mut tiles, matrix, footprint.focus);
            tiles.truncate(self.config.max_tiles_in_view);
            return Ok(tiles);
        }
    }
}

/// Picks the level index whose resolution best matches `target`.
///
/// Distances are compared in octaves (`log2` of the resolution ratio); levels
/// finer than the target pay [`COARSE_BIAS_OCTAVES`], so an ambiguous target
/// between two levels resolves to the coarser one.
pub fn select_level(levels: &[std::sync::Arc<TileMatrixLevel>], target: f64) -> usize {
    let mut best = 0;
    let mut best_cost = f64::INFINITY;

    for (index, level) in levels.iter().enumerate() {
        let octaves = (level.resolution() / target).log2();
        let cost = if octaves < 0.0 {
            -octaves + COARSE_BIAS_OCTAVES
        } else {
            octaves
        };
        if cost < best_cost {
            best = index;
            best_cost = cost;
        }
    }

    best
}

fn covered_tiles(
    matrix: &TileMatrixLevel,
    footprint: &GroundFootprint,
) -> Option<(RangeInclusive<u32>, RangeInclusive<u32>)> {
    let cols = matrix.col_range(footprint.min_x, footprint.max_x)?;
    let rows = matrix.row_range(footprint.min_y, footprint.max_y)?;
    Some((cols, rows))
}

fn range_len(range: &RangeInclusive<u32>) -> usize {
    (*range.end() - *range.start()) as usize + 1
}

fn sort_by_focus(tiles: &mut [TileAddress], matrix: &TileMatrixLevel, focus: (f64, f64)) {
    let distance = |tile: &TileAddress| {
        let (x, y) = matrix.tile_center(tile.col, tile.row);
        (x - focus.0).powi(2) + (y - focus.1).powi(2)
    };
    tiles.sort_by(|a, b| {
        distance(a)
            .total_cmp(&distance(b))
            .then_with(|| (a.row, a.col).cmp(&(b.row, b.col)))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::tests::test_matrix_set;
    use crate::matrix::TileId;

    /// 4×4 tiles of 1000 units at level 0, 8×8 at level 1; origin (0, 4000).
    fn scheme() -> WmtsTileScheme {
        WmtsTileScheme::new(test_matrix_set(2, 4, 1000.0), SchemeConfig::default()).unwrap()
    }

    fn top_down(height: f64) -> Camera {
        Camera {
            position: Vector3::new(0.0, 0.0, height),
            direction: Vector3::new(0.0, 0.0, -1.0),
            up: Vector3::y(),
            fov_y: 60f64.to_radians(),
            aspect: 1.0,
            viewport_height: 512.0,
        }
    }

    fn ids(tiles: &[TileAddress]) -> Vec<TileId> {
        let mut ids: Vec<_> = tiles.iter().map(TileAddress::id).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_camera_above_center_at_level_zero_distance() {
        let center = Vector3::new(2000.0, 2000.0, 0.0);
        let tiles = scheme()
            .tiles_in_view(&top_down(1000.0), 2.0, &center)
            .unwrap();

        assert!(tiles.iter().all(|t| t.level() == 0));
        assert_eq!(
            ids(&tiles),
            vec![
                TileId::new(0, 1, 1),
                TileId::new(0, 1, 2),
                TileId::new(0, 2, 1),
                TileId::new(0, 2, 2),
            ]
        );
    }

    #[test]
    fn test_lower_resolution_factor_selects_finer_level() {
        let center = Vector3::new(2000.0, 2000.0, 0.0);
        let tiles = scheme()
            .tiles_in_view(&top_down(1000.0), 1.0, &center)
            .unwrap();

        assert_eq!(tiles.len(), 16);
        assert!(tiles.iter().all(|t| t.level() == 1));
        let cols: Vec<u32> = tiles.iter().map(|t| t.col).collect();
        assert!(cols.iter().all(|c| (2..=5).contains(c)));
    }

    #[test]
    fn test_higher_resolution_factor_never_selects_finer_level() {
        let center = Vector3::new(2000.0, 2000.0, 0.0);
        let scheme = scheme();
        let mut previous = u32::MAX;
        for factor in [0.25, 0.5, 1.0, 2.0, 4.0, 8.0] {
            let level = scheme.tiles_in_view(&top_down(1000.0), factor, &center).unwrap()[0].level();
            assert!(level <= previous, "factor {} picked finer level", factor);
            previous = level;
        }
    }

    #[test]
    fn test_ambiguous_target_prefers_coarser_level() {
        let set = test_matrix_set(2, 4, 1000.0);
        let r0 = set.level(0).unwrap().resolution();
        let r1 = set.level(1).unwrap().resolution();
        let midpoint = (r0 * r1).sqrt();

        assert_eq!(select_level(set.levels(), midpoint), 0);
        assert_eq!(select_level(set.levels(), r1), 1);
        assert_eq!(select_level(set.levels(), r0 * 10.0), 0);
        assert_eq!(select_level(set.levels(), r1 / 10.0), 1);
    }

    #[test]
    fn test_too_many_tiles_steps_to_coarser_level() {
        let scheme = WmtsTileScheme::new(
            test_matrix_set(2, 4, 1000.0),
            SchemeConfig {
                max_tiles_in_view: 4,
                ..SchemeConfig::default()
            },
        )
        .unwrap();
        let center = Vector3::new(2000.0, 2000.0, 0.0);
        let tiles = scheme.tiles_in_view(&top_down(1000.0), 1.0, &center).unwrap();

        assert_eq!(tiles.len(), 4);
        assert!(tiles.iter().all(|t| t.level() == 0));
    }

    #[test]
    fn test_out_of_range_indices_are_skipped() {
        // Above the pyramid's south-west corner: only one quadrant exists
        let center = Vector3::new(0.0, 0.0, 0.0);
        let tiles = scheme().tiles_in_view(&top_down(1000.0), 2.0, &center).unwrap();

        assert_eq!(ids(&tiles), vec![TileId::new(0, 0, 3)]);
        assert!(tiles.iter().all(TileAddress::in_bounds));
    }

    #[test]
    fn test_view_outside_pyramid_is_empty() {
        let center = Vector3::new(-50_000.0, 0.0, 0.0);
        let tiles = scheme().tiles_in_view(&top_down(1000.0), 2.0, &center).unwrap();
        assert!(tiles.is_empty());
    }

    #[test]
    fn test_camera_at_ground_level_is_empty() {
        let center = Vector3::new(2000.0, 2000.0, 0.0);
        let tiles = scheme().tiles_in_view(&top_down(0.0), 2.0, &center).unwrap();
        assert!(tiles.is_empty());
    }

    #[test]
    fn test_invalid_resolution_factor_is_rejected() {
        let center = Vector3::new(2000.0, 2000.0, 0.0);
        for factor in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = scheme().tiles_in_view(&top_down(1000.0), factor, &center);
            assert!(matches!(result, Err(SchemeError::InvalidResolutionFactor(_))));
        }
    }

    #[test]
    fn test_tiles_are_ordered_nearest_focus_first() {
        // Focus sits inside tile (2, 2) of level 0
        let center = Vector3::new(2400.0, 1600.0, 0.0);
        let tiles = scheme().tiles_in_view(&top_down(1000.0), 2.0, &center).unwrap();

        assert_eq!(tiles[0].id(), TileId::new(0, 2, 2));
    }

    #[test]
    fn test_oblique_view_is_bounded_and_single_level() {
        let set = TileMatrixSet::rd_new();
        let scheme = WmtsTileScheme::new(set, SchemeConfig::default()).unwrap();
        let camera = Camera::looking_at(
            Vector3::new(0.0, -3000.0, 1500.0),
            Vector3::new(0.0, 2000.0, 0.0),
            50.0,
            (1280.0, 720.0),
        );
        let center = Vector3::new(121_500.0, 487_500.0, 0.0);
        let tiles = scheme.tiles_in_view(&camera, 4.5, &center).unwrap();

        assert!(!tiles.is_empty());
        assert!(tiles.len() <= DEFAULT_MAX_TILES_IN_VIEW);
        let level = tiles[0].level();
        assert!(tiles.iter().all(|t| t.level() == level));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = WmtsTileScheme::new(
            test_matrix_set(1, 1, 100.0),
            SchemeConfig {
                max_tiles_in_view: 0,
                ..SchemeConfig::default()
            },
        );
        assert!(matches!(result, Err(SchemeError::InvalidConfig(_))));
    }
}
