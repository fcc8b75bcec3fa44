//! Tile matrix model
//!
//! A [`TileMatrixSet`] is the pyramid published by a WMTS server: one
//! [`TileMatrixLevel`] per zoom level, ordered from coarsest (level 0) to
//! finest. Levels are immutable once built and shared through `Arc`, so every
//! [`TileAddress`] can carry its level without copying it.
//!
//! # Coordinate Frames
//!
//! - **CRS frame**: the projection's native units (metres for RD New). Column
//!   indices grow eastwards from the level's top-left origin, row indices grow
//!   southwards.
//! - **Scene frame**: CRS coordinates minus a scene center, z up. Tile meshes
//!   lie on the plane `z = -scene_center.z`.

pub mod capabilities;

pub use capabilities::{parse_capabilities, CapabilitiesError};

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use nalgebra::Vector3;
use thiserror::Error;

/// OGC "standardized rendering pixel size" in metres.
pub const STANDARD_PIXEL_SIZE_M: f64 = 0.00028;

/// Errors raised while building a tile matrix set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatrixError {
    /// A tile matrix set must have at least one level.
    #[error("Tile matrix set '{0}' has no levels")]
    Empty(String),

    /// Tile span must be positive and finite.
    #[error("Level {level}: invalid tile span {span_x}×{span_y}")]
    InvalidSpan { level: u32, span_x: f64, span_y: f64 },

    /// Matrix and tile sizes must be non-zero.
    #[error("Level {level}: invalid size ({reason})")]
    InvalidSize { level: u32, reason: String },

    /// Levels must be numbered 0..n in order.
    #[error("Level at position {position} is numbered {level}")]
    OutOfOrder { position: usize, level: u32 },
}

// =============================================================================
// Tile Matrix Level
// =============================================================================

/// One zoom level of a tile pyramid.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMatrixLevel {
    /// Position in the set, 0 = coarsest.
    pub level: u32,
    /// Identifier published by the server (e.g. `"05"`).
    pub identifier: String,
    /// Width of one tile in CRS units.
    pub tile_span_x: f64,
    /// Height of one tile in CRS units.
    pub tile_span_y: f64,
    /// Tile width in pixels.
    pub tile_width: u32,
    /// Tile height in pixels.
    pub tile_height: u32,
    /// Number of tile columns.
    pub matrix_width: u32,
    /// Number of tile rows.
    pub matrix_height: u32,
    /// CRS x of the top-left corner of column 0.
    pub origin_x: f64,
    /// CRS y of the top-left corner of row 0.
    pub origin_y: f64,
}

impl TileMatrixLevel {
    /// Builds a level from the values a WMTS capabilities document publishes.
    ///
    /// The tile span follows from the scale denominator and the standardized
    /// 0.28 mm rendering pixel, which holds for metre-based CRSs.
    #[allow(clippy::too_many_arguments)]
    pub fn from_scale_denominator(
        level: u32,
        identifier: impl Into<String>,
        scale_denominator: f64,
        top_left: (f64, f64),
        tile_size: (u32, u32),
        matrix_size: (u32, u32),
    ) -> Self {
        let resolution = scale_denominator * STANDARD_PIXEL_SIZE_M;
        Self {
            level,
            identifier: identifier.into(),
            tile_span_x: resolution * tile_size.0 as f64,
            tile_span_y: resolution * tile_size.1 as f64,
            tile_width: tile_size.0,
            tile_height: tile_size.1,
            matrix_width: matrix_size.0,
            matrix_height: matrix_size.1,
            origin_x: top_left.0,
            origin_y: top_left.1,
        }
    }

    /// CRS units covered by one tile pixel.
    pub fn resolution(&self) -> f64 {
        self.tile_span_x / self.tile_width as f64
    }

    /// Returns true if `(col, row)` lies inside the matrix extent.
    pub fn contains(&self, col: i64, row: i64) -> bool {
        (0..self.matrix_width as i64).contains(&col) && (0..self.matrix_height as i64).contains(&row)
    }

    /// CRS extent of the whole level as `(min_x, min_y, max_x, max_y)`.
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        (
            self.origin_x,
            self.origin_y - self.tile_span_y * self.matrix_height as f64,
            self.origin_x + self.tile_span_x * self.matrix_width as f64,
            self.origin_y,
        )
    }

    /// CRS bounds of one tile as `(min_x, min_y, max_x, max_y)`.
    pub fn tile_bounds(&self, col: u32, row: u32) -> (f64, f64, f64, f64) {
        let min_x = self.origin_x + col as f64 * self.tile_span_x;
        let max_y = self.origin_y - row as f64 * self.tile_span_y;
        (min_x, max_y - self.tile_span_y, min_x + self.tile_span_x, max_y)
    }

    /// CRS center of one tile.
    pub fn tile_center(&self, col: u32, row: u32) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.tile_span_x,
            self.origin_y - (row as f64 + 0.5) * self.tile_span_y,
        )
    }

    /// Columns whose tiles overlap `[min_x, max_x]`, clamped to the matrix.
    ///
    /// Returns `None` when the interval misses the level entirely.
    pub fn col_range(&self, min_x: f64, max_x: f64) -> Option<RangeInclusive<u32>> {
        let first = ((min_x - self.origin_x) / self.tile_span_x).floor();
        let last = ((max_x - self.origin_x) / self.tile_span_x).floor();
        clamp_index_range(first, last, self.matrix_width)
    }

    /// Rows whose tiles overlap `[min_y, max_y]`, clamped to the matrix.
    pub fn row_range(&self, min_y: f64, max_y: f64) -> Option<RangeInclusive<u32>> {
        let first = ((self.origin_y - max_y) / self.tile_span_y).floor();
        let last = ((self.origin_y - min_y) / self.tile_span_y).floor();
        clamp_index_range(first, last, self.matrix_height)
    }

    fn validate(&self) -> Result<(), MatrixError> {
        let span_ok = |s: f64| s.is_finite() && s > 0.0;
        if !span_ok(self.tile_span_x) || !span_ok(self.tile_span_y) {
            return Err(MatrixError::InvalidSpan {
                level: self.level,
                span_x: self.tile_span_x,
                span_y: self.tile_span_y,
            });
        }
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(MatrixError::InvalidSize {
                level: self.level,
                reason: format!("tile size {}×{}", self.tile_width, self.tile_height),
            });
        }
        if self.matrix_width == 0 || self.matrix_height == 0 {
            return Err(MatrixError::InvalidSize {
                level: self.level,
                reason: format!("matrix size {}×{}", self.matrix_width, self.matrix_height),
            });
        }
        Ok(())
    }
}

fn clamp_index_range(first: f64, last: f64, size: u32) -> Option<RangeInclusive<u32>> {
    if !first.is_finite() || !last.is_finite() || size == 0 {
        return None;
    }
    let max_index = size as f64 - 1.0;
    if last < 0.0 || first > max_index {
        return None;
    }
    let first = first.max(0.0) as u32;
    let last = last.min(max_index) as u32;
    Some(first..=last)
}

// =============================================================================
// Tile Matrix Set
// =============================================================================

/// Registry of the levels of one tile pyramid, looked up by level index.
#[derive(Debug, Clone)]
pub struct TileMatrixSet {
    identifier: String,
    levels: Vec<Arc<TileMatrixLevel>>,
}

impl TileMatrixSet {
    /// Builds a set from levels ordered coarse to fine and numbered `0..n`.
    pub fn new(
        identifier: impl Into<String>,
        levels: Vec<TileMatrixLevel>,
    ) -> Result<Self, MatrixError> {
        let identifier = identifier.into();
        if levels.is_empty() {
            return Err(MatrixError::Empty(identifier));
        }
        for (position, level) in levels.iter().enumerate() {
            if level.level as usize != position {
                return Err(MatrixError::OutOfOrder {
                    position,
                    level: level.level,
                });
            }
            level.validate()?;
        }

        Ok(Self {
            identifier,
            levels: levels.into_iter().map(Arc::new).collect(),
        })
    }

    /// The Dutch RD New (EPSG:28992) pyramid served by PDOK.
    ///
    /// Level 0 is one 256 px tile at 3440.64 m/px; every following level halves
    /// the resolution and doubles the matrix in both directions.
    pub fn rd_new() -> Self {
        const LEVELS: u32 = 17;
        const LEVEL0_SCALE: f64 = 12_288_000.0;
        const TOP_LEFT: (f64, f64) = (-285_401.92, 903_401.92);

        let levels = (0..LEVELS)
            .map(|z| {
                let scale = LEVEL0_SCALE / f64::from(1u32 << z);
                let size = 1u32 << z;
                TileMatrixLevel::from_scale_denominator(
                    z,
                    format!("{:02}", z),
                    scale,
                    TOP_LEFT,
                    (256, 256),
                    (size, size),
                )
            })
            .collect::<Vec<_>>();

        Self {
            identifier: "EPSG:28992".to_string(),
            levels: levels.into_iter().map(Arc::new).collect(),
        }
    }

    /// Identifier of the set (e.g. `"EPSG:28992"`).
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Looks up a level by index.
    pub fn level(&self, level: u32) -> Option<&Arc<TileMatrixLevel>> {
        self.levels.get(level as usize)
    }

    /// All levels, coarsest first.
    pub fn levels(&self) -> &[Arc<TileMatrixLevel>] {
        &self.levels
    }

    /// Number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Always false for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Builds an address if `(col, row)` is inside the given level.
    pub fn address(&self, level: u32, col: u32, row: u32) -> Option<TileAddress> {
        let matrix = self.level(level)?;
        if !matrix.contains(col as i64, row as i64) {
            return None;
        }
        Some(TileAddress::new(Arc::clone(matrix), col, row))
    }
}

// =============================================================================
// Tile Addresses
// =============================================================================

/// Stable key of a tile: level, column and row.
///
/// Displayed as `level-col-row`, the key used for the active-tile set and the
/// download map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    pub level: u32,
    pub col: u32,
    pub row: u32,
}

impl TileId {
    pub fn new(level: u32, col: u32, row: u32) -> Self {
        Self { level, col, row }
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.level, self.col, self.row)
    }
}

/// A tile of a specific level. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct TileAddress {
    matrix: Arc<TileMatrixLevel>,
    pub col: u32,
    pub row: u32,
}

impl TileAddress {
    /// Creates an address without bounds checking.
    pub fn new(matrix: Arc<TileMatrixLevel>, col: u32, row: u32) -> Self {
        Self { matrix, col, row }
    }

    /// The level this tile belongs to.
    pub fn tile_matrix(&self) -> &Arc<TileMatrixLevel> {
        &self.matrix
    }

    /// Level index.
    pub fn level(&self) -> u32 {
        self.matrix.level
    }

    /// Stable key of this tile.
    pub fn id(&self) -> TileId {
        TileId::new(self.matrix.level, self.col, self.row)
    }

    /// Returns true if the column and row lie inside the level's matrix.
    pub fn in_bounds(&self) -> bool {
        self.matrix.contains(self.col as i64, self.row as i64)
    }

    /// Center of the tile in the scene frame.
    pub fn center_position(&self, scene_center: &Vector3<f64>) -> Vector3<f64> {
        let (x, y) = self.matrix.tile_center(self.col, self.row);
        Vector3::new(x - scene_center.x, y - scene_center.y, -scene_center.z)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    /// A square pyramid with `levels` levels; level 0 is `base` tiles wide.
    pub(crate) fn test_matrix_set(levels: u32, base: u32, span0: f64) -> TileMatrixSet {
        let levels = (0..levels)
            .map(|z| {
                let size = base << z;
                let span = span0 / f64::from(1u32 << z);
                TileMatrixLevel {
                    level: z,
                    identifier: z.to_string(),
                    tile_span_x: span,
                    tile_span_y: span,
                    tile_width: 256,
                    tile_height: 256,
                    matrix_width: size,
                    matrix_height: size,
                    origin_x: 0.0,
                    origin_y: span0 * base as f64,
                }
            })
            .collect();
        TileMatrixSet::new("test", levels).unwrap()
    }

    #[test]
    fn test_tile_id_display() {
        assert_eq!(TileId::new(5, 3, 7).to_string(), "5-3-7");
    }

    #[test]
    fn test_tile_center_in_crs() {
        let set = test_matrix_set(2, 4, 1000.0);
        let level = set.level(0).unwrap();

        assert_eq!(level.tile_center(0, 0), (500.0, 3500.0));
        assert_eq!(level.tile_center(3, 3), (3500.0, 500.0));
    }

    #[test]
    fn test_center_position_subtracts_scene_center() {
        let set = test_matrix_set(1, 4, 1000.0);
        let tile = set.address(0, 1, 2).unwrap();

        let position = tile.center_position(&Vector3::new(2000.0, 2000.0, 10.0));
        assert_eq!(position, Vector3::new(-500.0, -500.0, -10.0));
    }

    #[test]
    fn test_bounds_check() {
        let set = test_matrix_set(1, 4, 1000.0);
        let level = set.level(0).unwrap();

        assert!(level.contains(0, 0));
        assert!(level.contains(3, 3));
        assert!(!level.contains(4, 0));
        assert!(!level.contains(0, -1));
        assert!(set.address(0, 4, 0).is_none());
    }

    #[test]
    fn test_col_and_row_ranges_are_clamped() {
        let set = test_matrix_set(1, 4, 1000.0);
        let level = set.level(0).unwrap();

        assert_eq!(level.col_range(-500.0, 1500.0), Some(0..=1));
        assert_eq!(level.col_range(3500.0, 9000.0), Some(3..=3));
        assert_eq!(level.col_range(4500.0, 9000.0), None);
        // y = 3999 is just below the top edge, so row 0
        assert_eq!(level.row_range(2500.0, 3999.0), Some(0..=1));
        assert_eq!(level.row_range(-100.0, -50.0), None);
    }

    #[test]
    fn test_rd_new_preset() {
        let set = TileMatrixSet::rd_new();

        assert_eq!(set.identifier(), "EPSG:28992");
        assert_eq!(set.len(), 17);

        let level0 = set.level(0).unwrap();
        assert!((level0.resolution() - 3440.64).abs() < 1e-6);
        assert_eq!(level0.matrix_width, 1);
        assert_eq!(level0.identifier, "00");

        let level5 = set.level(5).unwrap();
        assert_eq!(level5.matrix_width, 32);
        assert!((level5.resolution() - 107.52).abs() < 1e-6);
    }

    #[test]
    fn test_new_rejects_empty_and_unordered_sets() {
        assert!(matches!(
            TileMatrixSet::new("x", Vec::new()),
            Err(MatrixError::Empty(_))
        ));

        let set = test_matrix_set(2, 1, 100.0);
        let mut levels: Vec<TileMatrixLevel> =
            set.levels().iter().map(|l| (**l).clone()).collect();
        levels.swap(0, 1);
        assert!(matches!(
            TileMatrixSet::new("x", levels),
            Err(MatrixError::OutOfOrder { position: 0, .. })
        ));
    }

    #[test]
    fn test_new_rejects_zero_span() {
        let mut level = (**test_matrix_set(1, 1, 100.0).level(0).unwrap()).clone();
        level.tile_span_x = 0.0;
        assert!(matches!(
            TileMatrixSet::new("x", vec![level]),
            Err(MatrixError::InvalidSpan { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_tile_center_lies_inside_tile_bounds(col in 0u32..64, row in 0u32..64) {
            let set = test_matrix_set(5, 4, 1000.0);
            let level = set.level(4).unwrap();
            let (cx, cy) = level.tile_center(col, row);
            let (min_x, min_y, max_x, max_y) = level.tile_bounds(col, row);
            prop_assert!(min_x < cx && cx < max_x);
            prop_assert!(min_y < cy && cy < max_y);
        }

        #[test]
        fn prop_point_maps_back_to_its_tile(x in 0.0f64..3999.0, y in 1.0f64..4000.0) {
            let set = test_matrix_set(3, 4, 1000.0);
            let level = set.level(2).unwrap();
            let cols = level.col_range(x, x).unwrap();
            let rows = level.row_range(y, y).unwrap();
            prop_assert_eq!(cols.start(), cols.end());
            prop_assert_eq!(rows.start(), rows.end());
            let (min_x, min_y, max_x, max_y) = level.tile_bounds(*cols.start(), *rows.start());
            prop_assert!(min_x <= x && x < max_x);
            prop_assert!(min_y < y && y <= max_y);
        }
    }
}
