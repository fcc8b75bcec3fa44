//! Adapter over the 3D building tileset loader.
//!
//! The basemap only needs a handful of facts from the building loader: where
//! its root sits (to derive the shared scene center), whether it is still
//! downloading or parsing, and a way to drive and tear it down. Loader
//! implementations expose exactly that through [`TilesetAdapter`]; nothing in
//! this crate reaches into loader internals.

use nalgebra::Vector3;

use crate::renderer::TilesRenderer;
use crate::scheme::Camera;

/// In-flight work of a tileset loader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    pub downloading: usize,
    pub parsing: usize,
}

impl LoaderStats {
    /// True when the loader has nothing left to download or parse.
    pub fn is_settled(&self) -> bool {
        self.downloading == 0 && self.parsing == 0
    }
}

/// The narrow surface of a hierarchical building tileset loader.
pub trait TilesetAdapter {
    /// Translation of the root tile's transform, if the tileset has one.
    fn root_translation(&self) -> Option<Vector3<f64>>;

    /// Position of the loader's render group in the scene.
    fn group_position(&self) -> Vector3<f64>;

    /// True once the group was moved so the tileset's center sits at the origin.
    fn is_centered(&self) -> bool;

    fn stats(&self) -> LoaderStats;

    fn set_camera(&mut self, camera: &Camera);

    /// Advances the loader's own level of detail.
    fn update(&mut self);

    fn dispose(&mut self);
}

/// CRS position of the scene origin, derived from the building tileset.
///
/// A re-centered tileset is offset by its negated group position; otherwise
/// the root transform's translation is used, or the CRS origin if there is
/// none.
pub fn scene_center(tileset: &dyn TilesetAdapter) -> Vector3<f64> {
    if tileset.is_centered() {
        return -tileset.group_position();
    }
    tileset.root_translation().unwrap_or_else(Vector3::zeros)
}

/// True when both the building loader and the basemap are idle, i.e. the
/// frame will not change until the camera moves.
pub fn scene_settled(tileset: &dyn TilesetAdapter, basemap: &TilesRenderer) -> bool {
    tileset.stats().is_settled() && basemap.is_settled()
}
