//! Render group: the flat scene subtree the engine draws tiles into.
//!
//! Every tile owns one [`TileMesh`], a flat quad on the ground plane. A mesh
//! carries a [`TileLayer`] rather than a raw render-order number; the layer
//! decides draw order through [`render_order`].
//!
//! ```text
//! draw first ──► Placeholder (-3) ──► Stale (-2) ──► Current (-1) ──► 3D scene (0)
//! ```
//!
//! Stale tiles of the previous level stay drawn above the new level's
//! placeholders so the old imagery remains visible until the new textures
//! arrive and cover it.

use nalgebra::Vector3;

use crate::matrix::TileId;
use crate::resource::ResourceId;

/// Layer a tile mesh is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileLayer {
    /// Untextured quad of the current level.
    Placeholder,
    /// Any tile of a level the view has left.
    Stale,
    /// Textured tile of the current level.
    Current,
}

/// Render order of a layer. All tiles draw before the 3D scene (order 0).
pub fn render_order(layer: TileLayer) -> i32 {
    match layer {
        TileLayer::Placeholder => -3,
        TileLayer::Stale => -2,
        TileLayer::Current => -1,
    }
}

/// Surface of a tile mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Material {
    /// Flat color shown until imagery arrives.
    Placeholder,
    /// Textured with a tracked texture resource.
    Textured(ResourceId),
}

/// A tile's quad in the render group.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMesh {
    pub tile: TileId,
    pub geometry: ResourceId,
    pub material: Material,
    /// Quad center in the scene frame.
    pub position: Vector3<f64>,
    pub layer: TileLayer,
}

impl TileMesh {
    pub fn render_order(&self) -> i32 {
        render_order(self.layer)
    }

    pub fn is_textured(&self) -> bool {
        matches!(self.material, Material::Textured(_))
    }
}

/// The engine's render root.
///
/// Meshes are kept in insertion order; [`RenderGroup::draw_order`] yields
/// them sorted by layer, stable within a layer.
#[derive(Debug, Default)]
pub struct RenderGroup {
    meshes: Vec<TileMesh>,
}

impl RenderGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mesh, replacing any existing mesh for the same tile.
    pub fn add(&mut self, mesh: TileMesh) {
        match self.meshes.iter_mut().find(|m| m.tile == mesh.tile) {
            Some(existing) => *existing = mesh,
            None => self.meshes.push(mesh),
        }
    }

    /// Removes and returns the mesh of `tile`.
    pub fn remove(&mut self, tile: TileId) -> Option<TileMesh> {
        let index = self.meshes.iter().position(|m| m.tile == tile)?;
        Some(self.meshes.remove(index))
    }

    pub fn get(&self, tile: TileId) -> Option<&TileMesh> {
        self.meshes.iter().find(|m| m.tile == tile)
    }

    pub fn get_mut(&mut self, tile: TileId) -> Option<&mut TileMesh> {
        self.meshes.iter_mut().find(|m| m.tile == tile)
    }

    pub fn contains(&self, tile: TileId) -> bool {
        self.get(tile).is_some()
    }

    /// Meshes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TileMesh> {
        self.meshes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TileMesh> {
        self.meshes.iter_mut()
    }

    /// Meshes in the order they must be drawn.
    pub fn draw_order(&self) -> Vec<&TileMesh> {
        let mut meshes: Vec<&TileMesh> = self.meshes.iter().collect();
        meshes.sort_by_key(|m| m.render_order());
        meshes
    }

    /// Number of meshes in `layer`.
    pub fn count(&self, layer: TileLayer) -> usize {
        self.meshes.iter().filter(|m| m.layer == layer).count()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
    }
}
