//! Terrain Tiles - level-of-detail streaming for WMTS raster basemaps
//!
//! This library streams tiles of a planar WMTS tile pyramid into a render group
//! that sits underneath a 3D scene (typically a building tileset). Each frame the
//! consumer calls [`TilesRenderer::update`] with the current camera; the engine
//! selects the matrix level and tile set in view, creates placeholder meshes,
//! fetches imagery with a bounded concurrency window, and swaps in textures as
//! they decode.
//!
//! # Architecture
//!
//! ```text
//! consumer ──update(scene_center, camera)──► TilesRenderer
//!                                              │
//!                  ┌───────────────────────────┼──────────────────────────┐
//!                  ▼                           ▼                          ▼
//!            TileScheme                 RequestProtocol              FetchWindow
//!   (level + tiles in view)        (tile address → URL)      (semaphore + FIFO queue)
//!                                                                         │
//!                                                                         ▼
//!                                                         HttpClient ─► decode_tile_image
//!                                                                         │
//!                  RenderGroup ◄── TileMesh ◄── ResourceTracker ◄─────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use terrain_tiles::matrix::TileMatrixSet;
//! use terrain_tiles::protocol::WmtsOptions;
//! use terrain_tiles::renderer::{RendererConfig, TilesRenderer};
//! use terrain_tiles::fetch::ReqwestClient;
//!
//! let options = WmtsOptions::new("https://service.pdok.nl/brt/achtergrondkaart/wmts/v2_0?", "grijs");
//! let client = Arc::new(ReqwestClient::new()?);
//! let mut renderer = TilesRenderer::wmts(&options, TileMatrixSet::rd_new(), client, RendererConfig::default())?;
//!
//! // every animation frame
//! renderer.update(&scene_center, &camera)?;
//! for mesh in renderer.group().draw_order() { /* draw */ }
//! ```

pub mod buildings;
pub mod config;
pub mod coord;
pub mod fetch;
pub mod logging;
pub mod matrix;
pub mod protocol;
pub mod renderer;
pub mod resource;
pub mod scene;
pub mod scheme;
pub mod texture;
pub mod tileset;

pub use matrix::{TileAddress, TileId, TileMatrixLevel, TileMatrixSet};
pub use renderer::{RendererConfig, RendererError, RendererStats, TilesRenderer};
pub use scheme::{Camera, TileScheme, WmtsTileScheme};
