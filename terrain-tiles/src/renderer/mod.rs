//! Tile streaming engine.
//!
//! [`TilesRenderer`] owns the per-frame state machine that keeps the render
//! group in sync with the tiles in view:
//!
//! ```text
//!              ┌──────────── window full ───────────┐
//!              │                                    ▼
//! (absent) ─create─► Downloading ◄──slot free── Queued
//!                        │  │
//!            fetch ok ───┘  └─── fail / abort ──► removed
//!                │
//!                ▼
//!            Decoding ──ok──► Loaded
//!                └────err───► DecodeFailed (placeholder stays)
//! ```
//!
//! Fetches and decodes run on the Tokio runtime and report back over a channel.
//! All state mutation happens on the caller's thread, inside [`update`],
//! [`process_completions`] or [`next_completion`]. Every report carries the
//! generation of the tile it was started for; a report whose tile has since
//! been removed (or removed and re-created) is dropped without touching the
//! render group.
//!
//! [`update`]: TilesRenderer::update
//! [`process_completions`]: TilesRenderer::process_completions
//! [`next_completion`]: TilesRenderer::next_completion

mod config;
mod wmts;

pub use config::{RendererConfig, DEFAULT_MAX_ACTIVE_TILES, DEFAULT_RESOLUTION_FACTOR};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use nalgebra::Vector3;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::fetch::{Admission, FetchError, FetchWindow, HttpClient};
use crate::matrix::{TileAddress, TileId};
use crate::protocol::{ProtocolError, RequestProtocol};
use crate::resource::{PlaneGeometry, ReleaseHook, Resource, ResourceId, ResourceTracker};
use crate::scene::{Material, RenderGroup, TileLayer, TileMesh};
use crate::scheme::{Camera, SchemeError, TileScheme};
use crate::texture::{decode_tile_image, TextureError, TextureImage};

/// Errors raised by the engine. Only configuration problems surface; fetch
/// and decode failures degrade the affected tile instead.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Invalid renderer configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Scheme(#[from] SchemeError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The engine was built outside a Tokio runtime.
    #[error("No Tokio runtime available to run tile fetches")]
    NoRuntime,
}

/// Lifecycle state of an active tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    Queued,
    Downloading,
    Decoding,
    Loaded,
    DecodeFailed,
}

/// Snapshot of engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererStats {
    pub active_tiles: usize,
    /// Tiles whose fetch is running.
    pub downloading: usize,
    /// Fetches waiting for a window slot.
    pub queued: usize,
    /// Occupied window slots, including aborted fetches still settling.
    pub in_flight: usize,
    pub decoding: usize,
    /// Textures installed over the engine's lifetime.
    pub loaded: u64,
    pub tracked_resources: usize,
    pub tile_level: Option<u32>,
}

/// Callback invoked once per installed tile texture.
pub type LoadTileCallback = Box<dyn FnMut(TileId) + Send>;

struct ActiveTile {
    generation: u64,
    state: TileState,
    geometry: ResourceId,
    texture: Option<ResourceId>,
}

struct DownloadEntry {
    token: CancellationToken,
}

struct PendingFetch {
    id: TileId,
    generation: u64,
    url: String,
    token: CancellationToken,
}

enum FetchEvent {
    /// Body received; the window slot is free and decoding has started.
    Fetched { id: TileId, generation: u64 },
    Failed {
        id: TileId,
        generation: u64,
        error: FetchError,
    },
    Decoded {
        id: TileId,
        generation: u64,
        result: Result<TextureImage, TextureError>,
    },
}

/// Streams the tiles of a [`TileScheme`] into a [`RenderGroup`].
pub struct TilesRenderer {
    scheme: Box<dyn TileScheme>,
    protocol: Box<dyn RequestProtocol>,
    client: Arc<dyn HttpClient>,
    runtime: Handle,
    config: RendererConfig,

    tile_level: Option<u32>,
    active: HashMap<TileId, ActiveTile>,
    downloads: HashMap<TileId, DownloadEntry>,
    window: FetchWindow<PendingFetch>,
    tiles_in_view: HashSet<TileId>,
    needs_level_clean: bool,
    pending_sweep: bool,
    next_generation: u64,

    group: RenderGroup,
    resources: ResourceTracker,

    events_tx: mpsc::UnboundedSender<FetchEvent>,
    events_rx: mpsc::UnboundedReceiver<FetchEvent>,
    decoding: usize,
    loaded: u64,
    on_load_tile: Option<LoadTileCallback>,
}

impl TilesRenderer {
    /// Creates an engine running its fetches on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError::InvalidConfig`] for an invalid config and
    /// [`RendererError::NoRuntime`] outside a runtime.
    pub fn new(
        scheme: Box<dyn TileScheme>,
        protocol: Box<dyn RequestProtocol>,
        client: Arc<dyn HttpClient>,
        config: RendererConfig,
    ) -> Result<Self, RendererError> {
        let runtime = Handle::try_current().map_err(|_| RendererError::NoRuntime)?;
        Self::with_runtime(scheme, protocol, client, config, runtime)
    }

    /// Creates an engine running its fetches on `runtime`.
    pub fn with_runtime(
        scheme: Box<dyn TileScheme>,
        protocol: Box<dyn RequestProtocol>,
        client: Arc<dyn HttpClient>,
        config: RendererConfig,
        runtime: Handle,
    ) -> Result<Self, RendererError> {
        config.validate()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tracing::info!(
            resolution_factor = config.resolution_factor,
            max_concurrent_fetches = config.max_concurrent_fetches,
            max_active_tiles = config.max_active_tiles,
            "Tiles renderer created"
        );

        Ok(Self {
            scheme,
            protocol,
            client,
            runtime,
            config,
            tile_level: None,
            active: HashMap::new(),
            downloads: HashMap::new(),
            window: FetchWindow::new(config.max_concurrent_fetches),
            tiles_in_view: HashSet::new(),
            needs_level_clean: false,
            pending_sweep: false,
            next_generation: 0,
            group: RenderGroup::new(),
            resources: ResourceTracker::new(),
            events_tx,
            events_rx,
            decoding: 0,
            loaded: 0,
            on_load_tile: None,
        })
    }

    /// Registers the callback fired after each tile texture is installed.
    pub fn set_on_load_tile(&mut self, callback: impl FnMut(TileId) + Send + 'static) {
        self.on_load_tile = Some(Box::new(callback));
    }

    /// Installs a hook called for every released geometry and texture.
    pub fn set_release_hook(&mut self, hook: ReleaseHook) {
        self.resources.set_release_hook(hook);
    }

    /// The render root to draw beneath the 3D scene.
    pub fn group(&self) -> &RenderGroup {
        &self.group
    }

    pub fn resources(&self) -> &ResourceTracker {
        &self.resources
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Level of the most recent non-empty view.
    pub fn tile_level(&self) -> Option<u32> {
        self.tile_level
    }

    pub fn tile_state(&self, id: TileId) -> Option<TileState> {
        self.active.get(&id).map(|tile| tile.state)
    }

    pub fn stats(&self) -> RendererStats {
        RendererStats {
            active_tiles: self.active.len(),
            downloading: self
                .active
                .values()
                .filter(|tile| tile.state == TileState::Downloading)
                .count(),
            queued: self.window.queued(),
            in_flight: self.window.in_flight(),
            decoding: self.decoding,
            loaded: self.loaded,
            tracked_resources: self.resources.len(),
            tile_level: self.tile_level,
        }
    }

    /// True when nothing is queued, downloading, settling or decoding.
    pub fn is_settled(&self) -> bool {
        self.downloads.is_empty() && self.window.is_idle() && self.decoding == 0
    }

    /// Advances the engine for one frame.
    ///
    /// Applies finished fetches, selects the tiles in view, cancels downloads
    /// for tiles missing from this and the previous selection, creates the
    /// missing tiles, evicts
    /// excess tiles and, once all downloads have settled, removes tiles of
    /// previous levels.
    ///
    /// # Errors
    ///
    /// Only selector configuration errors are returned.
    pub fn update(&mut self, scene_center: &Vector3<f64>, camera: &Camera) -> Result<(), RendererError> {
        self.process_completions();

        let tiles = self
            .scheme
            .tiles_in_view(camera, self.config.resolution_factor, scene_center)?;
        let previous_view = std::mem::replace(
            &mut self.tiles_in_view,
            tiles.iter().map(TileAddress::id).collect(),
        );

        match tiles.first().map(TileAddress::level) {
            Some(level) if self.tile_level != Some(level) => self.change_level(level),
            _ => {
                // A download is cancelled only after missing two selections in a row
                if self.pending_sweep {
                    self.cancel_out_of_view(&previous_view);
                }
                self.pending_sweep = true;
            }
        }

        for address in &tiles {
            if !address.in_bounds() {
                continue;
            }
            let id = address.id();
            if self.active.contains_key(&id) {
                self.refresh_layer(id);
            } else {
                self.create_tile(address, scene_center);
            }
        }

        self.evict_excess();

        if self.needs_level_clean && self.is_settled() {
            self.clean_tile_levels();
        }

        Ok(())
    }

    /// Applies every fetch and decode result that has arrived, without waiting.
    ///
    /// Returns the number of results applied.
    pub fn process_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    /// Waits for the next fetch or decode result and applies it.
    ///
    /// Returns `false` immediately when nothing is outstanding.
    pub async fn next_completion(&mut self) -> bool {
        if self.window.in_flight() == 0 && self.decoding == 0 {
            return match self.events_rx.try_recv() {
                Ok(event) => {
                    self.handle_event(event);
                    true
                }
                Err(_) => false,
            };
        }

        match self.events_rx.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Aborts all downloads, releases every tracked resource and clears the
    /// render group. Safe to call repeatedly; results of fetches still
    /// settling are ignored.
    pub fn dispose(&mut self) {
        let aborted = self.downloads.len();
        for (_, entry) in self.downloads.drain() {
            entry.token.cancel();
        }
        self.window.drain_queue();
        self.active.clear();
        self.tiles_in_view.clear();
        self.resources.dispose();
        self.group.clear();
        self.tile_level = None;
        self.needs_level_clean = false;
        self.pending_sweep = false;

        tracing::info!(aborted, "Tiles renderer disposed");
    }

    // =========================================================================
    // Tile lifecycle
    // =========================================================================

    fn create_tile(&mut self, address: &TileAddress, scene_center: &Vector3<f64>) {
        let id = address.id();
        let matrix = address.tile_matrix();

        let geometry = self.resources.track(Resource::Geometry(PlaneGeometry {
            width: matrix.tile_span_x,
            height: matrix.tile_span_y,
        }));
        self.group.add(TileMesh {
            tile: id,
            geometry,
            material: Material::Placeholder,
            position: address.center_position(scene_center),
            layer: TileLayer::Placeholder,
        });

        let url = self.protocol.request_url(address);
        self.next_generation += 1;
        let generation = self.next_generation;
        let token = CancellationToken::new();
        self.downloads.insert(
            id,
            DownloadEntry {
                token: token.clone(),
            },
        );

        let job = PendingFetch {
            id,
            generation,
            url,
            token,
        };
        let state = match self.window.submit(job) {
            Admission::Start(job) => {
                self.spawn_fetch(job);
                TileState::Downloading
            }
            Admission::Queued => TileState::Queued,
        };

        tracing::trace!(tile = %id, ?state, "Created tile");
        self.active.insert(
            id,
            ActiveTile {
                generation,
                state,
                geometry,
                texture: None,
            },
        );
    }

    fn spawn_fetch(&self, job: PendingFetch) {
        let client = Arc::clone(&self.client);
        let events = self.events_tx.clone();
        let PendingFetch {
            id,
            generation,
            url,
            token,
        } = job;

        self.runtime.spawn(async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(FetchError::Aborted),
                result = client.get(&url) => result,
            };

            let body = match result {
                Ok(body) => body,
                Err(error) => {
                    let _ = events.send(FetchEvent::Failed {
                        id,
                        generation,
                        error,
                    });
                    return;
                }
            };
            let _ = events.send(FetchEvent::Fetched { id, generation });

            // Decoding is not cancellable; a stale result is dropped on receipt
            let result = match tokio::task::spawn_blocking(move || decode_tile_image(&body)).await {
                Ok(result) => result,
                Err(e) => Err(TextureError::TaskFailed(e.to_string())),
            };
            let _ = events.send(FetchEvent::Decoded {
                id,
                generation,
                result,
            });
        });
    }

    fn handle_event(&mut self, event: FetchEvent) {
        match event {
            FetchEvent::Fetched { id, generation } => {
                self.decoding += 1;
                self.release_slot();
                if self.is_current(id, generation) {
                    self.downloads.remove(&id);
                    self.set_state(id, TileState::Decoding);
                }
            }
            FetchEvent::Failed {
                id,
                generation,
                error,
            } => {
                self.release_slot();
                if !self.is_current(id, generation) {
                    return;
                }
                if error.is_abort() {
                    tracing::trace!(tile = %id, "Tile fetch aborted");
                } else {
                    tracing::debug!(tile = %id, error = %error, "Tile fetch failed, dropping tile");
                }
                self.remove_tile(id);
            }
            FetchEvent::Decoded {
                id,
                generation,
                result,
            } => {
                self.decoding = self.decoding.saturating_sub(1);
                if !self.is_current(id, generation) {
                    tracing::trace!(tile = %id, "Discarding texture for removed tile");
                    return;
                }
                match result {
                    Ok(texture) => self.install_texture(id, texture),
                    Err(error) => {
                        tracing::warn!(tile = %id, error = %error, "Tile texture decode failed, keeping placeholder");
                        self.set_state(id, TileState::DecodeFailed);
                    }
                }
            }
        }
    }

    /// Frees a window slot and starts the next queued fetch, if any.
    fn release_slot(&mut self) {
        while let Some(job) = self.window.release() {
            if self.is_current(job.id, job.generation) {
                self.set_state(job.id, TileState::Downloading);
                self.spawn_fetch(job);
                return;
            }
            // Stale job: the next release hands its slot on
        }
    }

    fn install_texture(&mut self, id: TileId, texture: TextureImage) {
        let texture = self.resources.track(Resource::Texture(texture));
        let layer = if Some(id.level) == self.tile_level {
            TileLayer::Current
        } else {
            TileLayer::Stale
        };

        if let Some(mesh) = self.group.get_mut(id) {
            mesh.material = Material::Textured(texture);
            mesh.layer = layer;
        }
        if let Some(tile) = self.active.get_mut(&id) {
            tile.texture = Some(texture);
            tile.state = TileState::Loaded;
        }
        self.loaded += 1;
        tracing::trace!(tile = %id, texture = %texture, "Installed tile texture");

        if let Some(callback) = self.on_load_tile.as_mut() {
            callback(id);
        }
    }

    /// Drops a tile: cancels its fetch, releases its resources and removes its
    /// mesh. Safe to call for unknown tiles.
    fn remove_tile(&mut self, id: TileId) {
        if let Some(entry) = self.downloads.remove(&id) {
            entry.token.cancel();
        }
        self.window.remove_queued(|job| job.id == id);

        if let Some(tile) = self.active.remove(&id) {
            self.resources.untrack(tile.geometry);
            if let Some(texture) = tile.texture {
                self.resources.untrack(texture);
            }
        }
        self.group.remove(id);
    }

    fn is_current(&self, id: TileId, generation: u64) -> bool {
        self.active
            .get(&id)
            .is_some_and(|tile| tile.generation == generation)
    }

    fn set_state(&mut self, id: TileId, state: TileState) {
        if let Some(tile) = self.active.get_mut(&id) {
            tile.state = state;
        }
    }

    /// Restores a stale tile that belongs to the current level again.
    fn refresh_layer(&mut self, id: TileId) {
        if Some(id.level) != self.tile_level {
            return;
        }
        if let Some(mesh) = self.group.get_mut(id) {
            if mesh.layer == TileLayer::Stale {
                mesh.layer = if mesh.is_textured() {
                    TileLayer::Current
                } else {
                    TileLayer::Placeholder
                };
            }
        }
    }

    // =========================================================================
    // Level changes, cancellation and eviction
    // =========================================================================

    fn change_level(&mut self, level: u32) {
        tracing::debug!(from = ?self.tile_level, to = level, "Tile level changed");

        self.abort_downloads();
        for mesh in self.group.iter_mut() {
            if mesh.tile.level != level {
                mesh.layer = TileLayer::Stale;
            }
        }
        self.needs_level_clean = true;
        self.pending_sweep = false;
        self.tile_level = Some(level);
    }

    fn abort_downloads(&mut self) {
        let outstanding: Vec<TileId> = self.downloads.keys().copied().collect();
        if !outstanding.is_empty() {
            tracing::debug!(count = outstanding.len(), "Aborting outstanding downloads");
        }
        for id in outstanding {
            self.remove_tile(id);
        }
        self.window.drain_queue();
    }

    /// Cancels downloads for tiles absent from both `previous_view` and the
    /// current one.
    fn cancel_out_of_view(&mut self, previous_view: &HashSet<TileId>) {
        let gone: Vec<TileId> = self
            .downloads
            .keys()
            .filter(|id| !self.tiles_in_view.contains(*id) && !previous_view.contains(*id))
            .copied()
            .collect();
        for id in gone {
            tracing::trace!(tile = %id, "Cancelling download for tile out of view");
            self.remove_tile(id);
        }
    }

    /// Removes the oldest tiles outside the view while over the ceiling.
    fn evict_excess(&mut self) {
        let excess = self.active.len().saturating_sub(self.config.max_active_tiles);
        if excess == 0 {
            return;
        }

        let mut candidates: Vec<(u64, TileId)> = self
            .active
            .iter()
            .filter(|(id, _)| !self.tiles_in_view.contains(*id))
            .map(|(id, tile)| (tile.generation, *id))
            .collect();
        candidates.sort_unstable();

        let evicted = excess.min(candidates.len());
        for (_, id) in candidates.into_iter().take(excess) {
            self.remove_tile(id);
        }
        tracing::debug!(evicted, active = self.active.len(), "Evicted tiles out of view");
    }

    fn clean_tile_levels(&mut self) {
        self.needs_level_clean = false;
        let Some(level) = self.tile_level else {
            return;
        };

        let old: Vec<TileId> = self
            .active
            .keys()
            .filter(|id| id.level != level)
            .copied()
            .collect();
        tracing::debug!(level, removed = old.len(), "Cleaned up tiles of previous levels");
        for id in old {
            self.remove_tile(id);
        }
    }
}

impl Drop for TilesRenderer {
    fn drop(&mut self) {
        for entry in self.downloads.values() {
            entry.token.cancel();
        }
    }
}
