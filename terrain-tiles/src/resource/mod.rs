//! Tracking of GPU resources allocated on behalf of tiles.
//!
//! Every geometry and texture the streaming engine creates is registered here
//! before it is referenced by a mesh. The tracker is the single owner of
//! disposal: a resource is released exactly once, either when its tile is
//! removed ([`ResourceTracker::untrack`]) or when the whole engine is torn down
//! ([`ResourceTracker::dispose`]).
//!
//! Rendering backends that hold real GPU buffers install a release hook with
//! [`ResourceTracker::set_release_hook`] and free the backing allocation there.

use std::collections::HashMap;
use std::fmt;

use crate::texture::TextureImage;

/// Handle to a tracked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Returns the raw numeric value of the handle.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

/// A flat quad spanning one tile, in CRS units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneGeometry {
    pub width: f64,
    pub height: f64,
}

/// Kind of a tracked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Geometry,
    Texture,
}

/// A disposable GPU-side resource.
#[derive(Debug, Clone)]
pub enum Resource {
    Geometry(PlaneGeometry),
    Texture(TextureImage),
}

impl Resource {
    /// Returns the kind of this resource.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Geometry(_) => ResourceKind::Geometry,
            Resource::Texture(_) => ResourceKind::Texture,
        }
    }

    /// Approximate size of the resource in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            // 4 vertices × (position + normal + uv) in f32 plus 6 u16 indices
            Resource::Geometry(_) => 4 * 8 * 4 + 6 * 2,
            Resource::Texture(texture) => texture.rgba.len(),
        }
    }
}

/// Callback invoked once for each released resource.
pub type ReleaseHook = Box<dyn FnMut(ResourceId, Resource) + Send>;

/// Registry of live resources keyed by [`ResourceId`].
pub struct ResourceTracker {
    next_id: u64,
    resources: HashMap<ResourceId, Resource>,
    released: u64,
    on_release: Option<ReleaseHook>,
}

impl ResourceTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            resources: HashMap::new(),
            released: 0,
            on_release: None,
        }
    }

    /// Installs a hook that is called for every released resource.
    pub fn set_release_hook(&mut self, hook: ReleaseHook) {
        self.on_release = Some(hook);
    }

    /// Registers a resource and returns its handle.
    pub fn track(&mut self, resource: Resource) -> ResourceId {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        self.resources.insert(id, resource);
        id
    }

    /// Returns the resource behind a handle, if it is still tracked.
    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(&id)
    }

    /// Returns true if the handle refers to a live resource.
    pub fn contains(&self, id: ResourceId) -> bool {
        self.resources.contains_key(&id)
    }

    /// Releases one resource.
    ///
    /// Returns `false` if the handle was unknown or already released; releasing
    /// twice is harmless.
    pub fn untrack(&mut self, id: ResourceId) -> bool {
        match self.resources.remove(&id) {
            Some(resource) => {
                self.release(id, resource);
                true
            }
            None => false,
        }
    }

    /// Releases every tracked resource. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        let mut drained: Vec<_> = self.resources.drain().collect();
        drained.sort_by_key(|(id, _)| *id);
        let count = drained.len();
        for (id, resource) in drained {
            self.release(id, resource);
        }
        if count > 0 {
            tracing::debug!(released = count, "Disposed all tracked resources");
        }
    }

    fn release(&mut self, id: ResourceId, resource: Resource) {
        self.released += 1;
        tracing::trace!(resource = %id, kind = ?resource.kind(), "Released resource");
        if let Some(hook) = self.on_release.as_mut() {
            hook(id, resource);
        }
    }

    /// Number of live resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Number of live resources of one kind.
    pub fn count(&self, kind: ResourceKind) -> usize {
        self.resources.values().filter(|r| r.kind() == kind).count()
    }

    /// Approximate total bytes held by live resources.
    pub fn total_bytes(&self) -> usize {
        self.resources.values().map(Resource::size_bytes).sum()
    }

    /// Total number of resources released over the tracker's lifetime.
    pub fn released_total(&self) -> u64 {
        self.released
    }
}

impl Default for ResourceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResourceTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceTracker")
            .field("live", &self.resources.len())
            .field("released", &self.released)
            .field("has_release_hook", &self.on_release.is_some())
            .finish()
    }
}
