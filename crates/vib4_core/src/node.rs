//! Scene graph node
//!
//! Nodes live in the [`Scene`](crate::Scene)'s arena and are addressed by
//! generational [`NodeKey`]s. A node owns its local transform state and two
//! cached matrices (local, world) guarded by dirty flags. All transform and
//! structural mutation goes through `Scene` methods so dirty propagation is
//! enforced at a single point; the fields here stay consistent because
//! nothing else can touch them.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use bitflags::bitflags;
use slotmap::new_key_type;
use vib4_math::Affine4;
use crate::Transform4;

new_key_type! {
    /// Generational key addressing a node in a scene's arena
    pub struct NodeKey;
}

/// Stable per-scene node identifier (assigned sequentially, 0 never used)
pub type NodeId = u64;

bitflags! {
    /// Which cached matrices are stale and need recomputing
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct NodeDirty: u8 {
        /// The cached local matrix is stale
        const LOCAL = 1 << 0;
        /// The cached world matrix is stale
        const WORLD = 1 << 1;
    }
}

/// A node in the scene hierarchy
///
/// Each node has:
/// - A stable id and a display name
/// - An optional parent and an ordered list of children (arena keys)
/// - Local transform state and cached local/world matrices
/// - Visibility and enabled flags
/// - A tag set, a layer bitmask, and a type-erased user-data store
pub struct Node {
    id: NodeId,
    /// Display name (not required to be unique)
    pub name: String,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
    pub(crate) transform: Transform4,
    pub(crate) local: Affine4,
    pub(crate) world: Affine4,
    pub(crate) dirty: NodeDirty,
    /// Whether this node (and its subtree) is drawn
    pub visible: bool,
    /// Whether this node participates in updates
    pub enabled: bool,
    tags: HashSet<String>,
    /// Layer bitmask for render/query filtering
    pub layers: u32,
    user_data: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent: None,
            children: Vec::new(),
            transform: Transform4::identity(),
            local: Affine4::IDENTITY,
            world: Affine4::IDENTITY,
            // New nodes start fully dirty so the first read computes everything
            dirty: NodeDirty::LOCAL | NodeDirty::WORLD,
            visible: true,
            enabled: true,
            tags: HashSet::new(),
            layers: 1,
            user_data: HashMap::new(),
        }
    }

    /// Stable id of this node
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Parent key, if attached
    #[inline]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Child keys in attach order
    #[inline]
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Local transform state (mutate through `Scene` setters)
    #[inline]
    pub fn transform(&self) -> &Transform4 {
        &self.transform
    }

    /// True if the cached world matrix is stale
    #[inline]
    pub fn world_dirty(&self) -> bool {
        self.dirty.contains(NodeDirty::WORLD)
    }

    /// True if the cached local matrix is stale
    #[inline]
    pub fn local_dirty(&self) -> bool {
        self.dirty.contains(NodeDirty::LOCAL)
    }

    // --- Tags ---

    /// Add a tag; returns false if it was already present
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        self.tags.insert(tag.into())
    }

    /// Remove a tag; returns false if it was not present
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag)
    }

    /// Check for a tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// All tags on this node
    pub fn tags(&self) -> &HashSet<String> {
        &self.tags
    }

    // --- Layers ---

    /// Test this node's layer mask against another mask
    #[inline]
    pub fn on_layers(&self, mask: u32) -> bool {
        self.layers & mask != 0
    }

    // --- User data ---

    /// Attach an arbitrary value under a key, replacing any previous value
    pub fn set_user_data<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.user_data.insert(key.into(), Box::new(value));
    }

    /// Fetch user data by key, downcast to the requested type.
    /// Returns `None` if the key is missing or holds a different type.
    pub fn user_data<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.user_data.get(key)?.downcast_ref::<T>()
    }

    /// Remove user data by key; returns false if the key was absent
    pub fn remove_user_data(&mut self, key: &str) -> bool {
        self.user_data.remove(key).is_some()
    }

    // --- Cache maintenance (scene-internal) ---

    /// Mark the local matrix stale; implies the world matrix is stale too
    pub(crate) fn mark_local_dirty(&mut self) {
        self.dirty |= NodeDirty::LOCAL | NodeDirty::WORLD;
    }

    /// Mark only the world matrix stale (used for the downward sweep)
    pub(crate) fn mark_world_dirty(&mut self) {
        self.dirty |= NodeDirty::WORLD;
    }
}
