//! Scene: arena-backed node hierarchy with cached world transforms
//!
//! The scene owns every node in a slotmap arena and keeps an id index over
//! the nodes attached under its root. Structural changes requested while
//! `update` is running are buffered and applied after the callback phase, so
//! callbacks can add and remove nodes without invalidating the traversal
//! they are called from.
//!
//! Scenes round-trip through RON documents ([`SceneDocument`] /
//! [`NodeDocument`]); documents are id-independent, ids are reassigned on
//! import.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Serialize, Deserialize};
use slotmap::SlotMap;
use vib4_math::{Affine4, Rotor4, Vec4};

use crate::node::{Node, NodeDirty, NodeId, NodeKey};
use crate::Transform4;

/// Traversal orders for [`Scene::traverse`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraverseOrder {
    /// Parent before children, depth-first
    PreOrder,
    /// Children before parent, depth-first
    PostOrder,
    /// Level by level from the start node
    BreadthFirst,
}

/// A raycast result: node and distance along the ray
#[derive(Clone, Copy, Debug)]
pub struct RaycastHit {
    pub node: NodeKey,
    pub distance: f32,
}

/// Structural change buffered while an update is in progress
enum PendingOp {
    Attach { child: NodeKey, parent: NodeKey },
    Detach { node: NodeKey },
    Remove { node: NodeKey, deep: bool },
}

type UpdateCallback = Box<dyn FnMut(&mut Scene, f32)>;

/// The scene graph
///
/// Owns a root node for its entire life. `clear` removes everything below
/// the root but keeps the root itself.
pub struct Scene {
    /// Scene name (for display/debugging)
    pub name: String,
    nodes: SlotMap<NodeKey, Node>,
    root: NodeKey,
    /// Id index over root plus every attached descendant
    index: HashMap<NodeId, NodeKey>,
    next_id: NodeId,
    in_update: bool,
    pending: Vec<PendingOp>,
    update_callbacks: Vec<UpdateCallback>,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("node_count", &self.index.len())
            .field("next_id", &self.next_id)
            .field("in_update", &self.in_update)
            .field("pending", &self.pending.len())
            .field("update_callbacks", &self.update_callbacks.len())
            .finish()
    }
}

impl Scene {
    /// Create a scene with a fresh root node
    pub fn new(name: impl Into<String>) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new(1, "root"));
        let mut index = HashMap::new();
        index.insert(1, root);

        Self {
            name: name.into(),
            nodes,
            root,
            index,
            next_id: 2,
            in_update: false,
            pending: Vec::new(),
            update_callbacks: Vec::new(),
        }
    }

    /// Key of the root node
    #[inline]
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Borrow a node
    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Borrow a node mutably (transform state stays scene-managed; this is
    /// for name, flags, tags, layers, and user data)
    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    /// Look up an attached node by its stable id
    pub fn key_of(&self, id: NodeId) -> Option<NodeKey> {
        self.index.get(&id).copied()
    }

    /// Whether a node with this id is attached under the root
    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of attached nodes, excluding the root
    pub fn node_count(&self) -> usize {
        self.index.len() - 1
    }

    // --- Construction and structure ---

    /// Create a standalone node (no parent, not in the id index)
    pub fn create_node(&mut self, name: impl Into<String>) -> NodeKey {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(Node::new(id, name))
    }

    /// Create a node and attach it under the root.
    ///
    /// Inside an update the attach is deferred, so the node will not show up
    /// in `contains` until `update` returns.
    pub fn add(&mut self, name: impl Into<String>) -> NodeKey {
        let key = self.create_node(name);
        // Attaching to the root cannot fail validation
        let _ = self.attach(key, self.root);
        key
    }

    /// Attach `child` under `parent`, detaching it from any previous parent
    /// first (atomic reparent).
    ///
    /// Rejected before any mutation if `child == parent` or if `parent` is a
    /// descendant of `child` (the tree must stay a tree). Deferred while an
    /// update is in progress.
    pub fn attach(&mut self, child: NodeKey, parent: NodeKey) -> Result<(), SceneError> {
        self.validate_attach(child, parent)?;
        if self.in_update {
            self.pending.push(PendingOp::Attach { child, parent });
            return Ok(());
        }
        self.apply_attach(child, parent);
        Ok(())
    }

    /// Detach a node from its parent, leaving it (and its subtree) standalone.
    /// Deferred while an update is in progress.
    pub fn detach(&mut self, node: NodeKey) -> Result<(), SceneError> {
        if !self.nodes.contains_key(node) {
            return Err(SceneError::NodeNotFound);
        }
        if node == self.root {
            return Err(SceneError::RootImmovable);
        }
        if self.in_update {
            self.pending.push(PendingOp::Detach { node });
            return Ok(());
        }
        self.detach_internal(node);
        self.mark_world_dirty_from(node);
        Ok(())
    }

    /// Remove a node, orphaning its children (they become standalone nodes).
    /// Returns false for unknown keys and for the root. Deferred while an
    /// update is in progress.
    pub fn remove_node(&mut self, node: NodeKey) -> bool {
        if node == self.root || !self.nodes.contains_key(node) {
            return false;
        }
        if self.in_update {
            self.pending.push(PendingOp::Remove { node, deep: false });
            return true;
        }
        self.apply_remove(node, false);
        true
    }

    /// Remove a node and its entire subtree. Returns false for unknown keys
    /// and for the root. Deferred while an update is in progress.
    pub fn remove_subtree(&mut self, node: NodeKey) -> bool {
        if node == self.root || !self.nodes.contains_key(node) {
            return false;
        }
        if self.in_update {
            self.pending.push(PendingOp::Remove { node, deep: true });
            return true;
        }
        self.apply_remove(node, true);
        true
    }

    /// Remove every child of the root, keeping the root itself
    pub fn clear(&mut self) {
        let children: Vec<NodeKey> = self.nodes[self.root].children.clone();
        for child in children {
            self.remove_subtree(child);
        }
    }

    fn validate_attach(&self, child: NodeKey, parent: NodeKey) -> Result<(), SceneError> {
        let child_node = self.nodes.get(child).ok_or(SceneError::NodeNotFound)?;
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::NodeNotFound);
        }
        if child == self.root {
            return Err(SceneError::RootImmovable);
        }
        if child == parent {
            return Err(SceneError::AttachToSelf(child_node.id()));
        }
        // Walk the candidate parent's ancestor chain; finding `child` there
        // means the attach would close a cycle.
        let mut cursor = self.nodes[parent].parent;
        while let Some(k) = cursor {
            if k == child {
                return Err(SceneError::AttachWouldCycle(child_node.id()));
            }
            cursor = self.nodes[k].parent;
        }
        Ok(())
    }

    fn apply_attach(&mut self, child: NodeKey, parent: NodeKey) {
        self.detach_internal(child);
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
        if self.is_attached(parent) {
            self.register_subtree(child);
        }
        self.mark_world_dirty_from(child);
    }

    fn detach_internal(&mut self, child: NodeKey) {
        let Some(parent) = self.nodes[child].parent else {
            return;
        };
        let was_attached = self.is_attached(child);
        self.nodes[parent].children.retain(|&k| k != child);
        self.nodes[child].parent = None;
        if was_attached {
            self.unregister_subtree(child);
        }
    }

    fn apply_remove(&mut self, node: NodeKey, deep: bool) {
        if node == self.root || !self.nodes.contains_key(node) {
            return;
        }
        self.detach_internal(node);
        if deep {
            for key in self.collect_subtree(node) {
                if let Some(n) = self.nodes.remove(key) {
                    self.index.remove(&n.id());
                }
            }
        } else {
            let children: Vec<NodeKey> = self.nodes[node].children.clone();
            for child in children {
                self.nodes[child].parent = None;
                self.mark_world_dirty_from(child);
            }
            self.nodes[node].children.clear();
            if let Some(n) = self.nodes.remove(node) {
                self.index.remove(&n.id());
            }
        }
    }

    fn is_attached(&self, key: NodeKey) -> bool {
        self.nodes
            .get(key)
            .map(|n| self.index.get(&n.id()) == Some(&key))
            .unwrap_or(false)
    }

    fn register_subtree(&mut self, start: NodeKey) {
        for key in self.collect_subtree(start) {
            let id = self.nodes[key].id();
            self.index.insert(id, key);
        }
    }

    fn unregister_subtree(&mut self, start: NodeKey) {
        for key in self.collect_subtree(start) {
            let id = self.nodes[key].id();
            self.index.remove(&id);
        }
    }

    fn collect_subtree(&self, start: NodeKey) -> Vec<NodeKey> {
        let mut keys = Vec::new();
        let mut stack = vec![start];
        while let Some(key) = stack.pop() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            keys.push(key);
            stack.extend(node.children.iter().copied());
        }
        keys
    }

    // --- Transforms ---

    /// Replace a node's local transform and invalidate cached world matrices
    /// for the node and its whole subtree.
    pub fn set_local_transform(&mut self, key: NodeKey, transform: Transform4) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(key).ok_or(SceneError::NodeNotFound)?;
        node.transform = transform;
        node.mark_local_dirty();
        self.mark_world_dirty_from(key);
        Ok(())
    }

    /// Set a node's local position
    pub fn set_position(&mut self, key: NodeKey, position: Vec4) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(key).ok_or(SceneError::NodeNotFound)?;
        node.transform.position = position;
        node.mark_local_dirty();
        self.mark_world_dirty_from(key);
        Ok(())
    }

    /// Set a node's local rotation
    pub fn set_rotation(&mut self, key: NodeKey, rotation: Rotor4) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(key).ok_or(SceneError::NodeNotFound)?;
        node.transform.rotation = rotation;
        node.mark_local_dirty();
        self.mark_world_dirty_from(key);
        Ok(())
    }

    /// Set a node's per-axis local scale
    pub fn set_scale(&mut self, key: NodeKey, scale: Vec4) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(key).ok_or(SceneError::NodeNotFound)?;
        node.transform.scale = scale;
        node.mark_local_dirty();
        self.mark_world_dirty_from(key);
        Ok(())
    }

    /// Translate a node by an offset
    pub fn translate(&mut self, key: NodeKey, offset: Vec4) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(key).ok_or(SceneError::NodeNotFound)?;
        node.transform.position += offset;
        node.mark_local_dirty();
        self.mark_world_dirty_from(key);
        Ok(())
    }

    /// Mark the world matrix stale for `key` and every descendant.
    ///
    /// Stops descending at nodes that are already marked: a dirty node's
    /// subtree is already dirty, because this sweep is the only way the flag
    /// is ever set.
    fn mark_world_dirty_from(&mut self, key: NodeKey) {
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        node.mark_world_dirty();
        let mut stack: Vec<NodeKey> = node.children.clone();
        while let Some(k) = stack.pop() {
            let n = &mut self.nodes[k];
            if n.world_dirty() {
                continue;
            }
            n.mark_world_dirty();
            stack.extend(n.children.iter().copied());
        }
    }

    /// The node's local matrix, recomputed from transform state if stale
    pub fn local_matrix(&mut self, key: NodeKey) -> Result<Affine4, SceneError> {
        if !self.nodes.contains_key(key) {
            return Err(SceneError::NodeNotFound);
        }
        Ok(self.refresh_local(key))
    }

    /// The node's world matrix: `parent_world * local`, memoized.
    ///
    /// Recomputes the stale part of the ancestor chain top-down, so a parent
    /// is always resolved before its children.
    pub fn world_matrix(&mut self, key: NodeKey) -> Result<Affine4, SceneError> {
        let node = self.nodes.get(key).ok_or(SceneError::NodeNotFound)?;
        if !node.world_dirty() {
            return Ok(node.world);
        }

        // Collect the stale chain upward until a clean ancestor (or a root
        // of the subtree) supplies its cached world.
        let mut chain = Vec::new();
        let mut parent_world = Affine4::IDENTITY;
        let mut cursor = Some(key);
        while let Some(k) = cursor {
            let n = &self.nodes[k];
            if n.world_dirty() {
                chain.push(k);
                cursor = n.parent;
            } else {
                parent_world = n.world;
                break;
            }
        }

        for &k in chain.iter().rev() {
            let local = self.refresh_local(k);
            let world = parent_world.mul(&local);
            let n = &mut self.nodes[k];
            n.world = world;
            n.dirty.remove(NodeDirty::WORLD);
            parent_world = world;
        }

        Ok(parent_world)
    }

    /// The node's world-space position (translation of its world matrix)
    pub fn world_position(&mut self, key: NodeKey) -> Result<Vec4, SceneError> {
        Ok(self.world_matrix(key)?.translation)
    }

    fn refresh_local(&mut self, key: NodeKey) -> Affine4 {
        let node = &mut self.nodes[key];
        if node.local_dirty() {
            node.local = node.transform.to_affine();
            node.dirty.remove(NodeDirty::LOCAL);
        }
        node.local
    }

    // --- Update ---

    /// Register a callback invoked during every `update`
    pub fn on_update<F>(&mut self, callback: F)
    where
        F: FnMut(&mut Scene, f32) + 'static,
    {
        self.update_callbacks.push(Box::new(callback));
    }

    /// Run one update pass: callbacks, then deferred structural changes,
    /// then world matrix revalidation over the attached tree.
    pub fn update(&mut self, dt: f32) {
        if self.in_update {
            log::warn!("Scene::update called re-entrantly; ignoring");
            return;
        }
        self.in_update = true;

        let mut callbacks = std::mem::take(&mut self.update_callbacks);
        for callback in callbacks.iter_mut() {
            callback(self, dt);
        }
        // Callbacks registered during the pass land behind the existing ones
        let added = std::mem::replace(&mut self.update_callbacks, callbacks);
        self.update_callbacks.extend(added);

        self.in_update = false;
        self.flush_pending();
        self.refresh_world_matrices();
    }

    fn flush_pending(&mut self) {
        let ops = std::mem::take(&mut self.pending);
        for op in ops {
            match op {
                PendingOp::Attach { child, parent } => match self.validate_attach(child, parent) {
                    Ok(()) => self.apply_attach(child, parent),
                    Err(err) => log::warn!("Dropping deferred attach: {}", err),
                },
                PendingOp::Detach { node } => {
                    if self.nodes.contains_key(node) {
                        self.detach_internal(node);
                        self.mark_world_dirty_from(node);
                    }
                }
                PendingOp::Remove { node, deep } => self.apply_remove(node, deep),
            }
        }
    }

    /// Recompute every stale world matrix under the root, parents first
    fn refresh_world_matrices(&mut self) {
        let mut stack = vec![(self.root, Affine4::IDENTITY)];
        while let Some((key, parent_world)) = stack.pop() {
            let world = if self.nodes[key].world_dirty() {
                let local = self.refresh_local(key);
                let world = parent_world.mul(&local);
                let node = &mut self.nodes[key];
                node.world = world;
                node.dirty.remove(NodeDirty::WORLD);
                world
            } else {
                self.nodes[key].world
            };
            let children: Vec<NodeKey> = self.nodes[key].children.clone();
            for child in children {
                stack.push((child, world));
            }
        }
    }

    // --- Traversal and lookup ---

    /// Visit the attached tree from the root
    pub fn traverse<F>(&self, order: TraverseOrder, visible_only: bool, visitor: F)
    where
        F: FnMut(NodeKey, &Node),
    {
        self.traverse_from(self.root, order, visible_only, visitor);
    }

    /// Visit a subtree starting at `start`.
    ///
    /// With `visible_only`, an invisible node hides its whole subtree.
    pub fn traverse_from<F>(&self, start: NodeKey, order: TraverseOrder, visible_only: bool, mut visitor: F)
    where
        F: FnMut(NodeKey, &Node),
    {
        match order {
            TraverseOrder::PreOrder => self.visit_pre(start, visible_only, &mut visitor),
            TraverseOrder::PostOrder => self.visit_post(start, visible_only, &mut visitor),
            TraverseOrder::BreadthFirst => {
                let mut queue = VecDeque::from([start]);
                while let Some(key) = queue.pop_front() {
                    let Some(node) = self.nodes.get(key) else {
                        continue;
                    };
                    if visible_only && !node.visible {
                        continue;
                    }
                    visitor(key, node);
                    queue.extend(node.children.iter().copied());
                }
            }
        }
    }

    fn visit_pre<F>(&self, key: NodeKey, visible_only: bool, visitor: &mut F)
    where
        F: FnMut(NodeKey, &Node),
    {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        if visible_only && !node.visible {
            return;
        }
        visitor(key, node);
        for &child in &node.children {
            self.visit_pre(child, visible_only, visitor);
        }
    }

    fn visit_post<F>(&self, key: NodeKey, visible_only: bool, visitor: &mut F)
    where
        F: FnMut(NodeKey, &Node),
    {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        if visible_only && !node.visible {
            return;
        }
        for &child in &node.children {
            self.visit_post(child, visible_only, visitor);
        }
        visitor(key, node);
    }

    /// Find the first attached node with this name, in pre-order
    pub fn find_by_name(&self, name: &str) -> Option<NodeKey> {
        let mut stack = vec![self.root];
        while let Some(key) = stack.pop() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            if node.name == name {
                return Some(key);
            }
            for &child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        None
    }

    /// All attached nodes carrying this tag, in pre-order
    pub fn find_by_tag(&self, tag: &str) -> Vec<NodeKey> {
        let mut found = Vec::new();
        self.traverse(TraverseOrder::PreOrder, false, |key, node| {
            if node.has_tag(tag) {
                found.push(key);
            }
        });
        found
    }

    // --- Spatial queries (naive full-tree scans over world positions) ---

    fn attached_keys(&self) -> Vec<NodeKey> {
        let mut keys = Vec::new();
        self.traverse(TraverseOrder::PreOrder, false, |key, _| {
            if key != self.root {
                keys.push(key);
            }
        });
        keys
    }

    /// Attached nodes within `radius` of `center`
    pub fn find_nodes_in_sphere(&mut self, center: Vec4, radius: f32) -> Vec<NodeKey> {
        let mut found = Vec::new();
        for key in self.attached_keys() {
            let pos = match self.world_position(key) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if pos.distance(center) <= radius {
                found.push(key);
            }
        }
        found
    }

    /// Attached nodes inside the axis-aligned box `[min, max]`
    pub fn find_nodes_in_box(&mut self, min: Vec4, max: Vec4) -> Vec<NodeKey> {
        let mut found = Vec::new();
        for key in self.attached_keys() {
            let p = match self.world_position(key) {
                Ok(p) => p,
                Err(_) => continue,
            };
            let inside = p.x >= min.x && p.x <= max.x
                && p.y >= min.y && p.y <= max.y
                && p.z >= min.z && p.z <= max.z
                && p.w >= min.w && p.w <= max.w;
            if inside {
                found.push(key);
            }
        }
        found
    }

    /// The attached node closest to `point`, with its distance
    pub fn find_nearest_node(&mut self, point: Vec4) -> Option<(NodeKey, f32)> {
        let mut best: Option<(NodeKey, f32)> = None;
        for key in self.attached_keys() {
            let pos = match self.world_position(key) {
                Ok(p) => p,
                Err(_) => continue,
            };
            let dist = pos.distance(point);
            if best.map(|(_, d)| dist < d).unwrap_or(true) {
                best = Some((key, dist));
            }
        }
        best
    }

    /// Naive raycast: nodes whose world position lies within `radius` of the
    /// ray, ordered by distance along it. The direction is normalized here.
    pub fn raycast(&mut self, origin: Vec4, direction: Vec4, radius: f32) -> Vec<RaycastHit> {
        let dir = direction.normalized();
        let mut hits = Vec::new();
        for key in self.attached_keys() {
            let pos = match self.world_position(key) {
                Ok(p) => p,
                Err(_) => continue,
            };
            let to_node = pos - origin;
            let along = to_node.dot(dir);
            if along < 0.0 {
                continue;
            }
            let perpendicular = (to_node - dir * along).length();
            if perpendicular <= radius {
                hits.push(RaycastHit { node: key, distance: along });
            }
        }
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }

    // --- Serialization ---

    /// Export the attached tree as a document (children of the root)
    pub fn to_document(&self) -> SceneDocument {
        let nodes = self.nodes[self.root]
            .children
            .iter()
            .map(|&child| self.node_to_document(child))
            .collect();
        SceneDocument {
            name: self.name.clone(),
            nodes,
        }
    }

    /// Export one node (and its subtree) as a document
    pub fn export_node(&self, key: NodeKey) -> Result<NodeDocument, SceneError> {
        if !self.nodes.contains_key(key) {
            return Err(SceneError::NodeNotFound);
        }
        Ok(self.node_to_document(key))
    }

    fn node_to_document(&self, key: NodeKey) -> NodeDocument {
        let node = &self.nodes[key];
        let mut tags: Vec<String> = node.tags().iter().cloned().collect();
        tags.sort();
        NodeDocument {
            name: node.name.clone(),
            position: node.transform().position.to_array(),
            rotation: rotor_to_array(&node.transform().rotation),
            scale: node.transform().scale.to_array(),
            visible: node.visible,
            enabled: node.enabled,
            tags,
            layers: node.layers,
            children: node
                .children
                .iter()
                .map(|&child| self.node_to_document(child))
                .collect(),
        }
    }

    /// Instantiate a document subtree under `parent`, returning the new root
    /// key of the subtree. Ids are freshly assigned.
    pub fn import_node(&mut self, doc: &NodeDocument, parent: NodeKey) -> Result<NodeKey, SceneError> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneError::NodeNotFound);
        }
        let key = self.create_node(doc.name.clone());
        {
            let node = &mut self.nodes[key];
            node.transform = Transform4 {
                position: Vec4::from_array(doc.position),
                rotation: rotor_from_array(doc.rotation),
                scale: Vec4::from_array(doc.scale),
            };
            node.visible = doc.visible;
            node.enabled = doc.enabled;
            node.layers = doc.layers;
            for tag in &doc.tags {
                node.add_tag(tag.clone());
            }
        }
        self.attach(key, parent)?;
        for child in &doc.children {
            self.import_node(child, key)?;
        }
        Ok(key)
    }

    /// Build a scene from a document
    pub fn from_document(doc: &SceneDocument) -> Result<Self, SceneError> {
        let mut scene = Scene::new(doc.name.clone());
        let root = scene.root;
        for node in &doc.nodes {
            scene.import_node(node, root)?;
        }
        Ok(scene)
    }

    /// Save the scene to a RON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SceneError> {
        let pretty = ron::ser::PrettyConfig::new().struct_names(true);
        let contents = ron::ser::to_string_pretty(&self.to_document(), pretty)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Load a scene from a RON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SceneError> {
        let contents = fs::read_to_string(path)?;
        let doc: SceneDocument = ron::from_str(&contents)?;
        Self::from_document(&doc)
    }
}

fn rotor_to_array(r: &Rotor4) -> [f32; 8] {
    [r.s, r.b_xy, r.b_xz, r.b_xw, r.b_yz, r.b_yw, r.b_zw, r.p]
}

fn rotor_from_array(a: [f32; 8]) -> Rotor4 {
    Rotor4 {
        s: a[0],
        b_xy: a[1],
        b_xz: a[2],
        b_xw: a[3],
        b_yz: a[4],
        b_yw: a[5],
        b_zw: a[6],
        p: a[7],
    }
}

fn default_true() -> bool {
    true
}

fn default_layers() -> u32 {
    1
}

fn default_rotation() -> [f32; 8] {
    [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]
}

fn default_scale() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

/// Serializable snapshot of a node subtree (id-independent)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDocument {
    pub name: String,
    #[serde(default)]
    pub position: [f32; 4],
    #[serde(default = "default_rotation")]
    pub rotation: [f32; 8],
    #[serde(default = "default_scale")]
    pub scale: [f32; 4],
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_layers")]
    pub layers: u32,
    #[serde(default)]
    pub children: Vec<NodeDocument>,
}

/// Serializable snapshot of a whole scene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDocument {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
}

/// Error type for scene operations
#[derive(Debug)]
pub enum SceneError {
    /// Attaching a node to itself
    AttachToSelf(NodeId),
    /// Attaching a node to one of its own descendants
    AttachWouldCycle(NodeId),
    /// The root cannot be attached, detached, or removed
    RootImmovable,
    /// The referenced node does not exist
    NodeNotFound,
    /// IO error (file not found, permission denied, etc.)
    Io(io::Error),
    /// Parse error (invalid RON syntax)
    Parse(ron::error::SpannedError),
    /// Serialization error
    Serialize(ron::Error),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::AttachToSelf(id) => write!(f, "Node {} cannot be attached to itself", id),
            SceneError::AttachWouldCycle(id) => {
                write!(f, "Attaching node {} would create a cycle", id)
            }
            SceneError::RootImmovable => write!(f, "The root node cannot be moved or removed"),
            SceneError::NodeNotFound => write!(f, "Node not found"),
            SceneError::Io(e) => write!(f, "IO error: {}", e),
            SceneError::Parse(e) => write!(f, "Parse error: {}", e),
            SceneError::Serialize(e) => write!(f, "Serialize error: {}", e),
        }
    }
}

impl std::error::Error for SceneError {}

impl From<io::Error> for SceneError {
    fn from(e: io::Error) -> Self {
        SceneError::Io(e)
    }
}

impl From<ron::error::SpannedError> for SceneError {
    fn from(e: ron::error::SpannedError) -> Self {
        SceneError::Parse(e)
    }
}

impl From<ron::Error> for SceneError {
    fn from(e: ron::Error) -> Self {
        SceneError::Serialize(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vib4_math::RotationPlane;

    const EPSILON: f32 = 0.0001;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn vec_approx_eq(a: Vec4, b: Vec4) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z) && approx_eq(a.w, b.w)
    }

    #[test]
    fn test_new_scene_has_root_only() {
        let scene = Scene::new("test");
        assert_eq!(scene.node_count(), 0);
        assert!(scene.node(scene.root()).is_some());
        // Root is pre-registered in the id index
        assert!(scene.contains(1));
    }

    #[test]
    fn test_add_and_contains() {
        let mut scene = Scene::new("test");
        let key = scene.add("child");
        let id = scene.node(key).unwrap().id();

        assert_eq!(scene.node_count(), 1);
        assert!(scene.contains(id));
        assert_eq!(scene.key_of(id), Some(key));
        assert_eq!(scene.node(key).unwrap().parent(), Some(scene.root()));
    }

    #[test]
    fn test_standalone_node_not_indexed() {
        let mut scene = Scene::new("test");
        let key = scene.create_node("floating");
        let id = scene.node(key).unwrap().id();

        assert!(!scene.contains(id));
        assert_eq!(scene.node_count(), 0);

        scene.attach(key, scene.root()).unwrap();
        assert!(scene.contains(id));
    }

    #[test]
    fn test_attach_subtree_registers_descendants() {
        let mut scene = Scene::new("test");
        let parent = scene.create_node("parent");
        let child = scene.create_node("child");
        scene.attach(child, parent).unwrap();

        let child_id = scene.node(child).unwrap().id();
        assert!(!scene.contains(child_id));

        // Attaching the standalone parent brings the whole subtree in
        scene.attach(parent, scene.root()).unwrap();
        assert!(scene.contains(child_id));
        assert_eq!(scene.node_count(), 2);
    }

    #[test]
    fn test_attach_to_self_rejected() {
        let mut scene = Scene::new("test");
        let key = scene.add("node");
        let err = scene.attach(key, key).unwrap_err();
        assert!(matches!(err, SceneError::AttachToSelf(_)));
        // Tree unchanged
        assert_eq!(scene.node(key).unwrap().parent(), Some(scene.root()));
    }

    #[test]
    fn test_attach_to_descendant_rejected() {
        let mut scene = Scene::new("test");
        let a = scene.add("a");
        let b = scene.add("b");
        let c = scene.add("c");
        scene.attach(b, a).unwrap();
        scene.attach(c, b).unwrap();

        // a -> b -> c; attaching a under c would close a cycle
        let err = scene.attach(a, c).unwrap_err();
        assert!(matches!(err, SceneError::AttachWouldCycle(_)));

        // Tree unchanged
        assert_eq!(scene.node(a).unwrap().parent(), Some(scene.root()));
        assert_eq!(scene.node(c).unwrap().parent(), Some(b));
    }

    #[test]
    fn test_reparent_is_atomic() {
        let mut scene = Scene::new("test");
        let a = scene.add("a");
        let b = scene.add("b");
        let child = scene.add("child");

        scene.attach(child, a).unwrap();
        assert_eq!(scene.node(a).unwrap().children(), &[child]);

        scene.attach(child, b).unwrap();
        assert!(scene.node(a).unwrap().children().is_empty());
        assert_eq!(scene.node(b).unwrap().children(), &[child]);
        assert_eq!(scene.node(child).unwrap().parent(), Some(b));
    }

    #[test]
    fn test_detach_unregisters_subtree() {
        let mut scene = Scene::new("test");
        let parent = scene.add("parent");
        let child = scene.add("child");
        scene.attach(child, parent).unwrap();
        let child_id = scene.node(child).unwrap().id();

        scene.detach(parent).unwrap();
        assert!(!scene.contains(child_id));
        assert_eq!(scene.node_count(), 0);
        // Nodes still exist, just standalone
        assert!(scene.node(parent).is_some());
        assert!(scene.node(child).is_some());
    }

    #[test]
    fn test_remove_node_orphans_children() {
        let mut scene = Scene::new("test");
        let parent = scene.add("parent");
        let child = scene.add("child");
        scene.attach(child, parent).unwrap();

        assert!(scene.remove_node(parent));
        assert!(scene.node(parent).is_none());
        // Child survives as a standalone node
        let child_node = scene.node(child).unwrap();
        assert!(child_node.parent().is_none());
        assert!(!scene.contains(child_node.id()));
    }

    #[test]
    fn test_remove_subtree() {
        let mut scene = Scene::new("test");
        let parent = scene.add("parent");
        let child = scene.add("child");
        scene.attach(child, parent).unwrap();

        assert!(scene.remove_subtree(parent));
        assert!(scene.node(parent).is_none());
        assert!(scene.node(child).is_none());
        assert_eq!(scene.node_count(), 0);
    }

    #[test]
    fn test_remove_unknown_is_benign() {
        let mut scene = Scene::new("test");
        let key = scene.add("gone");
        scene.remove_subtree(key);
        assert!(!scene.remove_node(key));
        assert!(!scene.remove_subtree(key));
    }

    #[test]
    fn test_root_is_immovable() {
        let mut scene = Scene::new("test");
        let other = scene.add("other");
        assert!(matches!(scene.attach(scene.root(), other), Err(SceneError::RootImmovable)));
        assert!(matches!(scene.detach(scene.root()), Err(SceneError::RootImmovable)));
        assert!(!scene.remove_node(scene.root()));
    }

    #[test]
    fn test_clear_keeps_root() {
        let mut scene = Scene::new("test");
        scene.add("a");
        scene.add("b");
        assert_eq!(scene.node_count(), 2);

        scene.clear();
        assert_eq!(scene.node_count(), 0);
        assert!(scene.node(scene.root()).is_some());
        assert!(scene.contains(1));
    }

    #[test]
    fn test_world_matrix_composes_through_parent() {
        let mut scene = Scene::new("test");
        let parent = scene.add("parent");
        let leaf = scene.add("leaf");
        scene.attach(leaf, parent).unwrap();

        scene.set_position(parent, Vec4::new(10.0, 0.0, 0.0, 0.0)).unwrap();
        scene.set_position(leaf, Vec4::new(5.0, 0.0, 0.0, 0.0)).unwrap();

        let pos = scene.world_position(leaf).unwrap();
        assert!(approx_eq(pos.x, 15.0), "expected 15, got {:?}", pos);
    }

    #[test]
    fn test_world_matrix_identity_for_root_child() {
        let mut scene = Scene::new("test");
        let node = scene.add("node");
        scene.set_position(node, Vec4::new(1.0, 2.0, 3.0, 4.0)).unwrap();

        // Root is identity, so world == local
        let world = scene.world_matrix(node).unwrap();
        let local = scene.local_matrix(node).unwrap();
        assert_eq!(world, local);
    }

    #[test]
    fn test_world_matrix_with_rotation() {
        let mut scene = Scene::new("test");
        let parent = scene.add("parent");
        let leaf = scene.add("leaf");
        scene.attach(leaf, parent).unwrap();

        // Parent rotates 90 degrees in XY; leaf sits at local +X
        let rot = Rotor4::from_plane_angle(RotationPlane::XY, std::f32::consts::FRAC_PI_2);
        scene.set_rotation(parent, rot).unwrap();
        scene.set_position(leaf, Vec4::X).unwrap();

        let pos = scene.world_position(leaf).unwrap();
        assert!(vec_approx_eq(pos, Vec4::Y), "expected Y, got {:?}", pos);
    }

    #[test]
    fn test_dirty_propagates_to_descendants() {
        let mut scene = Scene::new("test");
        let parent = scene.add("parent");
        let child = scene.add("child");
        let grandchild = scene.add("grandchild");
        scene.attach(child, parent).unwrap();
        scene.attach(grandchild, child).unwrap();

        // Settle all caches
        scene.update(0.0);
        assert!(!scene.node(grandchild).unwrap().world_dirty());

        // Moving the parent must invalidate the whole subtree
        scene.set_position(parent, Vec4::new(3.0, 0.0, 0.0, 0.0)).unwrap();
        assert!(scene.node(child).unwrap().world_dirty());
        assert!(scene.node(grandchild).unwrap().world_dirty());

        // And the recomputed value reflects the new parent position
        let pos = scene.world_position(grandchild).unwrap();
        assert!(approx_eq(pos.x, 3.0));
    }

    #[test]
    fn test_stale_cache_is_recomputed_on_read() {
        let mut scene = Scene::new("test");
        let node = scene.add("node");

        scene.set_position(node, Vec4::new(1.0, 0.0, 0.0, 0.0)).unwrap();
        assert!(approx_eq(scene.world_position(node).unwrap().x, 1.0));

        // Cached now; a second mutation must not serve the stale value
        scene.set_position(node, Vec4::new(2.0, 0.0, 0.0, 0.0)).unwrap();
        assert!(scene.node(node).unwrap().world_dirty());
        assert!(approx_eq(scene.world_position(node).unwrap().x, 2.0));
        assert!(!scene.node(node).unwrap().world_dirty());
    }

    #[test]
    fn test_update_refreshes_attached_tree() {
        let mut scene = Scene::new("test");
        let node = scene.add("node");
        scene.set_position(node, Vec4::new(4.0, 0.0, 0.0, 0.0)).unwrap();

        scene.update(0.016);
        assert!(!scene.node(node).unwrap().world_dirty());
    }

    #[test]
    fn test_add_during_update_is_deferred() {
        let mut scene = Scene::new("test");
        scene.on_update(|scene, _dt| {
            let key = scene.add("spawned");
            let id = scene.node(key).unwrap().id();
            // Buffered: not visible to contains() inside the pass
            assert!(!scene.contains(id));
            scene.node_mut(key).unwrap().set_user_data("id", id);
        });

        scene.update(0.016);
        // Applied after the pass
        assert_eq!(scene.node_count(), 1);
        let spawned = scene.find_by_name("spawned").unwrap();
        assert_eq!(scene.node(spawned).unwrap().parent(), Some(scene.root()));
    }

    #[test]
    fn test_remove_during_update_is_deferred() {
        let mut scene = Scene::new("test");
        let victim = scene.add("victim");
        let victim_id = scene.node(victim).unwrap().id();

        scene.on_update(move |scene, _dt| {
            scene.remove_subtree(victim);
            // Still present during the pass
            assert!(scene.contains(victim_id));
        });

        scene.update(0.016);
        assert!(!scene.contains(victim_id));
        assert!(scene.node(victim).is_none());
    }

    #[test]
    fn test_traversal_orders() {
        let mut scene = Scene::new("test");
        let a = scene.add("a");
        let b = scene.add("b");
        let a1 = scene.add("a1");
        let a2 = scene.add("a2");
        scene.attach(a1, a).unwrap();
        scene.attach(a2, a).unwrap();
        let _ = b;

        let mut pre = Vec::new();
        scene.traverse(TraverseOrder::PreOrder, false, |_, n| pre.push(n.name.clone()));
        assert_eq!(pre, ["root", "a", "a1", "a2", "b"]);

        let mut post = Vec::new();
        scene.traverse(TraverseOrder::PostOrder, false, |_, n| post.push(n.name.clone()));
        assert_eq!(post, ["a1", "a2", "a", "b", "root"]);

        let mut bfs = Vec::new();
        scene.traverse(TraverseOrder::BreadthFirst, false, |_, n| bfs.push(n.name.clone()));
        assert_eq!(bfs, ["root", "a", "b", "a1", "a2"]);
    }

    #[test]
    fn test_traversal_visible_only_hides_subtree() {
        let mut scene = Scene::new("test");
        let hidden = scene.add("hidden");
        let under = scene.add("under");
        scene.attach(under, hidden).unwrap();
        scene.add("shown");
        scene.node_mut(hidden).unwrap().visible = false;

        let mut seen = Vec::new();
        scene.traverse(TraverseOrder::PreOrder, true, |_, n| seen.push(n.name.clone()));
        assert_eq!(seen, ["root", "shown"]);
    }

    #[test]
    fn test_find_by_name_and_tag() {
        let mut scene = Scene::new("test");
        let a = scene.add("alpha");
        let b = scene.add("beta");
        scene.node_mut(a).unwrap().add_tag("dynamic");
        scene.node_mut(b).unwrap().add_tag("dynamic");

        assert_eq!(scene.find_by_name("beta"), Some(b));
        assert!(scene.find_by_name("gamma").is_none());

        let tagged = scene.find_by_tag("dynamic");
        assert_eq!(tagged, vec![a, b]);
        assert!(scene.find_by_tag("static").is_empty());
    }

    #[test]
    fn test_find_nodes_in_sphere() {
        let mut scene = Scene::new("test");
        let near = scene.add("near");
        let far = scene.add("far");
        scene.set_position(near, Vec4::new(1.0, 0.0, 0.0, 0.0)).unwrap();
        scene.set_position(far, Vec4::new(100.0, 0.0, 0.0, 0.0)).unwrap();

        let found = scene.find_nodes_in_sphere(Vec4::ZERO, 5.0);
        assert_eq!(found, vec![near]);
    }

    #[test]
    fn test_find_nodes_in_box() {
        let mut scene = Scene::new("test");
        let inside = scene.add("inside");
        let outside = scene.add("outside");
        scene.set_position(inside, Vec4::new(0.5, 0.5, 0.5, 0.5)).unwrap();
        scene.set_position(outside, Vec4::new(2.0, 0.5, 0.5, 0.5)).unwrap();

        let found = scene.find_nodes_in_box(Vec4::ZERO, Vec4::ONE);
        assert_eq!(found, vec![inside]);
    }

    #[test]
    fn test_find_nearest_node() {
        let mut scene = Scene::new("test");
        let a = scene.add("a");
        let b = scene.add("b");
        scene.set_position(a, Vec4::new(1.0, 0.0, 0.0, 0.0)).unwrap();
        scene.set_position(b, Vec4::new(3.0, 0.0, 0.0, 0.0)).unwrap();

        let (key, dist) = scene.find_nearest_node(Vec4::new(2.5, 0.0, 0.0, 0.0)).unwrap();
        assert_eq!(key, b);
        assert!(approx_eq(dist, 0.5));
    }

    #[test]
    fn test_raycast_orders_by_distance() {
        let mut scene = Scene::new("test");
        let far = scene.add("far");
        let near = scene.add("near");
        let off_axis = scene.add("off_axis");
        let behind = scene.add("behind");
        scene.set_position(far, Vec4::new(10.0, 0.1, 0.0, 0.0)).unwrap();
        scene.set_position(near, Vec4::new(2.0, 0.0, 0.0, 0.0)).unwrap();
        scene.set_position(off_axis, Vec4::new(5.0, 50.0, 0.0, 0.0)).unwrap();
        scene.set_position(behind, Vec4::new(-5.0, 0.0, 0.0, 0.0)).unwrap();

        let hits = scene.raycast(Vec4::ZERO, Vec4::X, 1.0);
        let keys: Vec<NodeKey> = hits.iter().map(|h| h.node).collect();
        assert_eq!(keys, vec![near, far]);
        assert!(hits[0].distance < hits[1].distance);
    }

    #[test]
    fn test_document_round_trip() {
        let mut scene = Scene::new("level");
        let parent = scene.add("parent");
        let child = scene.add("child");
        scene.attach(child, parent).unwrap();
        scene.set_position(parent, Vec4::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        scene
            .set_rotation(parent, Rotor4::from_plane_angle(RotationPlane::XW, 0.5))
            .unwrap();
        scene.set_scale(child, Vec4::new(2.0, 2.0, 2.0, 2.0)).unwrap();
        scene.node_mut(child).unwrap().add_tag("dynamic");
        scene.node_mut(child).unwrap().visible = false;
        scene.node_mut(child).unwrap().layers = 0b101;

        let doc = scene.to_document();
        let restored = Scene::from_document(&doc).unwrap();

        assert_eq!(restored.name, "level");
        assert_eq!(restored.node_count(), 2);

        let parent2 = restored.find_by_name("parent").unwrap();
        let child2 = restored.find_by_name("child").unwrap();
        assert_eq!(restored.node(child2).unwrap().parent(), Some(parent2));
        assert!(restored.node(child2).unwrap().has_tag("dynamic"));
        assert!(!restored.node(child2).unwrap().visible);
        assert_eq!(restored.node(child2).unwrap().layers, 0b101);
        assert!(vec_approx_eq(
            restored.node(parent2).unwrap().transform().position,
            Vec4::new(1.0, 2.0, 3.0, 4.0)
        ));
        assert!(vec_approx_eq(
            restored.node(child2).unwrap().transform().scale,
            Vec4::new(2.0, 2.0, 2.0, 2.0)
        ));
    }

    #[test]
    fn test_ron_round_trip() {
        let mut scene = Scene::new("ron_scene");
        let node = scene.add("tesseract");
        scene.set_position(node, Vec4::new(0.0, 1.0, 0.0, -1.0)).unwrap();

        let pretty = ron::ser::PrettyConfig::new().struct_names(true);
        let text = ron::ser::to_string_pretty(&scene.to_document(), pretty).unwrap();
        assert!(text.contains("ron_scene"));
        assert!(text.contains("tesseract"));

        let doc: SceneDocument = ron::from_str(&text).unwrap();
        let restored = Scene::from_document(&doc).unwrap();
        assert!(restored.find_by_name("tesseract").is_some());
    }

    #[test]
    fn test_document_defaults() {
        // Fields beyond name/transform are optional in the document format
        let text = r#"
SceneDocument(
    name: "minimal",
    nodes: [
        NodeDocument(
            name: "only",
            position: (2.0, 0.0, 0.0, 0.0),
        ),
    ],
)
"#;
        let doc: SceneDocument = ron::from_str(text).unwrap();
        let scene = Scene::from_document(&doc).unwrap();
        let key = scene.find_by_name("only").unwrap();
        let node = scene.node(key).unwrap();
        assert!(node.visible);
        assert!(node.enabled);
        assert_eq!(node.layers, 1);
        assert!(vec_approx_eq(node.transform().scale, Vec4::ONE));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = std::env::temp_dir().join("vib4_scene_tests");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("round_trip.ron");

        let mut scene = Scene::new("disk");
        scene.add("persisted");
        scene.save(&path).unwrap();

        let loaded = Scene::load(&path).unwrap();
        assert_eq!(loaded.name, "disk");
        assert!(loaded.find_by_name("persisted").is_some());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Scene::load("/nonexistent/vib4/scene.ron").unwrap_err();
        assert!(matches!(err, SceneError::Io(_)));
    }
}
