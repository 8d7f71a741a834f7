//! Retained scene graph read by the hosting render loop
//!
//! Nodes are arena-allocated and addressed by generational [`NodeId`]
//! handles, so a handle to a removed node can never resolve to its slot's
//! next occupant. Each node is owned by exactly one parent (or the scene
//! root); reparenting moves ownership. Node names are unique across the
//! graph and support renderer-side lookup.

use std::collections::HashMap;

use armature_core::ColorRgba;
use glam::{Affine3A, Quat, Vec3};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Duplicate node name: {0}")]
    DuplicateName(String),
    #[error("Stale or unknown node id")]
    UnknownNode,
    #[error("Reparenting would create a cycle")]
    WouldCycle,
}

/// Handle to a scene node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Unit shapes; node scale carries the dimensions. Cylinders and cones are
/// Y-aligned, matching the convention of the rendering engines this graph
/// is handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Cube,
    Sphere,
    Cylinder,
    Cone,
}

/// What the renderer draws for a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodePayload {
    /// Pure grouping node, nothing drawn
    Group,
    Shape(ShapeKind),
    /// Polyline geometry in node-local space; `strip` joins consecutive
    /// points, otherwise points pair up into segments
    Lines {
        points: Vec<Vec3>,
        colors: Vec<ColorRgba>,
        width: f32,
        strip: bool,
    },
    /// Screen-facing point sprites
    PointSprites {
        points: Vec<Vec3>,
        colors: Vec<ColorRgba>,
        size: f32,
    },
    /// Raw triangle soup, three vertices per face
    Mesh {
        vertices: Vec<Vec3>,
        colors: Vec<ColorRgba>,
    },
    /// View-facing text billboard
    Text { text: String, height: f32 },
}

/// A single node: local pose, render state, and tree links
#[derive(Debug, Clone)]
pub struct SceneNode {
    name: Option<String>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub visible: bool,
    pub color: ColorRgba,
    pub payload: NodePayload,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    world: Affine3A,
}

impl SceneNode {
    pub fn new(payload: NodePayload) -> Self {
        Self {
            name: None,
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            visible: true,
            color: ColorRgba::WHITE,
            payload,
            parent: None,
            children: Vec::new(),
            world: Affine3A::IDENTITY,
        }
    }

    pub fn group() -> Self {
        Self::new(NodePayload::Group)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn at(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// World matrix as of the last [`SceneGraph::update_world`]
    pub fn world(&self) -> Affine3A {
        self.world
    }
}

struct Slot {
    generation: u32,
    node: Option<SceneNode>,
}

/// The scene graph arena
#[derive(Default)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    names: HashMap<String, NodeId>,
    roots: Vec<NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node under `parent`, or at the scene root when `None`
    pub fn insert(
        &mut self,
        mut node: SceneNode,
        parent: Option<NodeId>,
    ) -> Result<NodeId, SceneError> {
        if let Some(p) = parent {
            if self.get(p).is_none() {
                return Err(SceneError::UnknownNode);
            }
        }
        if let Some(name) = &node.name {
            if self.names.contains_key(name) {
                return Err(SceneError::DuplicateName(name.clone()));
            }
        }

        node.parent = parent;
        node.children.clear();
        let name = node.name.clone();

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        };

        if let Some(name) = name {
            self.names.insert(name, id);
        }
        match parent {
            Some(p) => self.attach_child(p, id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    /// Renderer-side lookup by unique node name
    pub fn get_by_name(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Live node count
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Detach `id` and drop its whole subtree
    pub fn remove(&mut self, id: NodeId) -> Result<(), SceneError> {
        if self.get(id).is_none() {
            return Err(SceneError::UnknownNode);
        }
        self.detach(id);

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            if let Some(node) = slot.node.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
                if let Some(name) = node.name {
                    self.names.remove(&name);
                }
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    /// Move `id` under a new parent (or the scene root), keeping the tree
    /// invariant; a no-op when already parented there
    pub fn set_parent(&mut self, id: NodeId, new_parent: Option<NodeId>) -> Result<(), SceneError> {
        let current = self.get(id).ok_or(SceneError::UnknownNode)?.parent;
        if current == new_parent {
            return Ok(());
        }
        if let Some(p) = new_parent {
            if self.get(p).is_none() {
                return Err(SceneError::UnknownNode);
            }
            // walk up from the new parent; finding `id` means a cycle
            let mut cursor = Some(p);
            while let Some(c) = cursor {
                if c == id {
                    return Err(SceneError::WouldCycle);
                }
                cursor = self.get(c).and_then(|n| n.parent);
            }
        }

        self.detach(id);
        if let Some(node) = self.get_mut(id) {
            node.parent = new_parent;
        }
        match new_parent {
            Some(p) => self.attach_child(p, id),
            None => self.roots.push(id),
        }
        Ok(())
    }

    /// Recompute cached world matrices, pre-order from the roots
    pub fn update_world(&mut self) {
        let mut stack: Vec<(NodeId, Affine3A)> = self
            .roots
            .iter()
            .map(|&id| (id, Affine3A::IDENTITY))
            .collect();
        while let Some((id, parent_world)) = stack.pop() {
            let (world, children) = match self.get(id) {
                Some(node) => {
                    let local = Affine3A::from_scale_rotation_translation(
                        node.scale,
                        node.rotation,
                        node.translation,
                    );
                    (parent_world * local, node.children.clone())
                }
                None => continue,
            };
            if let Some(node) = self.get_mut(id) {
                node.world = world;
            }
            for child in children {
                stack.push((child, world));
            }
        }
    }

    pub fn world_position(&self, id: NodeId) -> Option<Vec3> {
        self.get(id).map(|n| Vec3::from(n.world.translation))
    }

    pub fn world_rotation(&self, id: NodeId) -> Option<Quat> {
        self.get(id).map(|n| {
            let (_, rotation, _) = n.world.to_scale_rotation_translation();
            rotation
        })
    }

    /// Effective visibility: the node's own flag ANDed with its ancestors'
    pub fn is_visible(&self, id: NodeId) -> Option<bool> {
        let mut cursor = Some(id);
        let mut visible = true;
        while let Some(c) = cursor {
            let node = self.get(c)?;
            visible = visible && node.visible;
            cursor = node.parent;
        }
        Some(visible)
    }

    /// Set `color` on a node and its whole subtree
    pub fn set_subtree_color(&mut self, id: NodeId, color: ColorRgba) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get_mut(current) {
                node.color = color;
                stack.extend(node.children.iter().copied());
            }
        }
    }

    fn attach_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
    }

    fn detach(&mut self, id: NodeId) {
        let parent = self.get(id).and_then(|n| n.parent);
        match parent {
            Some(p) => {
                if let Some(node) = self.get_mut(p) {
                    node.children.retain(|&c| c != id);
                }
            }
            None => self.roots.retain(|&r| r != id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup_by_name() {
        let mut graph = SceneGraph::new();
        let id = graph
            .insert(SceneNode::group().named("base_link"), None)
            .unwrap();
        assert_eq!(graph.get_by_name("base_link"), Some(id));
        assert_eq!(graph.get(id).unwrap().name(), Some("base_link"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut graph = SceneGraph::new();
        graph.insert(SceneNode::group().named("a"), None).unwrap();
        assert!(matches!(
            graph.insert(SceneNode::group().named("a"), None),
            Err(SceneError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_remove_drops_subtree_and_frees_names() {
        let mut graph = SceneGraph::new();
        let parent = graph.insert(SceneNode::group().named("p"), None).unwrap();
        let child = graph
            .insert(SceneNode::group().named("c"), Some(parent))
            .unwrap();
        graph.remove(parent).unwrap();

        assert!(graph.get(parent).is_none());
        assert!(graph.get(child).is_none());
        assert_eq!(graph.get_by_name("c"), None);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_stale_id_does_not_resolve_after_slot_reuse() {
        let mut graph = SceneGraph::new();
        let old = graph.insert(SceneNode::group(), None).unwrap();
        graph.remove(old).unwrap();
        let reused = graph.insert(SceneNode::group(), None).unwrap();

        assert!(graph.get(old).is_none());
        assert!(graph.get(reused).is_some());
    }

    #[test]
    fn test_reparent_moves_ownership() {
        let mut graph = SceneGraph::new();
        let a = graph.insert(SceneNode::group(), None).unwrap();
        let b = graph.insert(SceneNode::group(), None).unwrap();
        let c = graph.insert(SceneNode::group(), Some(a)).unwrap();

        graph.set_parent(c, Some(b)).unwrap();
        assert!(graph.get(a).unwrap().children().is_empty());
        assert_eq!(graph.get(b).unwrap().children(), &[c]);
        assert_eq!(graph.get(c).unwrap().parent(), Some(b));
    }

    #[test]
    fn test_reparent_cycle_rejected() {
        let mut graph = SceneGraph::new();
        let a = graph.insert(SceneNode::group(), None).unwrap();
        let b = graph.insert(SceneNode::group(), Some(a)).unwrap();
        assert!(matches!(
            graph.set_parent(a, Some(b)),
            Err(SceneError::WouldCycle)
        ));
    }

    #[test]
    fn test_world_matrices_compose() {
        let mut graph = SceneGraph::new();
        let a = graph
            .insert(SceneNode::group().at(Vec3::new(1.0, 0.0, 0.0)), None)
            .unwrap();
        let b = graph
            .insert(SceneNode::group().at(Vec3::new(0.0, 2.0, 0.0)), Some(a))
            .unwrap();
        graph.update_world();

        assert_eq!(graph.world_position(b), Some(Vec3::new(1.0, 2.0, 0.0)));
    }

    #[test]
    fn test_world_rotation_composes() {
        let mut graph = SceneGraph::new();
        let quarter = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let a = graph.insert(SceneNode::group().rotated(quarter), None).unwrap();
        let b = graph
            .insert(SceneNode::group().at(Vec3::new(1.0, 0.0, 0.0)), Some(a))
            .unwrap();
        graph.update_world();

        let p = graph.world_position(b).unwrap();
        assert!(p.abs_diff_eq(Vec3::new(0.0, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn test_effective_visibility() {
        let mut graph = SceneGraph::new();
        let a = graph.insert(SceneNode::group(), None).unwrap();
        let b = graph.insert(SceneNode::group(), Some(a)).unwrap();
        assert_eq!(graph.is_visible(b), Some(true));

        graph.get_mut(a).unwrap().visible = false;
        assert_eq!(graph.is_visible(b), Some(false));
        assert_eq!(graph.get(b).unwrap().visible, true);
    }
}
