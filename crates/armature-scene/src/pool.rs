//! Grow-or-hide reconciliation of pooled per-point children
//!
//! A [`PointPool`] keeps a dynamic child list in sync with a point array.
//! Shrinking hides the excess children instead of destroying them, so a
//! stream oscillating around a size never churns allocations; regrowth
//! reuses the hidden children in place.

use armature_core::{ColorRgba, PointMsg};
use glam::Vec3;

use crate::graph::{NodeId, NodePayload, SceneError, SceneGraph, SceneNode, ShapeKind};

/// Pool of identical shape children under one parent node
#[derive(Debug, Clone)]
pub struct PointPool {
    parent: NodeId,
    kind: ShapeKind,
    children: Vec<NodeId>,
}

impl PointPool {
    pub fn new(parent: NodeId, kind: ShapeKind) -> Self {
        Self {
            parent,
            kind,
            children: Vec::new(),
        }
    }

    /// Reconcile the child list against `points`.
    ///
    /// The overlap is repositioned, recolored, and rescaled in place;
    /// missing children are constructed and appended; excess children are
    /// hidden but retained. `colors` is indexed parallel to `points`, with
    /// `flat` filling in where it runs short. Points without full finite
    /// x/y/z data are silently skipped.
    pub fn reconcile(
        &mut self,
        graph: &mut SceneGraph,
        points: &[PointMsg],
        colors: &[ColorRgba],
        flat: ColorRgba,
        scale: Vec3,
    ) -> Result<(), SceneError> {
        let usable: Vec<(Vec3, ColorRgba)> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_finite())
            .map(|(i, p)| (p.to_vec3(), colors.get(i).copied().unwrap_or(flat)))
            .collect();

        for (i, (position, color)) in usable.iter().enumerate() {
            if let Some(&child) = self.children.get(i) {
                if let Some(node) = graph.get_mut(child) {
                    node.translation = *position;
                    node.scale = scale;
                    node.color = *color;
                    node.visible = true;
                }
            } else {
                let mut node = SceneNode::new(NodePayload::Shape(self.kind)).at(*position);
                node.scale = scale;
                node.color = *color;
                self.children.push(graph.insert(node, Some(self.parent))?);
            }
        }

        for &child in &self.children[usable.len().min(self.children.len())..] {
            if let Some(node) = graph.get_mut(child) {
                node.visible = false;
            }
        }
        Ok(())
    }

    /// Total children ever constructed, hidden ones included
    pub fn constructed_len(&self) -> usize {
        self.children.len()
    }

    /// Children currently shown
    pub fn visible_len(&self, graph: &SceneGraph) -> usize {
        self.children
            .iter()
            .filter(|&&c| graph.get(c).map(|n| n.visible).unwrap_or(false))
            .count()
    }
}
