//! Construction helpers for composite primitives

use glam::{Quat, Vec3};

use armature_core::ColorRgba;

use crate::graph::{NodeId, NodePayload, SceneError, SceneGraph, SceneNode, ShapeKind};

/// Shortest shaft kept when an arrow is squeezed below its head length
const MIN_SHAFT_LENGTH: f32 = 1e-4;

/// Arrow proportions; lengths run along the arrow axis
#[derive(Debug, Clone, Copy)]
pub struct ArrowProps {
    pub length: f32,
    pub shaft_diameter: f32,
    pub head_diameter: f32,
    pub head_length: f32,
}

impl Default for ArrowProps {
    fn default() -> Self {
        Self {
            length: 1.0,
            shaft_diameter: 0.05,
            head_diameter: 0.1,
            head_length: 0.2,
        }
    }
}

/// Unit shapes are Y-aligned; this lays them along the group's +Z axis
pub(crate) fn y_to_z() -> Quat {
    Quat::from_rotation_x(std::f32::consts::FRAC_PI_2)
}

/// A shaft+head arrow, aligned along its group node's +Z axis
#[derive(Debug, Clone)]
pub struct Arrow {
    group: NodeId,
    shaft: NodeId,
    head: NodeId,
    props: ArrowProps,
}

impl Arrow {
    pub fn build(
        graph: &mut SceneGraph,
        parent: Option<NodeId>,
        props: ArrowProps,
    ) -> Result<Arrow, SceneError> {
        let group = graph.insert(SceneNode::group(), parent)?;
        let shaft_length = (props.length - props.head_length).max(MIN_SHAFT_LENGTH);

        let mut shaft_node = SceneNode::new(NodePayload::Shape(ShapeKind::Cylinder))
            .at(Vec3::new(0.0, 0.0, shaft_length / 2.0))
            .rotated(y_to_z());
        shaft_node.scale = Vec3::new(props.shaft_diameter, shaft_length, props.shaft_diameter);
        let shaft = graph.insert(shaft_node, Some(group))?;

        let mut head_node = SceneNode::new(NodePayload::Shape(ShapeKind::Cone))
            .at(Vec3::new(0.0, 0.0, shaft_length + props.head_length / 2.0))
            .rotated(y_to_z());
        head_node.scale = Vec3::new(props.head_diameter, props.head_length, props.head_diameter);
        let head = graph.insert(head_node, Some(group))?;

        Ok(Arrow {
            group,
            shaft,
            head,
            props,
        })
    }

    pub fn group(&self) -> NodeId {
        self.group
    }

    /// Resize so tip-to-tail spans `total`; the shaft absorbs the change,
    /// the head keeps its proportions
    pub fn set_total_length(&self, graph: &mut SceneGraph, total: f32) {
        let shaft_length = (total - self.props.head_length).max(MIN_SHAFT_LENGTH);
        if let Some(shaft) = graph.get_mut(self.shaft) {
            shaft.scale.y = shaft_length;
            shaft.translation.z = shaft_length / 2.0;
        }
        if let Some(head) = graph.get_mut(self.head) {
            head.translation.z = shaft_length + self.props.head_length / 2.0;
        }
    }

    /// Orient the arrow along `dir` (in the parent's space); degenerate
    /// directions leave the orientation unchanged
    pub fn point_along(&self, graph: &mut SceneGraph, dir: Vec3) {
        if let Some(dir) = dir.try_normalize() {
            if let Some(group) = graph.get_mut(self.group) {
                group.rotation = Quat::from_rotation_arc(Vec3::Z, dir);
            }
        }
    }

    pub fn set_color(&self, graph: &mut SceneGraph, color: ColorRgba) {
        graph.set_subtree_color(self.group, color);
    }

    pub fn set_visible(&self, graph: &mut SceneGraph, visible: bool) {
        if let Some(group) = graph.get_mut(self.group) {
            group.visible = visible;
        }
    }

    pub fn is_visible(&self, graph: &SceneGraph) -> bool {
        graph.get(self.group).map(|n| n.visible).unwrap_or(false)
    }
}
