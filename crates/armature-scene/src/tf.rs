//! Frame tree resolver
//!
//! Maintains named coordinate frames as scene nodes fed by streaming
//! transform batches. Frames come into being lazily the first time any
//! edge references their name, from either side, and are never removed -
//! an edge absent from later batches only hides the frame's connector
//! visual. Topology is last-message-wins: an edge naming a new parent
//! reparents the child.

use std::collections::HashMap;

use armature_core::TfMsg;
use tracing::{debug, warn};

use crate::graph::{NodeId, SceneError, SceneGraph, SceneNode};
use crate::primitives::{Arrow, ArrowProps};
use crate::transform::apply_transform;

/// Frames closer than this to their parent are treated as co-located and
/// render no connector
const MIN_CONNECTOR_OFFSET: f32 = 0.01;

const CONNECTOR_PROPS: ArrowProps = ArrowProps {
    length: 1.0,
    shaft_diameter: 0.01,
    head_diameter: 0.02,
    head_length: 0.05,
};

struct FrameEntry {
    node: NodeId,
    connector: Arrow,
}

/// The tree of named coordinate frames under one attachment point
pub struct FrameTree {
    parent: NodeId,
    frames: HashMap<String, FrameEntry>,
}

impl FrameTree {
    /// Frames attach under `parent` until an edge reparents them
    pub fn new(parent: NodeId) -> Self {
        Self {
            parent,
            frames: HashMap::new(),
        }
    }

    pub fn frame(&self, name: &str) -> Option<NodeId> {
        self.frames.get(name).map(|e| e.node)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Look up a frame node, creating it at the origin if unseen
    pub fn get_or_create_frame(
        &mut self,
        graph: &mut SceneGraph,
        name: &str,
    ) -> Result<NodeId, SceneError> {
        if let Some(entry) = self.frames.get(name) {
            return Ok(entry.node);
        }
        let node = graph.insert(SceneNode::group().named(name), Some(self.parent))?;
        let connector = Arrow::build(graph, Some(node), CONNECTOR_PROPS)?;
        connector.set_visible(graph, false);
        debug!(frame = %name, "Frame created");
        self.frames.insert(
            name.to_string(),
            FrameEntry { node, connector },
        );
        Ok(node)
    }

    /// Apply a batch of parent->child edges. Connectors of frames not
    /// touched by this batch end up hidden: everything is marked stale
    /// first, then each processed edge un-hides its child's connector.
    pub fn update(&mut self, graph: &mut SceneGraph, msg: &TfMsg) -> Result<(), SceneError> {
        for entry in self.frames.values() {
            entry.connector.set_visible(graph, false);
        }

        for edge in &msg.transforms {
            let parent_name = edge.header.frame_id.as_str();
            let child_name = edge.child_frame_id.as_str();
            if parent_name.is_empty() || child_name.is_empty() || parent_name == child_name {
                debug!(parent = %parent_name, child = %child_name, "Skipping degenerate transform edge");
                continue;
            }

            let parent = self.get_or_create_frame(graph, parent_name)?;
            let child = self.get_or_create_frame(graph, child_name)?;
            if let Err(e) = graph.set_parent(child, Some(parent)) {
                warn!(parent = %parent_name, child = %child_name, error = %e, "Skipping transform edge");
                continue;
            }
            apply_transform(graph, child, &edge.transform);
            self.update_connector(graph, child_name);
        }
        Ok(())
    }

    /// Point the child's connector back at its parent's origin, spanning
    /// exactly the offset distance; co-located frames keep it hidden
    fn update_connector(&self, graph: &mut SceneGraph, child_name: &str) {
        let Some(entry) = self.frames.get(child_name) else {
            return;
        };
        let (offset, rotation) = match graph.get(entry.node) {
            Some(node) => (node.translation, node.rotation),
            None => return,
        };
        let distance = offset.length();
        if distance < MIN_CONNECTOR_OFFSET {
            return;
        }
        // the parent's origin, seen from the child's local space
        let toward_parent = rotation.inverse() * (-offset);
        entry.connector.point_along(graph, toward_parent);
        entry.connector.set_total_length(graph, distance);
        entry.connector.set_visible(graph, true);
    }

    #[cfg(test)]
    fn connector_visible(&self, graph: &SceneGraph, name: &str) -> Option<bool> {
        self.frames.get(name).map(|e| e.connector.is_visible(graph))
    }
}
