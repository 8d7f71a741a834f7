//! Pose, scale, and color application utilities
//!
//! These are deliberately infallible: malformed numeric input (NaN
//! components) propagates into the node and yields invisible or
//! mispositioned geometry, never a failure of the update path.

use armature_core::{ColorRgba, ColorSpec, TransformMsg, Vector3Msg};
use tracing::warn;

use crate::graph::{NodeId, SceneGraph};

/// Set a node's local pose from a wire transform. The rotation is always
/// normalized first; upstream quaternions are not guaranteed unit length,
/// and an unnormalized orientation corrupts every descendant transform.
pub fn apply_transform(graph: &mut SceneGraph, id: NodeId, tf: &TransformMsg) {
    if let Some(node) = graph.get_mut(id) {
        node.translation = tf.translation.to_vec3();
        node.rotation = tf.rotation.to_quat_normalized();
    }
}

/// Set a node's non-uniform scale directly
pub fn apply_scale(graph: &mut SceneGraph, id: NodeId, scale: &Vector3Msg) {
    if let Some(node) = graph.get_mut(id) {
        node.scale = scale.to_vec3();
    }
}

/// Flat-color a node and its subtree
pub fn apply_flat_color(graph: &mut SceneGraph, id: NodeId, color: ColorRgba) {
    graph.set_subtree_color(id, color);
}

/// Apply a color given as either a named/hex string or an RGB triple;
/// an unresolvable name leaves the current color in place
pub fn apply_color(graph: &mut SceneGraph, id: NodeId, spec: &ColorSpec) {
    match spec.resolve() {
        Ok(color) => apply_flat_color(graph, id, color),
        Err(e) => warn!(error = %e, "Ignoring unresolvable color"),
    }
}
