//! Viewport ownership and fixed-frame alignment
//!
//! The viewer owns the scene graph and a wrapper node everything renders
//! under. Selecting a fixed frame re-derives the wrapper pose so that
//! frame appears at the origin with identity orientation, however deep it
//! sits in the frame tree.

use armature_core::TfMsg;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::graph::{NodeId, SceneError, SceneGraph, SceneNode};
use crate::tf::FrameTree;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewerOptions {
    /// Name of the frame to render at the origin; `None` leaves the
    /// wrapper as an identity passthrough
    #[serde(default)]
    pub fixed_frame: Option<String>,
}

pub struct Viewer {
    graph: SceneGraph,
    wrapper: NodeId,
    frames: FrameTree,
    fixed_frame: Option<String>,
}

impl Viewer {
    pub fn new(options: ViewerOptions) -> Result<Self, SceneError> {
        let mut graph = SceneGraph::new();
        let wrapper = graph.insert(SceneNode::group().named("viewport"), None)?;
        let frames = FrameTree::new(wrapper);
        let mut viewer = Self {
            graph,
            wrapper,
            frames,
            fixed_frame: options.fixed_frame,
        };
        viewer.align_to_fixed_frame()?;
        Ok(viewer)
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    /// Node the render loop treats as the scene; marker managers and the
    /// frame tree hang under it
    pub fn wrapper(&self) -> NodeId {
        self.wrapper
    }

    pub fn frames(&self) -> &FrameTree {
        &self.frames
    }

    pub fn fixed_frame(&self) -> Option<&str> {
        self.fixed_frame.as_deref()
    }

    pub fn set_fixed_frame(&mut self, frame: Option<String>) -> Result<(), SceneError> {
        info!(frame = ?frame, "Fixed frame selection changed");
        self.fixed_frame = frame;
        self.align_to_fixed_frame()
    }

    /// Feed a transform batch through the frame tree, then re-derive the
    /// wrapper pose (any edge may have moved the selected frame)
    pub fn update_transforms(&mut self, msg: &TfMsg) -> Result<(), SceneError> {
        self.frames.update(&mut self.graph, msg)?;
        self.align_to_fixed_frame()
    }

    /// Re-derive the wrapper pose from the selected frame's current world
    /// transform. Selection never fails silently: an unseen frame name is
    /// created at the origin here.
    pub fn align_to_fixed_frame(&mut self) -> Result<(), SceneError> {
        let Some(name) = self.fixed_frame.clone() else {
            return Ok(());
        };
        let frame = self.frames.get_or_create_frame(&mut self.graph, &name)?;

        if let Some(wrapper) = self.graph.get_mut(self.wrapper) {
            wrapper.translation = Vec3::ZERO;
            wrapper.rotation = Quat::IDENTITY;
        }
        self.graph.update_world();

        let orientation = self.graph.world_rotation(frame).unwrap_or(Quat::IDENTITY);
        if let Some(wrapper) = self.graph.get_mut(self.wrapper) {
            wrapper.rotation = orientation.conjugate();
        }
        self.graph.update_world();

        let position = self.graph.world_position(frame).unwrap_or(Vec3::ZERO);
        if let Some(wrapper) = self.graph.get_mut(self.wrapper) {
            wrapper.translation = -position;
        }
        self.graph.update_world();

        debug!(frame = %name, "Viewport aligned to fixed frame");
        Ok(())
    }
}
