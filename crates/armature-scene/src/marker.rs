//! Marker manager: identity-keyed reconciliation of renderable objects
//!
//! Each marker identity `(namespace, id)` maps to at most one live pooled
//! object. Per identity the state machine is absent -> live -> (expired |
//! explicitly-removed) -> absent; live is the only steady state. Geometry
//! kind is immutable post-creation - a message carrying a different kind
//! for a live identity destroys and recreates the object under the same
//! identity.

use std::collections::HashMap;
use std::time::Instant;

use armature_core::{MarkerAction, MarkerKey, MarkerKind, MarkerMsg, TransformMsg};
use glam::Vec3;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::graph::{NodeId, NodePayload, SceneError, SceneGraph, SceneNode, ShapeKind};
use crate::lifetime::LifetimeTracker;
use crate::pool::PointPool;
use crate::primitives::{y_to_z, Arrow, ArrowProps};
use crate::transform::{apply_scale, apply_transform};

#[derive(Error, Debug)]
pub enum MarkerError {
    #[error("No marker with identity {0}")]
    UnknownMarker(MarkerKey),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Change notifications, drained by the host after each batch of updates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerEvent {
    /// A namespace was observed for the first time
    NamespaceAdded(String),
    /// All pooled state was dropped
    Reset,
}

/// A live pooled object
struct MarkerObject {
    kind: MarkerKind,
    node: NodeId,
    /// Child pool for the per-item list kinds (cube list, sphere list)
    pool: Option<PointPool>,
}

/// The reconciliation engine for one marker topic
pub struct MarkerManager {
    root: NodeId,
    markers: HashMap<MarkerKey, MarkerObject>,
    namespaces: HashMap<String, bool>,
    lifetimes: LifetimeTracker<MarkerKey>,
    events: Vec<MarkerEvent>,
}

impl MarkerManager {
    /// Create a manager whose objects live under a fresh group node,
    /// attached under `parent` (or at the scene root)
    pub fn new(graph: &mut SceneGraph, parent: Option<NodeId>) -> Result<Self, SceneError> {
        let root = graph.insert(SceneNode::group(), parent)?;
        Ok(Self {
            root,
            markers: HashMap::new(),
            namespaces: HashMap::new(),
            lifetimes: LifetimeTracker::new(),
            events: Vec::new(),
        })
    }

    /// Group node all pooled objects hang from
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Route a message by its action code
    pub fn apply_action(
        &mut self,
        graph: &mut SceneGraph,
        msg: &MarkerMsg,
        now: Instant,
    ) -> Result<(), MarkerError> {
        match MarkerAction::from_code(msg.action) {
            Some(MarkerAction::Add) => self.update(graph, msg, now),
            Some(MarkerAction::Delete) => self.remove(graph, &msg.key()),
            Some(MarkerAction::DeleteAll) => {
                self.reset(graph);
                Ok(())
            }
            None => {
                warn!(action = msg.action, marker = %msg.key(), "Unknown marker action, dropping message");
                Ok(())
            }
        }
    }

    /// Reconcile one marker message into the pool
    pub fn update(
        &mut self,
        graph: &mut SceneGraph,
        msg: &MarkerMsg,
        now: Instant,
    ) -> Result<(), MarkerError> {
        let key = msg.key();
        let kind = MarkerKind::from_code(msg.kind).unwrap_or_else(|| {
            warn!(code = msg.kind, marker = %key, "Unknown marker type, rendering as arrow");
            MarkerKind::Arrow
        });

        let kind_changed = self
            .markers
            .get(&key)
            .map(|existing| existing.kind != kind)
            .unwrap_or(false);
        if kind_changed {
            debug!(marker = %key, "Marker type changed, rebuilding");
            if let Some(existing) = self.markers.remove(&key) {
                graph.remove(existing.node)?;
            }
        }

        self.observe_namespace(&key.ns);

        if !self.markers.contains_key(&key) {
            let object = Self::construct(graph, self.root, kind, msg)?;
            debug!(marker = %key, ?kind, "Marker created");
            self.markers.insert(key.clone(), object);
        }
        let object = self
            .markers
            .get_mut(&key)
            .ok_or_else(|| MarkerError::UnknownMarker(key.clone()))?;

        if kind.is_vertex_driven() {
            // shape fully defined by the vertex list; pose and scale are
            // not applied independently, but the message scale still sizes
            // line width / point size / per-item dimensions
            Self::update_vertices(graph, object, kind, msg)?;
        } else {
            apply_transform(graph, object.node, &TransformMsg::from(&msg.pose));
            apply_scale(graph, object.node, &msg.scale);
            if msg.colors.is_empty() {
                graph.set_subtree_color(object.node, msg.color);
            }
            if kind == MarkerKind::Text {
                if let Some(node) = graph.get_mut(object.node) {
                    node.payload = NodePayload::Text {
                        text: msg.text.clone(),
                        height: msg.scale.z as f32,
                    };
                }
            }
        }

        let visible = self.namespaces.get(&key.ns).copied().unwrap_or(true);
        if let Some(node) = graph.get_mut(object.node) {
            node.visible = visible;
        }

        self.lifetimes
            .track(key, msg.lifetime.as_secs_f64(), now);
        Ok(())
    }

    /// Explicitly remove a live identity. Removing an identity that was
    /// never seen is a manager-invariant violation and fails loudly.
    pub fn remove(&mut self, graph: &mut SceneGraph, key: &MarkerKey) -> Result<(), MarkerError> {
        let object = self.markers.remove(key).ok_or_else(|| {
            warn!(marker = %key, "Removal of unknown marker identity");
            MarkerError::UnknownMarker(key.clone())
        })?;
        self.lifetimes.untrack(key);
        graph.remove(object.node)?;
        debug!(marker = %key, "Marker removed");
        Ok(())
    }

    /// Drop every pooled object, all timers, and the namespace map
    pub fn reset(&mut self, graph: &mut SceneGraph) {
        for (_, object) in self.markers.drain() {
            let _ = graph.remove(object.node);
        }
        self.namespaces.clear();
        self.lifetimes.clear();
        self.events.push(MarkerEvent::Reset);
        info!("Marker manager reset");
    }

    /// Expire overdue identities; returns how many were removed
    pub fn poll(&mut self, graph: &mut SceneGraph, now: Instant) -> usize {
        let expired = self.lifetimes.poll(now);
        let count = expired.len();
        for key in expired {
            debug!(marker = %key, "Marker lifetime expired");
            if let Some(object) = self.markers.remove(&key) {
                let _ = graph.remove(object.node);
            }
        }
        count
    }

    /// Show or hide every object in one namespace
    pub fn set_namespace_visible(&mut self, graph: &mut SceneGraph, ns: &str, visible: bool) {
        self.namespaces.insert(ns.to_string(), visible);
        self.apply_visibility(graph);
    }

    /// Replace the visibility map wholesale and re-apply it to every
    /// pooled object
    pub fn update_options(&mut self, graph: &mut SceneGraph, namespaces: HashMap<String, bool>) {
        self.namespaces = namespaces;
        // namespaces of live objects always have an entry
        for key in self.markers.keys() {
            self.namespaces.entry(key.ns.clone()).or_insert(true);
        }
        self.apply_visibility(graph);
    }

    pub fn namespaces(&self) -> &HashMap<String, bool> {
        &self.namespaces
    }

    pub fn contains(&self, key: &MarkerKey) -> bool {
        self.markers.contains_key(key)
    }

    pub fn node_of(&self, key: &MarkerKey) -> Option<NodeId> {
        self.markers.get(key).map(|o| o.node)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Take the pending change notifications
    pub fn drain_events(&mut self) -> Vec<MarkerEvent> {
        std::mem::take(&mut self.events)
    }

    fn observe_namespace(&mut self, ns: &str) {
        if !self.namespaces.contains_key(ns) {
            self.namespaces.insert(ns.to_string(), true);
            self.events.push(MarkerEvent::NamespaceAdded(ns.to_string()));
            debug!(ns = %ns, "New marker namespace observed");
        }
    }

    fn apply_visibility(&self, graph: &mut SceneGraph) {
        for (key, object) in &self.markers {
            let visible = self.namespaces.get(&key.ns).copied().unwrap_or(true);
            if let Some(node) = graph.get_mut(object.node) {
                node.visible = visible;
            }
        }
    }

    /// Table-driven construction for each geometry kind
    fn construct(
        graph: &mut SceneGraph,
        root: NodeId,
        kind: MarkerKind,
        msg: &MarkerMsg,
    ) -> Result<MarkerObject, SceneError> {
        let name = msg.key().node_name();
        let (node, pool) = match kind {
            MarkerKind::Arrow => {
                let node = graph.insert(SceneNode::group().named(name), Some(root))?;
                // wire arrows run along +X
                let arrow = Arrow::build(graph, Some(node), ArrowProps::default())?;
                arrow.point_along(graph, Vec3::X);
                (node, None)
            }
            MarkerKind::Cube => {
                let node = graph.insert(
                    SceneNode::new(NodePayload::Shape(ShapeKind::Cube)).named(name),
                    Some(root),
                )?;
                (node, None)
            }
            MarkerKind::Sphere => {
                let node = graph.insert(
                    SceneNode::new(NodePayload::Shape(ShapeKind::Sphere)).named(name),
                    Some(root),
                )?;
                (node, None)
            }
            MarkerKind::Cylinder => {
                // unit shapes are Y-aligned; wire cylinders run along Z,
                // hence the extra group with a quarter-turned child
                let node = graph.insert(SceneNode::group().named(name), Some(root))?;
                graph.insert(
                    SceneNode::new(NodePayload::Shape(ShapeKind::Cylinder)).rotated(y_to_z()),
                    Some(node),
                )?;
                (node, None)
            }
            MarkerKind::LineStrip | MarkerKind::LineList => {
                let node = graph.insert(
                    SceneNode::new(NodePayload::Lines {
                        points: Vec::new(),
                        colors: Vec::new(),
                        width: 0.0,
                        strip: kind == MarkerKind::LineStrip,
                    })
                    .named(name),
                    Some(root),
                )?;
                (node, None)
            }
            MarkerKind::Points => {
                let node = graph.insert(
                    SceneNode::new(NodePayload::PointSprites {
                        points: Vec::new(),
                        colors: Vec::new(),
                        size: 0.0,
                    })
                    .named(name),
                    Some(root),
                )?;
                (node, None)
            }
            MarkerKind::TriangleList => {
                let node = graph.insert(
                    SceneNode::new(NodePayload::Mesh {
                        vertices: Vec::new(),
                        colors: Vec::new(),
                    })
                    .named(name),
                    Some(root),
                )?;
                (node, None)
            }
            MarkerKind::CubeList | MarkerKind::SphereList => {
                let node = graph.insert(SceneNode::group().named(name), Some(root))?;
                let shape = if kind == MarkerKind::CubeList {
                    ShapeKind::Cube
                } else {
                    ShapeKind::Sphere
                };
                (node, Some(PointPool::new(node, shape)))
            }
            MarkerKind::Text => {
                let node = graph.insert(
                    SceneNode::new(NodePayload::Text {
                        text: msg.text.clone(),
                        height: msg.scale.z as f32,
                    })
                    .named(name),
                    Some(root),
                )?;
                (node, None)
            }
        };
        Ok(MarkerObject { kind, node, pool })
    }

    fn update_vertices(
        graph: &mut SceneGraph,
        object: &mut MarkerObject,
        kind: MarkerKind,
        msg: &MarkerMsg,
    ) -> Result<(), SceneError> {
        match kind {
            MarkerKind::CubeList | MarkerKind::SphereList => {
                if let Some(pool) = object.pool.as_mut() {
                    pool.reconcile(
                        graph,
                        &msg.points,
                        &msg.colors,
                        msg.color,
                        msg.scale.to_vec3(),
                    )?;
                }
            }
            _ => {
                let points: Vec<Vec3> = msg.points.iter().map(|p| p.to_vec3()).collect();
                if let Some(node) = graph.get_mut(object.node) {
                    node.payload = match kind {
                        MarkerKind::LineStrip | MarkerKind::LineList => NodePayload::Lines {
                            points,
                            colors: msg.colors.clone(),
                            width: msg.scale.x as f32,
                            strip: kind == MarkerKind::LineStrip,
                        },
                        MarkerKind::Points => NodePayload::PointSprites {
                            points,
                            colors: msg.colors.clone(),
                            size: msg.scale.x as f32,
                        },
                        _ => NodePayload::Mesh {
                            vertices: points,
                            colors: msg.colors.clone(),
                        },
                    };
                    if msg.colors.is_empty() {
                        node.color = msg.color;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armature_core::{ColorRgba, PointMsg, RosDuration, Vector3Msg};
    use std::time::Duration;

    fn marker(ns: &str, id: i32, kind: MarkerKind) -> MarkerMsg {
        MarkerMsg {
            ns: ns.to_string(),
            id,
            kind: kind.code(),
            scale: Vector3Msg::new(1.0, 1.0, 1.0),
            ..Default::default()
        }
    }

    fn setup() -> (SceneGraph, MarkerManager) {
        let mut graph = SceneGraph::new();
        let manager = MarkerManager::new(&mut graph, None).unwrap();
        (graph, manager)
    }

    #[test]
    fn test_identity_uniqueness() {
        let (mut graph, mut manager) = setup();
        let now = Instant::now();

        for _ in 0..3 {
            manager
                .update(&mut graph, &marker("ns", 1, MarkerKind::Cube), now)
                .unwrap();
        }
        assert_eq!(manager.len(), 1);
        // one named node in the graph for this identity
        assert!(graph.get_by_name("ns/1").is_some());
    }

    #[test]
    fn test_kind_change_rebuilds_object() {
        let (mut graph, mut manager) = setup();
        let now = Instant::now();

        manager
            .update(&mut graph, &marker("ns", 1, MarkerKind::Cube), now)
            .unwrap();
        let old = manager.node_of(&MarkerKey::new("ns", 1)).unwrap();

        manager
            .update(&mut graph, &marker("ns", 1, MarkerKind::Sphere), now)
            .unwrap();
        let new = manager.node_of(&MarkerKey::new("ns", 1)).unwrap();

        assert_eq!(manager.len(), 1);
        assert_ne!(old, new);
        assert!(graph.get(old).is_none(), "old cube must be detached");
        assert_eq!(
            graph.get(new).unwrap().payload,
            NodePayload::Shape(ShapeKind::Sphere)
        );
    }

    #[test]
    fn test_namespace_visibility_propagation() {
        let (mut graph, mut manager) = setup();
        let now = Instant::now();

        manager
            .update(&mut graph, &marker("foo", 1, MarkerKind::Cube), now)
            .unwrap();
        manager
            .update(&mut graph, &marker("foo", 2, MarkerKind::Cube), now)
            .unwrap();
        manager
            .update(&mut graph, &marker("bar", 1, MarkerKind::Cube), now)
            .unwrap();

        manager.set_namespace_visible(&mut graph, "foo", false);

        let foo1 = manager.node_of(&MarkerKey::new("foo", 1)).unwrap();
        let foo2 = manager.node_of(&MarkerKey::new("foo", 2)).unwrap();
        let bar1 = manager.node_of(&MarkerKey::new("bar", 1)).unwrap();
        assert_eq!(graph.is_visible(foo1), Some(false));
        assert_eq!(graph.is_visible(foo2), Some(false));
        assert_eq!(graph.is_visible(bar1), Some(true));

        // a later update re-applies the stored visibility
        manager
            .update(&mut graph, &marker("foo", 1, MarkerKind::Cube), now)
            .unwrap();
        assert_eq!(graph.is_visible(foo1), Some(false));
    }

    #[test]
    fn test_new_namespace_event_fires_once() {
        let (mut graph, mut manager) = setup();
        let now = Instant::now();

        manager
            .update(&mut graph, &marker("ns", 1, MarkerKind::Cube), now)
            .unwrap();
        manager
            .update(&mut graph, &marker("ns", 2, MarkerKind::Cube), now)
            .unwrap();

        assert_eq!(
            manager.drain_events(),
            vec![MarkerEvent::NamespaceAdded("ns".to_string())]
        );
        assert!(manager.drain_events().is_empty());
    }

    #[test]
    fn test_remove_unknown_identity_fails_loudly() {
        let (mut graph, mut manager) = setup();
        let err = manager
            .remove(&mut graph, &MarkerKey::new("ghost", 9))
            .unwrap_err();
        assert!(matches!(err, MarkerError::UnknownMarker(_)));
    }

    #[test]
    fn test_delete_and_deleteall_actions() {
        let (mut graph, mut manager) = setup();
        let now = Instant::now();

        manager
            .update(&mut graph, &marker("ns", 1, MarkerKind::Cube), now)
            .unwrap();
        manager
            .update(&mut graph, &marker("ns", 2, MarkerKind::Cube), now)
            .unwrap();

        let mut delete = marker("ns", 1, MarkerKind::Cube);
        delete.action = 2;
        manager.apply_action(&mut graph, &delete, now).unwrap();
        assert!(!manager.contains(&MarkerKey::new("ns", 1)));
        assert_eq!(manager.len(), 1);

        let mut delete_all = marker("ns", 2, MarkerKind::Cube);
        delete_all.action = 3;
        manager.apply_action(&mut graph, &delete_all, now).unwrap();
        assert!(manager.is_empty());
        assert!(manager.namespaces().is_empty());
    }

    #[test]
    fn test_lifetime_expiry() {
        let (mut graph, mut manager) = setup();
        let t0 = Instant::now();

        let mut msg = marker("ns", 1, MarkerKind::Cube);
        msg.lifetime = RosDuration::from_secs(1);
        manager.update(&mut graph, &msg, t0).unwrap();

        assert_eq!(manager.poll(&mut graph, t0 + Duration::from_millis(900)), 0);
        assert_eq!(manager.poll(&mut graph, t0 + Duration::from_millis(1000)), 1);
        assert!(manager.is_empty());
        assert!(graph.get_by_name("ns/1").is_none());
    }

    #[test]
    fn test_lifetime_refresh_pushes_deadline() {
        let (mut graph, mut manager) = setup();
        let t0 = Instant::now();

        let mut msg = marker("ns", 1, MarkerKind::Cube);
        msg.lifetime = RosDuration::from_secs(1);
        manager.update(&mut graph, &msg, t0).unwrap();
        assert_eq!(manager.poll(&mut graph, t0 + Duration::from_millis(400)), 0);

        // refresh at 0.5s; the original 1s mark must not fire
        manager
            .update(&mut graph, &msg, t0 + Duration::from_millis(500))
            .unwrap();
        assert_eq!(manager.poll(&mut graph, t0 + Duration::from_millis(1200)), 0);
        assert_eq!(manager.poll(&mut graph, t0 + Duration::from_millis(1500)), 1);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_zero_lifetime_never_expires() {
        let (mut graph, mut manager) = setup();
        let t0 = Instant::now();

        manager
            .update(&mut graph, &marker("ns", 1, MarkerKind::Cube), t0)
            .unwrap();
        assert_eq!(manager.poll(&mut graph, t0 + Duration::from_secs(3600)), 0);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_vertex_driven_marker_skips_pose() {
        let (mut graph, mut manager) = setup();
        let now = Instant::now();

        let mut msg = marker("lines", 1, MarkerKind::LineStrip);
        msg.pose.position = PointMsg::new(5.0, 5.0, 5.0);
        msg.scale = Vector3Msg::new(0.1, 0.0, 0.0);
        msg.points = vec![PointMsg::new(0.0, 0.0, 0.0), PointMsg::new(1.0, 0.0, 0.0)];
        manager.update(&mut graph, &msg, now).unwrap();

        let node = graph
            .get(manager.node_of(&MarkerKey::new("lines", 1)).unwrap())
            .unwrap();
        assert_eq!(node.translation, Vec3::ZERO, "pose must not move list types");
        match &node.payload {
            NodePayload::Lines {
                points,
                width,
                strip,
                ..
            } => {
                assert_eq!(points.len(), 2);
                assert!(*strip);
                assert_eq!(*width, 0.1);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_sphere_list_pools_children() {
        let (mut graph, mut manager) = setup();
        let now = Instant::now();

        let mut msg = marker("blobs", 1, MarkerKind::SphereList);
        msg.points = vec![
            PointMsg::new(0.0, 0.0, 0.0),
            PointMsg::new(1.0, 0.0, 0.0),
            PointMsg::new(2.0, 0.0, 0.0),
        ];
        msg.color = ColorRgba::rgb(0.0, 1.0, 0.0);
        manager.update(&mut graph, &msg, now).unwrap();

        let node_id = manager.node_of(&MarkerKey::new("blobs", 1)).unwrap();
        assert_eq!(graph.get(node_id).unwrap().children().len(), 3);

        msg.points.truncate(1);
        manager.update(&mut graph, &msg, now).unwrap();
        let children = graph.get(node_id).unwrap().children().to_vec();
        assert_eq!(children.len(), 3, "shrink retains hidden children");
        assert_eq!(graph.get(children[0]).unwrap().visible, true);
        assert_eq!(graph.get(children[2]).unwrap().visible, false);
    }

    #[test]
    fn test_unknown_kind_falls_back_to_arrow() {
        let (mut graph, mut manager) = setup();
        let now = Instant::now();

        let mut msg = marker("ns", 1, MarkerKind::Cube);
        msg.kind = 99;
        manager.update(&mut graph, &msg, now).unwrap();

        let node = graph
            .get(manager.node_of(&MarkerKey::new("ns", 1)).unwrap())
            .unwrap();
        // arrow markers are a group holding the shaft+head composite
        assert_eq!(node.payload, NodePayload::Group);
        assert_eq!(node.children().len(), 1);
    }

    #[test]
    fn test_update_options_wholesale_replace() {
        let (mut graph, mut manager) = setup();
        let now = Instant::now();

        manager
            .update(&mut graph, &marker("a", 1, MarkerKind::Cube), now)
            .unwrap();
        manager
            .update(&mut graph, &marker("b", 1, MarkerKind::Cube), now)
            .unwrap();

        let mut namespaces = HashMap::new();
        namespaces.insert("a".to_string(), false);
        manager.update_options(&mut graph, namespaces);

        let a = manager.node_of(&MarkerKey::new("a", 1)).unwrap();
        let b = manager.node_of(&MarkerKey::new("b", 1)).unwrap();
        assert_eq!(graph.is_visible(a), Some(false));
        // "b" was not in the new map; live namespaces keep an entry and
        // default back to visible
        assert_eq!(graph.is_visible(b), Some(true));
        assert_eq!(manager.namespaces().get("b"), Some(&true));
    }

    #[test]
    fn test_reset_clears_everything() {
        let (mut graph, mut manager) = setup();
        let now = Instant::now();

        let mut msg = marker("ns", 1, MarkerKind::Cube);
        msg.lifetime = RosDuration::from_secs(5);
        manager.update(&mut graph, &msg, now).unwrap();
        manager.drain_events();

        manager.reset(&mut graph);
        assert!(manager.is_empty());
        assert!(manager.namespaces().is_empty());
        assert!(graph.get_by_name("ns/1").is_none());
        assert_eq!(manager.drain_events(), vec![MarkerEvent::Reset]);
    }
}
