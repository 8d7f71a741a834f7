//! Armature Scene - the marker/scene synchronization engine
//!
//! This crate maintains a retained scene graph that a hosting render loop
//! reads. Typed telemetry messages are reconciled into the graph in place:
//! - A coordinate-frame tree fed by streaming transform updates, with a
//!   viewport wrapper re-aligned to a selected fixed frame
//! - A namespace-partitioned pool of marker objects keyed by message
//!   identity, with lifetime-based expiry
//!
//! Everything runs on a single cooperative loop: message handlers and the
//! expiry poll are plain synchronous calls, and the graph is left in a
//! consistent, renderable state at the end of each one.

pub mod client;
pub mod graph;
pub mod lifetime;
pub mod marker;
pub mod pool;
pub mod primitives;
pub mod tf;
pub mod transform;
pub mod viewer;

pub use client::{ClientError, DataSource, MarkerArrayClient, MarkerClient, SubscriptionId, TfClient};
pub use graph::{NodeId, NodePayload, SceneError, SceneGraph, SceneNode, ShapeKind};
pub use lifetime::LifetimeTracker;
pub use marker::{MarkerError, MarkerEvent, MarkerManager};
pub use pool::PointPool;
pub use primitives::{Arrow, ArrowProps};
pub use tf::FrameTree;
pub use transform::{apply_color, apply_flat_color, apply_scale, apply_transform};
pub use viewer::{Viewer, ViewerOptions};
