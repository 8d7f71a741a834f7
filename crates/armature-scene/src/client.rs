//! Topic clients: the seam between the transport and the scene engine
//!
//! The transport itself is out of scope; a host implements [`DataSource`]
//! and forwards each topic's JSON payloads to the matching client's
//! `handle`. Unsubscribing stops further handling but never clears pooled
//! state - a paused topic keeps its rendered history until an explicit
//! reset.

use std::time::Instant;

use armature_core::{MarkerArrayMsg, MarkerMsg, TfMsg};
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::graph::{NodeId, SceneError, SceneGraph};
use crate::marker::{MarkerError, MarkerManager};
use crate::viewer::Viewer;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to decode message on {topic}: {source}")]
    Decode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Marker(#[from] MarkerError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Opaque handle for one topic subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(uuid::Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// The publish/subscribe transport abstraction, implemented by the host
pub trait DataSource {
    fn subscribe(&mut self, topic: &str) -> SubscriptionId;
    fn unsubscribe(&mut self, id: SubscriptionId);
}

/// Client for a single-marker topic
pub struct MarkerClient {
    topic: String,
    subscription: Option<SubscriptionId>,
    manager: MarkerManager,
    last_message_at: Option<DateTime<Utc>>,
}

impl MarkerClient {
    pub fn new(
        graph: &mut SceneGraph,
        parent: Option<NodeId>,
        topic: impl Into<String>,
    ) -> Result<Self, SceneError> {
        Ok(Self {
            topic: topic.into(),
            subscription: None,
            manager: MarkerManager::new(graph, parent)?,
            last_message_at: None,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn manager(&self) -> &MarkerManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut MarkerManager {
        &mut self.manager
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.last_message_at
    }

    pub fn subscribe(&mut self, source: &mut dyn DataSource) {
        if self.subscription.is_none() {
            self.subscription = Some(source.subscribe(&self.topic));
            info!(topic = %self.topic, "Marker client subscribed");
        }
    }

    pub fn unsubscribe(&mut self, source: &mut dyn DataSource) {
        if let Some(id) = self.subscription.take() {
            source.unsubscribe(id);
            info!(topic = %self.topic, "Marker client unsubscribed");
        }
    }

    /// Decode and reconcile one payload; a bad payload drops that message
    /// without touching client state
    pub fn handle(
        &mut self,
        graph: &mut SceneGraph,
        payload: &Value,
        now: Instant,
    ) -> Result<(), ClientError> {
        if self.subscription.is_none() {
            debug!(topic = %self.topic, "Dropping message for unsubscribed topic");
            return Ok(());
        }
        let msg: MarkerMsg =
            serde_json::from_value(payload.clone()).map_err(|source| ClientError::Decode {
                topic: self.topic.clone(),
                source,
            })?;
        self.last_message_at = Some(Utc::now());
        self.manager.apply_action(graph, &msg, now)?;
        Ok(())
    }
}

/// Client for a marker-array topic
pub struct MarkerArrayClient {
    topic: String,
    subscription: Option<SubscriptionId>,
    manager: MarkerManager,
    last_message_at: Option<DateTime<Utc>>,
}

impl MarkerArrayClient {
    pub fn new(
        graph: &mut SceneGraph,
        parent: Option<NodeId>,
        topic: impl Into<String>,
    ) -> Result<Self, SceneError> {
        Ok(Self {
            topic: topic.into(),
            subscription: None,
            manager: MarkerManager::new(graph, parent)?,
            last_message_at: None,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn manager(&self) -> &MarkerManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut MarkerManager {
        &mut self.manager
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.last_message_at
    }

    pub fn subscribe(&mut self, source: &mut dyn DataSource) {
        if self.subscription.is_none() {
            self.subscription = Some(source.subscribe(&self.topic));
            info!(topic = %self.topic, "Marker array client subscribed");
        }
    }

    pub fn unsubscribe(&mut self, source: &mut dyn DataSource) {
        if let Some(id) = self.subscription.take() {
            source.unsubscribe(id);
            info!(topic = %self.topic, "Marker array client unsubscribed");
        }
    }

    /// Reconcile every marker in the array; a marker that fails (e.g. a
    /// delete for an unknown identity) is dropped with a warning so the
    /// rest of the array still renders
    pub fn handle(
        &mut self,
        graph: &mut SceneGraph,
        payload: &Value,
        now: Instant,
    ) -> Result<(), ClientError> {
        if self.subscription.is_none() {
            debug!(topic = %self.topic, "Dropping message for unsubscribed topic");
            return Ok(());
        }
        let msg: MarkerArrayMsg =
            serde_json::from_value(payload.clone()).map_err(|source| ClientError::Decode {
                topic: self.topic.clone(),
                source,
            })?;
        self.last_message_at = Some(Utc::now());
        for marker in &msg.markers {
            if let Err(e) = self.manager.apply_action(graph, marker, now) {
                warn!(topic = %self.topic, marker = %marker.key(), error = %e, "Dropping marker from array");
            }
        }
        Ok(())
    }
}

/// Client for a transform topic, driving the viewer's frame tree
pub struct TfClient {
    topic: String,
    subscription: Option<SubscriptionId>,
    last_message_at: Option<DateTime<Utc>>,
}

impl TfClient {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            subscription: None,
            last_message_at: None,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.last_message_at
    }

    pub fn subscribe(&mut self, source: &mut dyn DataSource) {
        if self.subscription.is_none() {
            self.subscription = Some(source.subscribe(&self.topic));
            info!(topic = %self.topic, "Transform client subscribed");
        }
    }

    pub fn unsubscribe(&mut self, source: &mut dyn DataSource) {
        if let Some(id) = self.subscription.take() {
            source.unsubscribe(id);
            info!(topic = %self.topic, "Transform client unsubscribed");
        }
    }

    /// Decode a transform batch and run it through the viewer, which also
    /// re-aligns to the fixed frame
    pub fn handle(&mut self, viewer: &mut Viewer, payload: &Value) -> Result<(), ClientError> {
        if self.subscription.is_none() {
            debug!(topic = %self.topic, "Dropping message for unsubscribed topic");
            return Ok(());
        }
        let msg: TfMsg =
            serde_json::from_value(payload.clone()).map_err(|source| ClientError::Decode {
                topic: self.topic.clone(),
                source,
            })?;
        self.last_message_at = Some(Utc::now());
        viewer.update_transforms(&msg)?;
        Ok(())
    }
}
