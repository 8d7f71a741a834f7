//! Mirrors of the rosbridge-style JSON messages consumed by the scene layer
//!
//! Numeric `type`/`action` codes are kept wire-faithful on the message
//! structs; [`MarkerKind`] and [`MarkerAction`] provide the typed view used
//! for dispatch. Unrecognized codes are resolved by the consumer, not here.

use glam::{Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::color::ColorRgba;
use crate::time::{RosDuration, RosTime};

/// Standard message header
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub seq: u32,
    #[serde(default)]
    pub stamp: RosTime,
    #[serde(default)]
    pub frame_id: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Vector3Msg {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Vector3Msg {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_vec3(&self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PointMsg {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl PointMsg {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_vec3(&self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }

    /// Whether all three components carry usable values
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Quaternion as sent on the wire; NOT guaranteed unit length
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QuaternionMsg {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default)]
    pub w: f64,
}

impl QuaternionMsg {
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    /// Normalized quaternion; a degenerate (zero-length) input becomes identity
    pub fn to_quat_normalized(&self) -> Quat {
        let q = Quat::from_xyzw(self.x as f32, self.y as f32, self.z as f32, self.w as f32);
        Vec4::from(q)
            .try_normalize()
            .map(Quat::from_vec4)
            .unwrap_or(Quat::IDENTITY)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoseMsg {
    #[serde(default)]
    pub position: PointMsg,
    #[serde(default)]
    pub orientation: QuaternionMsg,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformMsg {
    #[serde(default)]
    pub translation: Vector3Msg,
    #[serde(default)]
    pub rotation: QuaternionMsg,
}

impl TransformMsg {
    pub fn new(translation: Vector3Msg, rotation: QuaternionMsg) -> Self {
        Self {
            translation,
            rotation,
        }
    }
}

impl From<&PoseMsg> for TransformMsg {
    fn from(pose: &PoseMsg) -> Self {
        Self {
            translation: Vector3Msg::new(pose.position.x, pose.position.y, pose.position.z),
            rotation: pose.orientation,
        }
    }
}

/// A single parent->child frame attachment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformStampedMsg {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub child_frame_id: String,
    #[serde(default)]
    pub transform: TransformMsg,
}

/// A batch of frame attachments, as published on a transform topic
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TfMsg {
    #[serde(default)]
    pub transforms: Vec<TransformStampedMsg>,
}

/// Marker geometry types, a closed enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Arrow,
    Cube,
    Sphere,
    Cylinder,
    LineStrip,
    LineList,
    CubeList,
    SphereList,
    Points,
    Text,
    TriangleList,
}

impl MarkerKind {
    /// Map a wire code to a kind; `None` for codes this library does not render
    pub fn from_code(code: i32) -> Option<MarkerKind> {
        match code {
            0 => Some(MarkerKind::Arrow),
            1 => Some(MarkerKind::Cube),
            2 => Some(MarkerKind::Sphere),
            3 => Some(MarkerKind::Cylinder),
            4 => Some(MarkerKind::LineStrip),
            5 => Some(MarkerKind::LineList),
            6 => Some(MarkerKind::CubeList),
            7 => Some(MarkerKind::SphereList),
            8 => Some(MarkerKind::Points),
            9 => Some(MarkerKind::Text),
            11 => Some(MarkerKind::TriangleList),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            MarkerKind::Arrow => 0,
            MarkerKind::Cube => 1,
            MarkerKind::Sphere => 2,
            MarkerKind::Cylinder => 3,
            MarkerKind::LineStrip => 4,
            MarkerKind::LineList => 5,
            MarkerKind::CubeList => 6,
            MarkerKind::SphereList => 7,
            MarkerKind::Points => 8,
            MarkerKind::Text => 9,
            MarkerKind::TriangleList => 11,
        }
    }

    /// Kinds whose shape is fully defined by their vertex list
    pub fn is_vertex_driven(&self) -> bool {
        matches!(
            self,
            MarkerKind::LineStrip
                | MarkerKind::LineList
                | MarkerKind::CubeList
                | MarkerKind::SphereList
                | MarkerKind::Points
                | MarkerKind::TriangleList
        )
    }

    /// Vertex-driven kinds that still read the message scale, for line
    /// width / point size / per-item dimensions
    pub fn scale_sizes_vertices(&self) -> bool {
        matches!(
            self,
            MarkerKind::LineStrip
                | MarkerKind::LineList
                | MarkerKind::Points
                | MarkerKind::CubeList
                | MarkerKind::SphereList
        )
    }
}

/// Marker message actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerAction {
    Add,
    Delete,
    DeleteAll,
}

impl MarkerAction {
    pub fn from_code(code: i32) -> Option<MarkerAction> {
        match code {
            // 0 covers both ADD and MODIFY on the wire
            0 => Some(MarkerAction::Add),
            2 => Some(MarkerAction::Delete),
            3 => Some(MarkerAction::DeleteAll),
            _ => None,
        }
    }
}

/// Composite marker identity: namespace plus per-namespace numeric id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerKey {
    pub ns: String,
    pub id: i32,
}

impl MarkerKey {
    pub fn new(ns: impl Into<String>, id: i32) -> Self {
        Self { ns: ns.into(), id }
    }

    pub fn namespace(&self) -> &str {
        &self.ns
    }

    /// Unique scene-node name for this identity
    pub fn node_name(&self) -> String {
        format!("{}/{}", self.ns, self.id)
    }
}

impl std::fmt::Display for MarkerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.ns, self.id)
    }
}

/// A single marker message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkerMsg {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub ns: String,
    #[serde(default)]
    pub id: i32,
    /// Geometry type wire code; see [`MarkerKind::from_code`]
    #[serde(rename = "type", default)]
    pub kind: i32,
    /// Action wire code; see [`MarkerAction::from_code`]
    #[serde(default)]
    pub action: i32,
    #[serde(default)]
    pub pose: PoseMsg,
    #[serde(default)]
    pub scale: Vector3Msg,
    #[serde(default)]
    pub color: ColorRgba,
    /// Per-vertex colors; when non-empty these win over `color`
    #[serde(default)]
    pub colors: Vec<ColorRgba>,
    #[serde(default)]
    pub points: Vec<PointMsg>,
    #[serde(default)]
    pub text: String,
    /// Seconds until expiry if not refreshed; zero means never expire
    #[serde(default)]
    pub lifetime: RosDuration,
}

impl MarkerMsg {
    pub fn key(&self) -> MarkerKey {
        MarkerKey::new(self.ns.clone(), self.id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkerArrayMsg {
    #[serde(default)]
    pub markers: Vec<MarkerMsg>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_marker_decode_rosbridge_json() {
        let json = r#"{
            "header": {"seq": 7, "stamp": {"secs": 10, "nsecs": 0}, "frame_id": "map"},
            "ns": "lanes",
            "id": 3,
            "type": 4,
            "action": 0,
            "pose": {"position": {"x": 1.0, "y": 2.0, "z": 0.0},
                     "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0}},
            "scale": {"x": 0.05, "y": 0.0, "z": 0.0},
            "color": {"r": 0.2, "g": 0.9, "b": 0.2, "a": 1.0},
            "points": [{"x": 0.0, "y": 0.0, "z": 0.0}, {"x": 1.0, "y": 0.0, "z": 0.0}],
            "lifetime": {"secs": 2, "nsecs": 0}
        }"#;
        let msg: MarkerMsg = serde_json::from_str(json).unwrap();
        assert_eq!(msg.key(), MarkerKey::new("lanes", 3));
        assert_eq!(MarkerKind::from_code(msg.kind), Some(MarkerKind::LineStrip));
        assert_eq!(MarkerAction::from_code(msg.action), Some(MarkerAction::Add));
        assert_eq!(msg.points.len(), 2);
        assert_relative_eq!(msg.lifetime.as_secs_f64(), 2.0);
    }

    #[test]
    fn test_marker_decode_sparse_json() {
        // rosbridge may omit nearly everything
        let msg: MarkerMsg = serde_json::from_str(r#"{"ns": "a", "id": 1, "type": 2}"#).unwrap();
        assert_eq!(MarkerKind::from_code(msg.kind), Some(MarkerKind::Sphere));
        assert!(msg.points.is_empty());
        assert!(msg.lifetime.is_zero());
    }

    #[test]
    fn test_kind_codes_round_trip() {
        for code in [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 11] {
            let kind = MarkerKind::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        // mesh-resource (10) is handled by the model-loading layer, not here
        assert_eq!(MarkerKind::from_code(10), None);
        assert_eq!(MarkerKind::from_code(42), None);
    }

    #[test]
    fn test_vertex_driven_capabilities() {
        assert!(MarkerKind::LineList.is_vertex_driven());
        assert!(MarkerKind::TriangleList.is_vertex_driven());
        assert!(!MarkerKind::Cube.is_vertex_driven());
        assert!(!MarkerKind::TriangleList.scale_sizes_vertices());
        assert!(MarkerKind::Points.scale_sizes_vertices());
    }

    #[test]
    fn test_quat_normalization() {
        let q = QuaternionMsg::new(0.0, 0.0, 0.0, 2.0).to_quat_normalized();
        assert_relative_eq!(q.w, 1.0);
        assert_relative_eq!(q.x, 0.0);

        let degenerate = QuaternionMsg::default().to_quat_normalized();
        assert_relative_eq!(degenerate.w, 1.0);
    }

    #[test]
    fn test_key_node_name() {
        assert_eq!(MarkerKey::new("robot", 12).node_name(), "robot/12");
        assert_eq!(MarkerKey::new("robot", 12).to_string(), "robot/12");
    }
}
