//! Armature Core - message types and shared leaf types
//!
//! This crate provides the foundational types for the Armature system:
//! - Mirrors of the rosbridge-style JSON messages (markers, transforms)
//! - Marker identity keys
//! - Color representation and named/hex color parsing
//! - ROS-style time stamps and durations

pub mod color;
pub mod msg;
pub mod time;

pub use color::{parse_hex_color, ColorParseError, ColorRgba, ColorSpec};
pub use msg::{
    Header, MarkerAction, MarkerArrayMsg, MarkerKey, MarkerKind, MarkerMsg, PointMsg, PoseMsg,
    QuaternionMsg, TfMsg, TransformMsg, TransformStampedMsg, Vector3Msg,
};
pub use time::{RosDuration, RosTime};
