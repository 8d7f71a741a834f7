//! ROS-style time stamps and durations

use serde::{Deserialize, Serialize};

/// A message time stamp: whole seconds plus nanoseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosTime {
    pub secs: u32,
    pub nsecs: u32,
}

impl RosTime {
    pub const ZERO: RosTime = RosTime { secs: 0, nsecs: 0 };

    pub fn new(secs: u32, nsecs: u32) -> Self {
        Self { secs, nsecs }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.secs as f64 + self.nsecs as f64 * 1e-9
    }
}

/// A signed duration, used for marker lifetimes (zero means "never expire")
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosDuration {
    pub secs: i32,
    pub nsecs: i32,
}

impl RosDuration {
    pub const ZERO: RosDuration = RosDuration { secs: 0, nsecs: 0 };

    pub fn from_secs(secs: i32) -> Self {
        Self { secs, nsecs: 0 }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.secs as f64 + self.nsecs as f64 * 1e-9
    }

    pub fn is_zero(&self) -> bool {
        self.secs == 0 && self.nsecs == 0
    }
}
