//! Update rate control for snapshot subscriptions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a subscriber wants to hear about snapshot changes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum UpdateRate {
    /// Every change, as soon as it is applied
    Immediate,

    /// At most this many updates per second (latest wins)
    Max(u32),
}

impl UpdateRate {
    /// Normalize the rate. `Max(0)` makes no sense and is treated as `Immediate`.
    pub fn normalize(self) -> Self {
        match self {
            UpdateRate::Max(0) => UpdateRate::Immediate,
            other => other,
        }
    }

    /// Get throttle interval if needed
    pub fn throttle_interval(self) -> Option<Duration> {
        match self.normalize() {
            UpdateRate::Immediate => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / f64::from(hz))),
        }
    }
}
