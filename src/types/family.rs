//! Entity families and their loading state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One independently loaded slice of dashboard state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "snake_case")]
pub enum EntityFamily {
    Drivers,
    Alerts,
    Districts,
    Metrics,
}

impl EntityFamily {
    pub const ALL: [EntityFamily; 4] =
        [EntityFamily::Drivers, EntityFamily::Alerts, EntityFamily::Districts, EntityFamily::Metrics];

    /// Families refreshed on a timer. Districts are load-once reference data.
    pub const POLLED: [EntityFamily; 3] =
        [EntityFamily::Drivers, EntityFamily::Alerts, EntityFamily::Metrics];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityFamily::Drivers => "drivers",
            EntityFamily::Alerts => "alerts",
            EntityFamily::Districts => "districts",
            EntityFamily::Metrics => "metrics",
        }
    }
}

impl fmt::Display for EntityFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot loading state of one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// Last recorded fetch failure, kept for observability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct LoadFailure {
    pub message: String,
    pub retryable: bool,
    pub at: DateTime<Utc>,
}

/// Observable status of a family: state machine position plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct FamilyStatus {
    pub state: LoadState,
    /// Fetches issued and not yet completed
    pub in_flight: u32,
    /// State to fall back to once nothing is in flight
    pub settled: LoadState,
    pub last_error: Option<LoadFailure>,
    pub last_success: Option<DateTime<Utc>>,
}

impl FamilyStatus {
    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }
}
