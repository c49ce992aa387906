//! Driver records, live status and daily statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{DashboardError, Result};

/// Live status reported for a driver.
///
/// Transitions are driven by the backend; the client never runs a state
/// machine over these values. `Online` and `Driving` count as "online",
/// `Idle` feeds idle statistics and `Offline` is excluded from both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    Online,
    Driving,
    Idle,
    Offline,
}

impl DriverStatus {
    /// Every status, in quick-filter display order.
    pub const ALL: [DriverStatus; 4] =
        [DriverStatus::Online, DriverStatus::Idle, DriverStatus::Driving, DriverStatus::Offline];

    /// Whether the driver counts towards "drivers online".
    pub fn is_online(self) -> bool {
        matches!(self, DriverStatus::Online | DriverStatus::Driving)
    }

    /// Wire representation, as used by the backend.
    pub fn as_str(self) -> &'static str {
        match self {
            DriverStatus::Online => "ONLINE",
            DriverStatus::Driving => "DRIVING",
            DriverStatus::Idle => "IDLE",
            DriverStatus::Offline => "OFFLINE",
        }
    }

    /// Human readable label for quick-filter chips.
    pub fn label(self) -> &'static str {
        match self {
            DriverStatus::Online => "Online",
            DriverStatus::Driving => "Driving",
            DriverStatus::Idle => "Idle",
            DriverStatus::Offline => "Offline",
        }
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverStatus {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ONLINE" => Ok(DriverStatus::Online),
            "DRIVING" => Ok(DriverStatus::Driving),
            "IDLE" => Ok(DriverStatus::Idle),
            "OFFLINE" => Ok(DriverStatus::Offline),
            _ => Err(DashboardError::validation("status", format!("unknown driver status '{s}'"))),
        }
    }
}

/// Last known GPS fix of a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct GpsFix {
    pub lat: f64,
    pub lon: f64,
    pub ts: DateTime<Utc>,
}

impl GpsFix {
    /// Time elapsed since the fix was taken. Negative ages (clock skew) clamp to zero.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.ts).max(chrono::Duration::zero())
    }

    /// Whether the fix is older than `max_age_minutes`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_minutes: u32) -> bool {
        self.age(now) > chrono::Duration::minutes(i64::from(max_age_minutes))
    }
}

/// Today's statistics snapshot for one driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(default)]
pub struct DailyStats {
    pub completed_stops: u32,
    pub total_stops: u32,
    pub total_km: f64,
    pub idle_minutes: u32,
    pub online_minutes: u32,
    pub issues_count: u32,
    pub fuel_used: Option<f64>,
}

impl DailyStats {
    /// Fraction of planned stops already delivered, `0.0` when nothing is planned.
    pub fn completion_ratio(&self) -> f64 {
        if self.total_stops == 0 {
            0.0
        } else {
            f64::from(self.completed_stops) / f64::from(self.total_stops)
        }
    }
}

/// A driver together with today's statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Driver {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub hub_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district_id: Option<String>,
    pub status: DriverStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_gps: Option<GpsFix>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub stats: DailyStats,
}

impl Driver {
    /// "First Last", as shown in tables and exports.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Check record-level invariants before the record enters a snapshot.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(DashboardError::validation("driver.id", "driver id must not be empty"));
        }
        if self.stats.completed_stops > self.stats.total_stops {
            return Err(DashboardError::validation(
                "driver.completed_stops",
                format!(
                    "driver {} has {} completed stops but only {} planned",
                    self.id, self.stats.completed_stops, self.stats.total_stops
                ),
            ));
        }
        Ok(())
    }
}

/// Validate a whole driver batch, failing on the first bad record.
pub fn validate_drivers(drivers: &[Driver]) -> Result<()> {
    drivers.iter().try_for_each(Driver::validate)
}
