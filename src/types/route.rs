//! Delivery routes and stops

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopStatus {
    Planned,
    InProgress,
    Delivered,
    Cancelled,
    Issue,
}

/// One driver's route for a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Route {
    pub id: String,
    pub driver_id: String,
    pub vehicle_id: String,
    pub date: NaiveDate,
    pub status: RouteStatus,
    pub total_stops: u32,
    pub completed_stops: u32,
    pub total_km: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stops: Vec<Stop>,
}

impl Route {
    /// Delivered fraction in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.total_stops == 0 {
            return 0.0;
        }
        (f64::from(self.completed_stops) / f64::from(self.total_stops)).min(1.0)
    }

    /// Stops that ended with an issue.
    pub fn issue_stops(&self) -> impl Iterator<Item = &Stop> {
        self.stops.iter().filter(|s| s.status == StopStatus::Issue)
    }
}

/// A single delivery address on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Stop {
    pub id: String,
    pub route_id: String,
    pub seq: u32,
    pub address: String,
    pub lat: f64,
    pub lon: f64,
    pub status: StopStatus,
    #[serde(default)]
    pub idle_minutes: u32,
}
