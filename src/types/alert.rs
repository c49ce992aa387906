//! Alert records and their enriched forms

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Driver, GpsFix};

/// Kind of rule that raised an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    LongIdle,
    TooManyIssues,
    MaintenanceDue,
    GpsLost,
    RouteDelayed,
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertType::LongIdle => "LONG_IDLE",
            AlertType::TooManyIssues => "TOO_MANY_ISSUES",
            AlertType::MaintenanceDue => "MAINTENANCE_DUE",
            AlertType::GpsLost => "GPS_LOST",
            AlertType::RouteDelayed => "ROUTE_DELAYED",
        };
        f.write_str(s)
    }
}

/// Alert severity. Ordered so that `Critical` compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertSeverity::Info => "INFO",
            AlertSeverity::Warning => "WARNING",
            AlertSeverity::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// An operational alert raised by the backend rule engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Alert {
    pub id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Whether the alert still belongs to the active set.
    pub fn is_active(&self) -> bool {
        !self.acknowledged
    }
}

/// Write payload sent to the backend when an operator acts on an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertUpdate {
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl AlertUpdate {
    /// Acknowledge now.
    pub fn acknowledge() -> Self {
        Self { acknowledged: true, acknowledged_at: Some(Utc::now()) }
    }
}

/// The driver fields an alert card needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct DriverSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

impl From<&Driver> for DriverSummary {
    fn from(driver: &Driver) -> Self {
        Self {
            id: driver.id.clone(),
            first_name: driver.first_name.clone(),
            last_name: driver.last_name.clone(),
            phone: driver.phone.clone(),
        }
    }
}

/// An alert joined with the driver it refers to, resolved at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct AlertWithDetails {
    #[serde(flatten)]
    pub alert: Alert,
    pub driver: Option<DriverSummary>,
    pub last_gps: Option<GpsFix>,
}

impl AlertWithDetails {
    /// Join `alert` against the driver set. Unknown or missing driver ids leave the
    /// detail fields empty.
    pub fn resolve(alert: Alert, drivers: &[Driver]) -> Self {
        let driver = alert
            .driver_id
            .as_deref()
            .and_then(|id| drivers.iter().find(|d| d.id == id));

        Self {
            driver: driver.map(DriverSummary::from),
            last_gps: driver.and_then(|d| d.last_gps.clone()),
            alert,
        }
    }
}
