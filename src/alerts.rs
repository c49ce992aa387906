//! Alert lifecycle views and operator actions
//!
//! Alerts are created by the backend, shown while active and removed once an
//! operator acknowledges them. Every view is recomputed from the current
//! store snapshot on each call.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::sync::Arc;

use crate::Result;
use crate::store::DataStore;
use crate::types::{Alert, AlertSeverity, AlertType, AlertWithDetails};

/// Active alerts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct SeverityCounts {
    pub info: usize,
    pub warning: usize,
    pub critical: usize,
}

impl SeverityCounts {
    pub fn total(&self) -> usize {
        self.info + self.warning + self.critical
    }
}

/// Unacknowledged alerts, newest first. Alerts created at the same instant
/// are ordered by id.
pub fn sort_active(alerts: &[Alert]) -> Vec<Alert> {
    let mut active: Vec<Alert> = alerts.iter().filter(|a| a.is_active()).cloned().collect();
    active.sort_by(|a, b| {
        Reverse(a.created_at).cmp(&Reverse(b.created_at)).then_with(|| a.id.cmp(&b.id))
    });
    active
}

/// Read views and commands over the store's alert family.
#[derive(Debug, Clone)]
pub struct AlertManager {
    store: Arc<DataStore>,
}

impl AlertManager {
    pub fn new(store: Arc<DataStore>) -> Self {
        Self { store }
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        sort_active(&self.store.alerts())
    }

    /// Active alerts with [`AlertSeverity::Critical`].
    pub fn critical_alerts(&self) -> Vec<Alert> {
        self.active_alerts().into_iter().filter(|a| a.severity == AlertSeverity::Critical).collect()
    }

    pub fn alerts_by_type(&self, alert_type: AlertType) -> Vec<Alert> {
        self.active_alerts().into_iter().filter(|a| a.alert_type == alert_type).collect()
    }

    pub fn severity_counts(&self) -> SeverityCounts {
        self.store.alerts().iter().filter(|a| a.is_active()).fold(
            SeverityCounts::default(),
            |mut counts, a| {
                match a.severity {
                    AlertSeverity::Info => counts.info += 1,
                    AlertSeverity::Warning => counts.warning += 1,
                    AlertSeverity::Critical => counts.critical += 1,
                }
                counts
            },
        )
    }

    /// Active alerts joined with the driver each one refers to.
    pub fn active_with_details(&self) -> Vec<AlertWithDetails> {
        let drivers = self.store.drivers();
        self.active_alerts()
            .into_iter()
            .map(|alert| AlertWithDetails::resolve(alert, &drivers))
            .collect()
    }

    /// Acknowledge one alert. Idempotent.
    pub async fn acknowledge(&self, id: &str) -> Result<()> {
        self.store.acknowledge_alert(id).await
    }

    /// Acknowledge every active alert, returning how many were removed.
    pub async fn acknowledge_all(&self) -> Result<usize> {
        self.store.acknowledge_all_alerts().await
    }
}
