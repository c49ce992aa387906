//! In-memory data source

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::aggregate::advance_kpis;
use crate::config::AlertThresholds;
use crate::source::DataSource;
use crate::types::{
    Alert, AlertUpdate, DEFAULT_TREND_CAPACITY, District, Driver, DriverStatus, KpiSnapshot,
};
use crate::{DashboardError, Result};

#[derive(Debug, Default)]
struct MemoryState {
    drivers: Vec<Driver>,
    alerts: Vec<Alert>,
    districts: Vec<District>,
    /// Fixed metrics; derived from the drivers when unset
    metrics: Option<KpiSnapshot>,
    /// Running history for derived metrics
    derived: KpiSnapshot,
    /// Closing KPIs of past days
    periods: BTreeMap<NaiveDate, KpiSnapshot>,
}

/// Mutable in-memory backend.
///
/// Used when embedding the dashboard without a remote backend, and as the
/// backing store of [`FixtureSource`](super::FixtureSource). Writes are applied
/// immediately and visible to the next fetch.
#[derive(Debug)]
pub struct MemorySource {
    name: String,
    state: RwLock<MemoryState>,
    thresholds: AlertThresholds,
    trend_capacity: usize,
    alert_updates: AtomicUsize,
}

impl MemorySource {
    pub fn new(drivers: Vec<Driver>, alerts: Vec<Alert>, districts: Vec<District>) -> Self {
        Self {
            name: "memory".to_string(),
            state: RwLock::new(MemoryState { drivers, alerts, districts, ..Default::default() }),
            thresholds: AlertThresholds::default(),
            trend_capacity: DEFAULT_TREND_CAPACITY,
            alert_updates: AtomicUsize::new(0),
        }
    }

    /// An empty source.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Thresholds used when metrics are derived from the driver set.
    pub fn with_thresholds(mut self, thresholds: AlertThresholds, trend_capacity: usize) -> Self {
        self.thresholds = thresholds;
        self.trend_capacity = trend_capacity.max(1);
        self
    }

    /// Serve fixed metrics, or derive them from the drivers when `None`.
    pub fn set_metrics(&self, metrics: Option<KpiSnapshot>) {
        self.state.write().metrics = metrics;
    }

    pub fn set_drivers(&self, drivers: Vec<Driver>) {
        self.state.write().drivers = drivers;
    }

    /// Insert or replace a driver by id.
    pub fn upsert_driver(&self, driver: Driver) {
        let mut state = self.state.write();
        match state.drivers.iter_mut().find(|d| d.id == driver.id) {
            Some(existing) => *existing = driver,
            None => state.drivers.push(driver),
        }
    }

    /// Record the closing KPIs of a past day.
    pub fn set_period(&self, date: NaiveDate, kpis: KpiSnapshot) {
        self.state.write().periods.insert(date, kpis);
    }

    /// Raise a new alert.
    pub fn push_alert(&self, alert: Alert) {
        self.state.write().alerts.push(alert);
    }

    /// Delete an alert outright, as if another operator had purged it.
    pub fn remove_alert(&self, id: &str) -> bool {
        let mut state = self.state.write();
        let before = state.alerts.len();
        state.alerts.retain(|a| a.id != id);
        state.alerts.len() != before
    }

    pub fn driver_status(&self, id: &str) -> Option<DriverStatus> {
        self.state.read().drivers.iter().find(|d| d.id == id).map(|d| d.status)
    }

    /// Number of alert writes that reached this source.
    pub fn alert_updates(&self) -> usize {
        self.alert_updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_drivers(&self) -> Result<Vec<Driver>> {
        Ok(self.state.read().drivers.clone())
    }

    async fn fetch_alerts(&self) -> Result<Vec<Alert>> {
        Ok(self.state.read().alerts.iter().filter(|a| a.is_active()).cloned().collect())
    }

    async fn fetch_districts(&self) -> Result<Vec<District>> {
        Ok(self.state.read().districts.clone())
    }

    async fn fetch_metrics(&self) -> Result<KpiSnapshot> {
        let mut state = self.state.write();
        if let Some(metrics) = &state.metrics {
            return Ok(metrics.clone());
        }
        let next = advance_kpis(&state.derived, &state.drivers, &self.thresholds, self.trend_capacity);
        state.derived = next.clone();
        Ok(next)
    }

    async fn update_alert(&self, id: &str, update: AlertUpdate) -> Result<()> {
        let mut state = self.state.write();
        let alert = state
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| DashboardError::not_found("alert", id))?;

        alert.acknowledged = update.acknowledged;
        alert.acknowledged_at = update.acknowledged_at.or_else(|| update.acknowledged.then(Utc::now));
        self.alert_updates.fetch_add(1, Ordering::SeqCst);
        debug!(source = %self.name, alert_id = id, "Alert updated");
        Ok(())
    }

    async fn fetch_period(&self, date: NaiveDate) -> Result<KpiSnapshot> {
        self.state
            .read()
            .periods
            .get(&date)
            .cloned()
            .ok_or_else(|| DashboardError::not_found("period", date.to_string()))
    }

    async fn update_driver_status(&self, id: &str, status: DriverStatus) -> Result<()> {
        let mut state = self.state.write();
        let driver = state
            .drivers
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| DashboardError::not_found("driver", id))?;

        driver.status = status;
        debug!(source = %self.name, driver_id = id, %status, "Driver status updated");
        Ok(())
    }
}
