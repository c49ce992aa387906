//! Test utilities: sample fleet data, scripted sources and fixture paths
//!
//! The sample fleet is small but covers every status, district resolution
//! path and threshold breach the dashboard cares about. [`ScriptedSource`]
//! lets tests control exactly when and how fetches complete.

#![cfg(any(test, feature = "benchmark"))]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::oneshot;

use crate::aggregate::derive_kpis;
use crate::config::AlertThresholds;
use crate::source::DataSource;
use crate::types::{
    Alert, AlertSeverity, AlertType, AlertUpdate, DailyStats, District, Driver, DriverStatus,
    EntityFamily, GpsFix, KpiSnapshot,
};
use crate::{DashboardError, Result};

/// Error returned when a required fixture cannot be located.
#[derive(Debug, Clone)]
pub struct FixtureError {
    message: String,
}

impl std::fmt::Display for FixtureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FixtureError {}

/// The crate's `test-data/` directory.
pub fn get_test_data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("test-data")
}

/// Require a file inside `test-data/` by name.
pub fn require_test_data_file(file_name: &str) -> std::result::Result<PathBuf, FixtureError> {
    let path = get_test_data_dir().join(file_name);
    if path.exists() {
        Ok(path)
    } else {
        Err(FixtureError { message: format!("Missing fixture: {}", path.display()) })
    }
}

/// Fixed reference time the sample data is built around.
pub fn sample_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).single().unwrap_or_default()
}

/// A driver with empty statistics and no position.
pub fn driver(id: &str, first: &str, last: &str, status: DriverStatus) -> Driver {
    Driver {
        id: id.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        phone: format!("+374 91 000 {:0>3}", id),
        hub_id: "hub-1".to_string(),
        region: None,
        district_id: None,
        status,
        last_gps: None,
        created_at: sample_now() - Duration::days(30),
        stats: DailyStats::default(),
    }
}

struct SampleDriver {
    id: &'static str,
    first: &'static str,
    last: &'static str,
    status: DriverStatus,
    district_id: Option<&'static str>,
    region: Option<&'static str>,
    completed: u32,
    total: u32,
    km: f64,
    idle: u32,
    issues: u32,
    gps_age_minutes: Option<i64>,
}

const SAMPLE_FLEET: [SampleDriver; 10] = [
    SampleDriver { id: "1", first: "Aram", last: "Petrosyan", status: DriverStatus::Online, district_id: Some("d1"), region: Some("Center"), completed: 12, total: 20, km: 48.5, idle: 10, issues: 0, gps_age_minutes: Some(1) },
    SampleDriver { id: "2", first: "Narek", last: "Hakobyan", status: DriverStatus::Idle, district_id: Some("d1"), region: None, completed: 8, total: 18, km: 31.0, idle: 75, issues: 1, gps_age_minutes: Some(3) },
    SampleDriver { id: "3", first: "Karen", last: "Sargsyan", status: DriverStatus::Driving, district_id: Some("d2"), region: None, completed: 15, total: 22, km: 62.3, idle: 12, issues: 0, gps_age_minutes: Some(0) },
    SampleDriver { id: "4", first: "Tigran", last: "Grigoryan", status: DriverStatus::Online, district_id: None, region: Some("Малатия"), completed: 5, total: 16, km: 22.7, idle: 20, issues: 3, gps_age_minutes: Some(2) },
    SampleDriver { id: "5", first: "Armen", last: "Vardanyan", status: DriverStatus::Idle, district_id: Some("d2"), region: None, completed: 9, total: 19, km: 35.1, idle: 95, issues: 0, gps_age_minutes: Some(4) },
    SampleDriver { id: "6", first: "Davit", last: "Harutyunyan", status: DriverStatus::Online, district_id: Some("d1"), region: None, completed: 18, total: 21, km: 70.4, idle: 8, issues: 1, gps_age_minutes: Some(1) },
    SampleDriver { id: "7", first: "Levon", last: "Avetisyan", status: DriverStatus::Driving, district_id: Some("d3"), region: None, completed: 11, total: 17, km: 54.9, idle: 15, issues: 0, gps_age_minutes: Some(40) },
    SampleDriver { id: "8", first: "Gor", last: "Manukyan", status: DriverStatus::Idle, district_id: None, region: Some("Арабкир"), completed: 7, total: 15, km: 28.2, idle: 30, issues: 2, gps_age_minutes: Some(5) },
    SampleDriver { id: "9", first: "Hayk", last: "Mkrtchyan", status: DriverStatus::Online, district_id: Some("d3"), region: None, completed: 14, total: 20, km: 51.6, idle: 5, issues: 0, gps_age_minutes: Some(2) },
    SampleDriver { id: "10", first: "Suren", last: "Ghazaryan", status: DriverStatus::Offline, district_id: None, region: None, completed: 0, total: 0, km: 0.0, idle: 0, issues: 0, gps_age_minutes: None },
];

/// Ten drivers: 4 online, 2 driving, 3 idle, 1 offline. Drivers 1-6 work
/// out of `hub-1`, 7-10 out of `hub-2`.
pub fn sample_drivers() -> Vec<Driver> {
    let now = sample_now();
    SAMPLE_FLEET
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let mut d = driver(s.id, s.first, s.last, s.status);
            d.district_id = s.district_id.map(str::to_string);
            d.region = s.region.map(str::to_string);
            if i >= 6 {
                d.hub_id = "hub-2".to_string();
            }
            d.stats = DailyStats {
                completed_stops: s.completed,
                total_stops: s.total,
                total_km: s.km,
                idle_minutes: s.idle,
                online_minutes: 240,
                issues_count: s.issues,
                fuel_used: None,
            };
            d.last_gps = s.gps_age_minutes.map(|age| GpsFix {
                lat: 40.17 + i as f64 * 0.01,
                lon: 44.50 + i as f64 * 0.01,
                ts: now - Duration::minutes(age),
            });
            d
        })
        .collect()
}

fn alert(
    id: &str,
    alert_type: AlertType,
    severity: AlertSeverity,
    driver_id: Option<&str>,
    minutes_ago: i64,
) -> Alert {
    Alert {
        id: id.to_string(),
        alert_type,
        severity,
        message: format!("{alert_type} alert {id}"),
        driver_id: driver_id.map(str::to_string),
        vehicle_id: None,
        created_at: sample_now() - Duration::minutes(minutes_ago),
        acknowledged: false,
        acknowledged_at: None,
    }
}

/// Five active alerts (two critical, created at the same instant) plus one
/// already acknowledged.
pub fn sample_alerts() -> Vec<Alert> {
    let mut maintenance = alert("a5", AlertType::MaintenanceDue, AlertSeverity::Info, None, 60);
    maintenance.vehicle_id = Some("v-12".to_string());

    let mut handled = alert("a6", AlertType::RouteDelayed, AlertSeverity::Warning, Some("99"), 90);
    handled.acknowledged = true;
    handled.acknowledged_at = Some(sample_now() - Duration::minutes(80));

    vec![
        alert("a1", AlertType::LongIdle, AlertSeverity::Warning, Some("2"), 10),
        alert("a4", AlertType::GpsLost, AlertSeverity::Critical, Some("7"), 5),
        alert("a2", AlertType::LongIdle, AlertSeverity::Critical, Some("5"), 5),
        alert("a3", AlertType::TooManyIssues, AlertSeverity::Warning, Some("4"), 20),
        maintenance,
        handled,
    ]
}

/// Four Yerevan districts; Erebuni has no drivers in the sample fleet.
pub fn sample_districts() -> Vec<District> {
    let district = |id: &str, ru: &str, hy: &str, lat: f64, lon: f64| District {
        id: id.to_string(),
        name_ru: ru.to_string(),
        name_hy: Some(hy.to_string()),
        area_km2: None,
        population: None,
        center_lat: lat,
        center_lon: lon,
    };

    vec![
        district("d1", "Кентрон", "Կենտրոն", 40.1811, 44.5136),
        district("d2", "Арабкир", "Արաբկիր", 40.2050, 44.5030),
        district("d3", "Малатия-Себастия", "Մալաթիա-Սեբաստիա", 40.1720, 44.4430),
        district("d4", "Эребуни", "Էրեբունի", 40.1390, 44.5330),
    ]
}

/// A [`DataSource`] whose driver fetches can be held open, failed or counted.
///
/// Fetches queue behind gates registered with [`gate_drivers`](Self::gate_drivers):
/// the n-th gated fetch completes when the n-th sender delivers its data.
#[derive(Default)]
pub struct ScriptedSource {
    drivers: Mutex<Vec<Driver>>,
    gates: Mutex<VecDeque<oneshot::Receiver<Vec<Driver>>>>,
    calls: Mutex<HashMap<EntityFamily, usize>>,
    failures: Mutex<HashSet<EntityFamily>>,
    fail_writes: AtomicBool,
    fetch_delay: Mutex<Option<std::time::Duration>>,
}

impl ScriptedSource {
    pub fn new(drivers: Vec<Driver>) -> Self {
        Self { drivers: Mutex::new(drivers), ..Default::default() }
    }

    /// Hold the next ungated driver fetch until the returned sender fires.
    pub fn gate_drivers(&self) -> oneshot::Sender<Vec<Driver>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().push_back(rx);
        tx
    }

    /// Make the next fetch of `family` fail with a retryable error.
    pub fn fail_next(&self, family: EntityFamily) {
        self.failures.lock().insert(family);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delay every ungated fetch (measured on the tokio clock).
    pub fn set_fetch_delay(&self, delay: Option<std::time::Duration>) {
        *self.fetch_delay.lock() = delay;
    }

    pub fn set_drivers(&self, drivers: Vec<Driver>) {
        *self.drivers.lock() = drivers;
    }

    /// Number of fetches issued for `family`.
    pub fn calls(&self, family: EntityFamily) -> usize {
        self.calls.lock().get(&family).copied().unwrap_or(0)
    }

    async fn begin(&self, family: EntityFamily) -> Result<()> {
        *self.calls.lock().entry(family).or_default() += 1;
        if self.failures.lock().remove(&family) {
            return Err(DashboardError::fetch_failed(family, "scripted failure"));
        }
        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_drivers(&self) -> Result<Vec<Driver>> {
        *self.calls.lock().entry(EntityFamily::Drivers).or_default() += 1;
        if self.failures.lock().remove(&EntityFamily::Drivers) {
            return Err(DashboardError::fetch_failed(EntityFamily::Drivers, "scripted failure"));
        }

        let gate = self.gates.lock().pop_front();
        if let Some(gate) = gate {
            return gate.await.map_err(|_| {
                DashboardError::fetch_failed(EntityFamily::Drivers, "gate dropped")
            });
        }

        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.drivers.lock().clone())
    }

    async fn fetch_alerts(&self) -> Result<Vec<Alert>> {
        self.begin(EntityFamily::Alerts).await?;
        Ok(sample_alerts().into_iter().filter(Alert::is_active).collect())
    }

    async fn fetch_districts(&self) -> Result<Vec<District>> {
        self.begin(EntityFamily::Districts).await?;
        Ok(sample_districts())
    }

    async fn fetch_metrics(&self) -> Result<KpiSnapshot> {
        self.begin(EntityFamily::Metrics).await?;
        let drivers = self.drivers.lock().clone();
        Ok(derive_kpis(&drivers, &AlertThresholds::default()))
    }

    async fn update_alert(&self, id: &str, _update: AlertUpdate) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DashboardError::update_failed("alert", id, "scripted write failure"));
        }
        Ok(())
    }

    async fn update_driver_status(&self, id: &str, status: DriverStatus) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DashboardError::update_failed("driver", id, "scripted write failure"));
        }
        if let Some(d) = self.drivers.lock().iter_mut().find(|d| d.id == id) {
            d.status = status;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_fleet_is_valid() {
        let drivers = sample_drivers();
        assert_eq!(drivers.len(), 10);
        assert!(crate::types::validate_drivers(&drivers).is_ok());
    }

    #[test]
    fn sample_alert_ids_are_unique() {
        let alerts = sample_alerts();
        let ids: HashSet<&str> = alerts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids.len(), alerts.len());
    }

    #[test]
    fn test_data_dir_is_inside_crate() {
        assert!(get_test_data_dir().ends_with("test-data"));
        assert!(require_test_data_file("definitely-missing.yaml").is_err());
    }

    #[tokio::test]
    async fn scripted_source_counts_and_fails() {
        let source = ScriptedSource::new(sample_drivers());
        source.fail_next(EntityFamily::Drivers);

        assert!(source.fetch_drivers().await.is_err());
        assert_eq!(source.fetch_drivers().await.unwrap().len(), 10);
        assert_eq!(source.calls(EntityFamily::Drivers), 2);
    }
}
