//! Fixture source backed by a static YAML file

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use super::MemorySource;
use crate::config::AlertThresholds;
use crate::source::DataSource;
use crate::types::{
    Alert, AlertUpdate, District, Driver, DriverStatus, KpiSnapshot, validate_drivers,
};
use crate::{DashboardError, Result};

/// Contents of a fixture file. Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureDocument {
    pub drivers: Vec<Driver>,
    pub alerts: Vec<Alert>,
    pub districts: Vec<District>,
    /// Served as-is when present; otherwise metrics are derived from `drivers`
    pub metrics: Option<KpiSnapshot>,
    /// Closing KPIs of past days, for period comparison
    pub periods: BTreeMap<NaiveDate, KpiSnapshot>,
}

impl FixtureDocument {
    /// Parse and validate a fixture document.
    pub fn parse(yaml: &str) -> Result<Self> {
        let cleaned = clean_fixture_yaml(yaml)?;
        let document: FixtureDocument =
            serde_yaml_ng::from_str(&cleaned).map_err(|e| DashboardError::Parse {
                context: "Fixture document".to_string(),
                details: e.to_string(),
            })?;
        document.validate()?;
        Ok(document)
    }

    /// Check record invariants and id uniqueness.
    pub fn validate(&self) -> Result<()> {
        validate_drivers(&self.drivers)?;
        ensure_unique("driver.id", self.drivers.iter().map(|d| d.id.as_str()))?;
        ensure_unique("alert.id", self.alerts.iter().map(|a| a.id.as_str()))?;
        ensure_unique("district.id", self.districts.iter().map(|d| d.id.as_str()))?;
        Ok(())
    }
}

fn ensure_unique<'a>(field: &str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(DashboardError::validation(field, format!("duplicate id '{id}'")));
        }
    }
    Ok(())
}

/// Strip a byte-order mark and control characters that YAML parsers reject.
///
/// Newlines, carriage returns and tabs are kept.
fn clean_fixture_yaml(yaml: &str) -> Result<String> {
    let cleaned: String = yaml
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect();

    if cleaned.trim().is_empty() {
        return Err(DashboardError::Parse {
            context: "Fixture document".to_string(),
            details: "document is empty".to_string(),
        });
    }
    Ok(cleaned)
}

/// Data source that serves a YAML fixture file.
///
/// The file is read once on open. Writes (acknowledgements, status changes)
/// are kept in memory for the lifetime of the source.
#[derive(Debug)]
pub struct FixtureSource {
    path: PathBuf,
    inner: MemorySource,
    latency: Option<Duration>,
}

impl FixtureSource {
    /// Read and validate a fixture file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| DashboardError::fixture_error(path.to_path_buf(), e))?;
        let document = FixtureDocument::parse(&yaml)?;

        info!(
            path = %path.display(),
            drivers = document.drivers.len(),
            alerts = document.alerts.len(),
            districts = document.districts.len(),
            "Opened fixture file"
        );

        Ok(Self::from_document(path, document))
    }

    /// Serve an already parsed document. `path` is only used for logs.
    pub fn from_document<P: AsRef<Path>>(path: P, document: FixtureDocument) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path.file_name().map_or_else(
            || "fixture".to_string(),
            |f| format!("fixture:{}", f.to_string_lossy()),
        );

        let inner = MemorySource::new(document.drivers, document.alerts, document.districts)
            .with_name(name);
        inner.set_metrics(document.metrics);
        for (date, kpis) in document.periods {
            inner.set_period(date, kpis);
        }

        Self { path, inner, latency: None }
    }

    /// Thresholds and trend capacity used for derived metrics.
    pub fn with_thresholds(mut self, thresholds: AlertThresholds, trend_capacity: usize) -> Self {
        self.inner = self.inner.with_thresholds(thresholds, trend_capacity);
        self
    }

    /// Delay every fetch, to make a fixture behave like a remote backend.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency).filter(|l| !l.is_zero());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The in-memory state behind this fixture, including applied writes.
    pub fn memory(&self) -> &MemorySource {
        &self.inner
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            debug!(?latency, "Simulating backend latency");
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl DataSource for FixtureSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_drivers(&self) -> Result<Vec<Driver>> {
        self.simulate_latency().await;
        self.inner.fetch_drivers().await
    }

    async fn fetch_alerts(&self) -> Result<Vec<Alert>> {
        self.simulate_latency().await;
        self.inner.fetch_alerts().await
    }

    async fn fetch_districts(&self) -> Result<Vec<District>> {
        self.simulate_latency().await;
        self.inner.fetch_districts().await
    }

    async fn fetch_metrics(&self) -> Result<KpiSnapshot> {
        self.simulate_latency().await;
        self.inner.fetch_metrics().await
    }

    async fn fetch_period(&self, date: NaiveDate) -> Result<KpiSnapshot> {
        self.simulate_latency().await;
        self.inner.fetch_period(date).await
    }

    async fn update_alert(&self, id: &str, update: AlertUpdate) -> Result<()> {
        self.simulate_latency().await;
        self.inner.update_alert(id, update).await
    }

    async fn update_driver_status(&self, id: &str, status: DriverStatus) -> Result<()> {
        self.simulate_latency().await;
        self.inner.update_driver_status(id, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::require_test_data_file;

    const MINIMAL: &str = r#"
drivers:
  - id: "1"
    first_name: Aram
    last_name: Petrosyan
    phone: "+374 91 000 001"
    hub_id: hub-1
    status: ONLINE
    created_at: 2025-02-12T08:00:00Z
    completed_stops: 4
    total_stops: 10
    total_km: 12.5
districts:
  - id: d1
    name_ru: Кентрон
    center_lat: 40.1811
    center_lon: 44.5136
"#;

    #[test]
    fn parses_minimal_document() {
        let doc = FixtureDocument::parse(MINIMAL).unwrap();
        assert_eq!(doc.drivers.len(), 1);
        assert_eq!(doc.drivers[0].stats.completed_stops, 4);
        assert!(doc.alerts.is_empty());
        assert!(doc.metrics.is_none());
    }

    #[test]
    fn bom_and_control_characters_are_stripped() {
        let dirty = format!("\u{feff}{}\u{1}", MINIMAL);
        assert!(FixtureDocument::parse(&dirty).is_ok());
        assert!(matches!(FixtureDocument::parse(" \n"), Err(DashboardError::Parse { .. })));
    }

    #[test]
    fn inconsistent_counters_are_rejected() {
        let bad = MINIMAL.replace("completed_stops: 4", "completed_stops: 11");
        assert!(matches!(FixtureDocument::parse(&bad), Err(DashboardError::Validation { .. })));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let doc = FixtureDocument::parse(MINIMAL).unwrap();
        let mut dup = doc.clone();
        dup.drivers.push(doc.drivers[0].clone());
        assert!(dup.validate().is_err());
    }

    #[test]
    fn missing_file_is_fixture_error() {
        let err = FixtureSource::open("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, DashboardError::Fixture { .. }));
    }

    #[tokio::test]
    async fn serves_bundled_fixture() {
        let path = require_test_data_file("fleet.yaml").unwrap();
        let source = FixtureSource::open(&path).unwrap();
        assert_eq!(source.name(), "fixture:fleet.yaml");

        let drivers = source.fetch_drivers().await.unwrap();
        assert!(!drivers.is_empty());
        let metrics = source.fetch_metrics().await.unwrap();
        let online = drivers.iter().filter(|d| d.status.is_online()).count();
        assert_eq!(metrics.drivers_online as usize, online);
    }

    #[tokio::test(start_paused = true)]
    async fn latency_is_applied_per_fetch() {
        let doc = FixtureDocument::parse(MINIMAL).unwrap();
        let source = FixtureSource::from_document("inline.yaml", doc)
            .with_latency(Duration::from_millis(200));

        let started = tokio::time::Instant::now();
        source.fetch_drivers().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(200));
    }
}
