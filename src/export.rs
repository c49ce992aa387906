//! Export boundary
//!
//! Report formats live outside the core. An [`Exporter`] receives the
//! filtered driver rows and the current KPI snapshot and writes them however
//! it likes. [`YamlExporter`] is the one bundled format.

use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::debug;

use crate::filter::{FilterCriteria, FleetView};
use crate::types::{Driver, KpiSnapshot};
use crate::{DashboardError, Result};

/// One exported driver line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ExportRow {
    pub name: String,
    pub status: String,
    /// Delivered over planned stops, e.g. `"12/20"`.
    pub addresses: String,
    /// Kilometres with one decimal.
    pub distance_km: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub hub: String,
    pub idle_minutes: u32,
    pub issues: u32,
}

impl ExportRow {
    pub fn from_driver(driver: &Driver, region: Option<&str>) -> Self {
        Self {
            name: driver.full_name(),
            status: driver.status.label().to_string(),
            addresses: format!("{}/{}", driver.stats.completed_stops, driver.stats.total_stops),
            distance_km: format!("{:.1}", driver.stats.total_km),
            phone: driver.phone.clone(),
            region: region.map(str::to_string),
            hub: driver.hub_id.clone(),
            idle_minutes: driver.stats.idle_minutes,
            issues: driver.stats.issues_count,
        }
    }
}

impl FleetView<'_> {
    /// Rows for the drivers matching `criteria`, in snapshot order.
    pub fn export_rows(&self, criteria: &FilterCriteria) -> Result<Vec<ExportRow>> {
        Ok(self
            .filter(criteria)?
            .into_iter()
            .map(|d| ExportRow::from_driver(d, self.region_of(d)))
            .collect())
    }
}

/// Receiver of an export. Must not mutate dashboard state.
pub trait Exporter {
    fn export(&mut self, rows: &[ExportRow], kpis: &KpiSnapshot) -> Result<()>;
}

#[derive(Serialize)]
struct Report<'a> {
    kpis: KpiSummary,
    drivers: &'a [ExportRow],
}

#[derive(Serialize)]
struct KpiSummary {
    drivers_online: u32,
    completed_addresses: u32,
    avg_idle_minutes: u32,
    total_km: f64,
}

impl From<&KpiSnapshot> for KpiSummary {
    fn from(kpis: &KpiSnapshot) -> Self {
        Self {
            drivers_online: kpis.drivers_online,
            completed_addresses: kpis.completed_addresses,
            avg_idle_minutes: kpis.avg_idle_minutes,
            total_km: kpis.total_km,
        }
    }
}

/// Writes a YAML report: KPI counters followed by the driver rows.
#[derive(Debug)]
pub struct YamlExporter<W: Write> {
    writer: W,
}

impl<W: Write> YamlExporter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Exporter for YamlExporter<W> {
    fn export(&mut self, rows: &[ExportRow], kpis: &KpiSnapshot) -> Result<()> {
        let report = Report { kpis: kpis.into(), drivers: rows };
        let yaml = serde_yaml_ng::to_string(&report)
            .map_err(|e| DashboardError::Export { reason: e.to_string() })?;
        self.writer
            .write_all(yaml.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| DashboardError::Export { reason: e.to_string() })?;
        debug!(rows = rows.len(), "Exported YAML report");
        Ok(())
    }
}
