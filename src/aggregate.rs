//! KPI derivation, period comparison, issue breakdown and the
//! threshold-based driver watchlist

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AlertThresholds;
use crate::filter::FleetView;
use crate::types::{
    AlertType, Driver, DriverStatus, IdleStatus, IssueTally, IssueType, KpiSnapshot, TrendSeries,
};

/// Compute KPI counters from a driver set.
///
/// The average idle time is taken over every driver in the set. Trend series
/// hold a single point each; use [`advance_kpis`] to keep history.
pub fn derive_kpis(drivers: &[Driver], thresholds: &AlertThresholds) -> KpiSnapshot {
    let drivers_online = drivers.iter().filter(|d| d.status.is_online()).count();
    let completed: u32 = drivers.iter().map(|d| d.stats.completed_stops).sum();
    let total_km: f64 = drivers.iter().map(|d| d.stats.total_km).sum();
    let avg_idle = if drivers.is_empty() {
        0.0
    } else {
        drivers.iter().map(|d| f64::from(d.stats.idle_minutes)).sum::<f64>() / drivers.len() as f64
    };

    let drivers_online = u32::try_from(drivers_online).unwrap_or(u32::MAX);

    KpiSnapshot {
        drivers_online,
        drivers_online_trend: TrendSeries::from_values(1, [f64::from(drivers_online)]),
        completed_addresses: completed,
        completed_addresses_trend: TrendSeries::from_values(1, [f64::from(completed)]),
        avg_idle_minutes: avg_idle.round() as u32,
        idle_threshold: thresholds.long_idle_minutes,
        idle_status: IdleStatus::classify(
            avg_idle,
            thresholds.long_idle_minutes,
            thresholds.critical_idle_minutes,
        ),
        total_km,
        total_km_by_hour: TrendSeries::from_values(1, [total_km]),
        issues_by_type: Vec::new(),
    }
}

/// Derive fresh counters and append them to the trend series of `previous`.
pub fn advance_kpis(
    previous: &KpiSnapshot,
    drivers: &[Driver],
    thresholds: &AlertThresholds,
    capacity: usize,
) -> KpiSnapshot {
    let mut next = derive_kpis(drivers, thresholds);

    let mut online = previous.drivers_online_trend.clone();
    online.rebound(capacity);
    online.push(f64::from(next.drivers_online));

    let mut completed = previous.completed_addresses_trend.clone();
    completed.rebound(capacity);
    completed.push(f64::from(next.completed_addresses));

    let mut km = previous.total_km_by_hour.clone();
    km.rebound(capacity);
    km.push(next.total_km);

    next.drivers_online_trend = online;
    next.completed_addresses_trend = completed;
    next.total_km_by_hour = km;
    next
}

/// Direction of a KPI between two periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

/// One KPI in the current period against the same KPI in a reference period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct KpiDelta {
    pub current: f64,
    pub previous: f64,
    /// Relative change in percent. A zero reference counts as +100% when the
    /// current value is positive and 0% otherwise.
    pub change_percent: f64,
    pub trend: Trend,
}

impl KpiDelta {
    pub fn between(current: f64, previous: f64) -> Self {
        let change_percent = if previous == 0.0 {
            if current > 0.0 { 100.0 } else { 0.0 }
        } else {
            (current - previous) * 100.0 / previous
        };
        let trend = if change_percent > 0.0 {
            Trend::Up
        } else if change_percent < 0.0 {
            Trend::Down
        } else {
            Trend::Flat
        };
        Self { current, previous, change_percent, trend }
    }
}

/// Headline KPIs of two periods side by side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct PeriodComparison {
    pub drivers_online: KpiDelta,
    pub completed_addresses: KpiDelta,
    /// A rise here is a regression
    pub avg_idle_minutes: KpiDelta,
    pub total_km: KpiDelta,
}

/// Compare the headline counters of `current` against `previous`.
pub fn compare_periods(current: &KpiSnapshot, previous: &KpiSnapshot) -> PeriodComparison {
    PeriodComparison {
        drivers_online: KpiDelta::between(
            f64::from(current.drivers_online),
            f64::from(previous.drivers_online),
        ),
        completed_addresses: KpiDelta::between(
            f64::from(current.completed_addresses),
            f64::from(previous.completed_addresses),
        ),
        avg_idle_minutes: KpiDelta::between(
            f64::from(current.avg_idle_minutes),
            f64::from(previous.avg_idle_minutes),
        ),
        total_km: KpiDelta::between(current.total_km, previous.total_km),
    }
}

/// One bar of the issue Pareto chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ParetoEntry {
    pub issue_type: IssueType,
    pub count: u32,
    pub percentage: f64,
    pub cumulative_percentage: f64,
}

/// Issue types by descending count with their share and running share of
/// the total. Tallies of the same type are merged and empty types dropped;
/// the last entry's cumulative share is exactly 100.
pub fn issue_pareto(tallies: &[IssueTally]) -> Vec<ParetoEntry> {
    let mut merged: Vec<IssueTally> = Vec::new();
    for tally in tallies.iter().filter(|t| t.count > 0) {
        match merged.iter_mut().find(|m| m.issue_type == tally.issue_type) {
            Some(m) => m.count = m.count.saturating_add(tally.count),
            None => merged.push(*tally),
        }
    }
    merged.sort_by(|a, b| b.count.cmp(&a.count).then(a.issue_type.cmp(&b.issue_type)));

    let total: f64 = merged.iter().map(|t| f64::from(t.count)).sum();
    let mut running = 0.0;
    merged
        .into_iter()
        .map(|t| {
            running += f64::from(t.count);
            ParetoEntry {
                issue_type: t.issue_type,
                count: t.count,
                percentage: f64::from(t.count) * 100.0 / total,
                cumulative_percentage: running * 100.0 / total,
            }
        })
        .collect()
}

/// Why a driver is on the watchlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum WatchReason {
    LongIdle { minutes: u32 },
    TooManyIssues { count: u32 },
    /// `minutes` is `None` when the driver never reported a fix
    GpsLost { minutes: Option<u32> },
}

impl WatchReason {
    /// Alert type the backend rule engine raises for the same condition.
    pub fn alert_type(&self) -> AlertType {
        match self {
            WatchReason::LongIdle { .. } => AlertType::LongIdle,
            WatchReason::TooManyIssues { .. } => AlertType::TooManyIssues,
            WatchReason::GpsLost { .. } => AlertType::GpsLost,
        }
    }
}

/// A driver breaching at least one threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct WatchEntry {
    pub driver_id: String,
    pub name: String,
    pub status: DriverStatus,
    pub reasons: Vec<WatchReason>,
}

impl FleetView<'_> {
    /// Drivers breaching idle, issue or GPS-loss thresholds, in snapshot order.
    ///
    /// Offline drivers are not expected to report positions, so they are never
    /// flagged for a lost GPS signal.
    pub fn watchlist(&self, now: DateTime<Utc>, thresholds: &AlertThresholds) -> Vec<WatchEntry> {
        self.drivers
            .iter()
            .filter_map(|driver| {
                let reasons = breaches(driver, now, thresholds);
                (!reasons.is_empty()).then(|| WatchEntry {
                    driver_id: driver.id.clone(),
                    name: driver.full_name(),
                    status: driver.status,
                    reasons,
                })
            })
            .collect()
    }
}

fn breaches(driver: &Driver, now: DateTime<Utc>, thresholds: &AlertThresholds) -> Vec<WatchReason> {
    let mut reasons = Vec::new();

    if driver.stats.idle_minutes > thresholds.long_idle_minutes {
        reasons.push(WatchReason::LongIdle { minutes: driver.stats.idle_minutes });
    }

    if driver.stats.issues_count >= thresholds.max_issues {
        reasons.push(WatchReason::TooManyIssues { count: driver.stats.issues_count });
    }

    if driver.status != DriverStatus::Offline {
        match &driver.last_gps {
            Some(fix) if fix.is_stale(now, thresholds.gps_lost_minutes) => {
                let minutes = u32::try_from(fix.age(now).num_minutes()).unwrap_or(u32::MAX);
                reasons.push(WatchReason::GpsLost { minutes: Some(minutes) });
            }
            Some(_) => {}
            None => reasons.push(WatchReason::GpsLost { minutes: None }),
        }
    }

    reasons
}
