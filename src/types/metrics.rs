//! KPI counters and bounded trend series

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of points kept per trend series (one per hour of the day).
pub const DEFAULT_TREND_CAPACITY: usize = 24;

/// A bounded numeric sequence for sparklines.
///
/// Pushing past capacity drops the oldest value. Serialized as a plain list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct TrendSeries {
    capacity: usize,
    values: VecDeque<f64>,
}

impl Default for TrendSeries {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TREND_CAPACITY)
    }
}

impl TrendSeries {
    /// Create an empty series. A zero capacity is bumped to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, values: VecDeque::with_capacity(capacity) }
    }

    /// Build a series from values, keeping only the most recent `capacity`.
    pub fn from_values(capacity: usize, values: impl IntoIterator<Item = f64>) -> Self {
        let mut series = Self::with_capacity(capacity);
        series.extend(values);
        series
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = f64>) {
        for value in values {
            self.push(value);
        }
    }

    /// Re-bound the series, dropping the oldest values if it shrinks.
    pub fn rebound(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}

impl From<Vec<f64>> for TrendSeries {
    fn from(values: Vec<f64>) -> Self {
        let capacity = values.len().max(DEFAULT_TREND_CAPACITY);
        Self::from_values(capacity, values)
    }
}

impl From<TrendSeries> for Vec<f64> {
    fn from(series: TrendSeries) -> Self {
        series.values.into()
    }
}

/// Severity bucket for the fleet's average idle time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "lowercase")]
pub enum IdleStatus {
    #[default]
    Normal,
    Warning,
    Critical,
}

impl IdleStatus {
    /// Strictly above `critical` is critical, strictly above `warning` is a warning.
    pub fn classify(avg_idle_minutes: f64, warning: u32, critical: u32) -> Self {
        if avg_idle_minutes > f64::from(critical) {
            IdleStatus::Critical
        } else if avg_idle_minutes > f64::from(warning) {
            IdleStatus::Warning
        } else {
            IdleStatus::Normal
        }
    }
}

/// Category of a delivery issue reported by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    Traffic,
    NoShow,
    BadAddress,
    Other,
}

/// Number of issues of one type over the reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct IssueTally {
    pub issue_type: IssueType,
    pub count: u32,
}

/// Aggregate KPI counters plus trend series, refreshed on every metrics poll.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(default)]
pub struct KpiSnapshot {
    pub drivers_online: u32,
    #[cfg_attr(feature = "tauri", specta(type = Vec<f64>))]
    pub drivers_online_trend: TrendSeries,
    pub completed_addresses: u32,
    #[cfg_attr(feature = "tauri", specta(type = Vec<f64>))]
    pub completed_addresses_trend: TrendSeries,
    pub avg_idle_minutes: u32,
    pub idle_threshold: u32,
    pub idle_status: IdleStatus,
    pub total_km: f64,
    #[cfg_attr(feature = "tauri", specta(type = Vec<f64>))]
    pub total_km_by_hour: TrendSeries,
    /// Issue counts per type; empty when the backend does not classify issues
    pub issues_by_type: Vec<IssueTally>,
}

impl KpiSnapshot {
    /// Apply a common capacity to every trend series.
    pub fn rebound_trends(&mut self, capacity: usize) {
        self.drivers_online_trend.rebound(capacity);
        self.completed_addresses_trend.rebound(capacity);
        self.total_km_by_hour.rebound(capacity);
    }
}
