//! Core types for fleet dashboard state.
//!
//! This module provides the records the dashboard works with and the
//! bookkeeping types the store attaches to them.
//!
//! ## Architecture
//!
//! - [`Driver`] with [`DailyStats`] and an optional [`GpsFix`] is the main entity
//! - [`Alert`] and [`AlertWithDetails`] carry rule-engine output
//! - [`District`] is load-once reference data used to group drivers
//! - [`KpiSnapshot`] holds aggregate counters and bounded [`TrendSeries`]
//! - [`Snapshot`] wraps any of the above with revision/version counters
//! - [`EntityFamily`], [`LoadState`] and [`FamilyStatus`] describe loading progress
//!
//! ## Usage Example
//!
//! ```rust
//! use fleetwatch::types::{TrendSeries, IdleStatus};
//!
//! let mut online = TrendSeries::with_capacity(3);
//! online.extend([5.0, 6.0, 7.0, 8.0]);
//! assert_eq!(online.to_vec(), vec![6.0, 7.0, 8.0]);
//!
//! assert_eq!(IdleStatus::classify(75.0, 60, 90), IdleStatus::Warning);
//! ```

mod alert;
mod district;
mod driver;
mod family;
mod metrics;
mod route;
mod snapshot;
mod update_rate;

// Re-export all public types
pub use alert::{Alert, AlertSeverity, AlertType, AlertUpdate, AlertWithDetails, DriverSummary};
pub use district::District;
pub use driver::{DailyStats, Driver, DriverStatus, GpsFix, validate_drivers};
pub use family::{EntityFamily, FamilyStatus, LoadFailure, LoadState};
pub use metrics::{
    DEFAULT_TREND_CAPACITY, IdleStatus, IssueTally, IssueType, KpiSnapshot, TrendSeries,
};
pub use route::{Route, RouteStatus, Stop, StopStatus};
pub use snapshot::Snapshot;
pub use update_rate::UpdateRate;

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_trend_series_never_exceeds_capacity(
            capacity in 1usize..64,
            values in prop::collection::vec(-1.0e6f64..1.0e6, 0..200)
        ) {
            let series = TrendSeries::from_values(capacity, values.iter().copied());

            prop_assert!(series.len() <= capacity);
            prop_assert_eq!(series.len(), values.len().min(capacity));

            // The retained tail is exactly the most recent values, in order
            let expected: Vec<f64> = values[values.len() - series.len()..].to_vec();
            prop_assert_eq!(series.to_vec(), expected);
        }

        #[test]
        fn prop_rebound_keeps_latest(
            values in prop::collection::vec(0.0f64..500.0, 1..50),
            new_capacity in 1usize..10
        ) {
            let mut series = TrendSeries::from_values(64, values.iter().copied());
            let latest = series.latest();
            series.rebound(new_capacity);

            prop_assert!(series.len() <= new_capacity);
            prop_assert_eq!(series.latest(), latest);
        }

        #[test]
        fn prop_idle_status_is_monotonic(a in 0.0f64..300.0, b in 0.0f64..300.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let rank = |s: IdleStatus| match s {
                IdleStatus::Normal => 0,
                IdleStatus::Warning => 1,
                IdleStatus::Critical => 2,
            };
            prop_assert!(rank(IdleStatus::classify(lo, 60, 90)) <= rank(IdleStatus::classify(hi, 60, 90)));
        }
    }

    #[test]
    fn trend_series_serializes_as_list() {
        let series = TrendSeries::from_values(4, [1.0, 2.0, 3.0]);
        let yaml = serde_yaml_ng::to_string(&series).unwrap();
        let back: TrendSeries = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(back.to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn severity_ordering() {
        assert!(AlertSeverity::Critical > AlertSeverity::Warning);
        assert!(AlertSeverity::Warning > AlertSeverity::Info);
    }

    #[test]
    fn snapshot_clone_shares_data() {
        let snap = Snapshot::initial(vec![1, 2, 3]);
        let copy = snap.clone();
        assert!(std::sync::Arc::ptr_eq(&snap.data, &copy.data));
        assert_eq!(copy.len(), 3);
        assert!(!copy.is_fetched());
    }

    #[test]
    fn polled_families_exclude_districts() {
        assert!(!EntityFamily::POLLED.contains(&EntityFamily::Districts));
        assert_eq!(EntityFamily::ALL.len(), 4);
    }
}
