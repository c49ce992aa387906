//! Driver position boundary

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::Result;
use crate::store::DataStore;
use crate::types::{DriverStatus, GpsFix};
use crate::DashboardError;

/// Last known position of one driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct DriverPosition {
    pub driver_id: String,
    pub status: DriverStatus,
    pub fix: GpsFix,
}

impl DriverPosition {
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_minutes: u32) -> bool {
        self.fix.is_stale(now, max_age_minutes)
    }
}

/// Source of driver positions for map-style consumers.
#[async_trait]
pub trait LocationProvider: Send + Sync + 'static {
    /// Latest fix of a driver. An unknown driver is `NotFound`; a known driver
    /// that never reported is `Ok(None)`.
    async fn latest_fix(&self, driver_id: &str) -> Result<Option<GpsFix>>;

    /// Every driver with a known position.
    async fn positions(&self) -> Result<Vec<DriverPosition>>;
}

/// Positions read from the store's driver snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotLocations {
    store: Arc<DataStore>,
}

impl SnapshotLocations {
    pub fn new(store: Arc<DataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl LocationProvider for SnapshotLocations {
    async fn latest_fix(&self, driver_id: &str) -> Result<Option<GpsFix>> {
        self.store
            .get_driver_by_id(driver_id)
            .map(|d| d.last_gps)
            .ok_or_else(|| DashboardError::not_found("driver", driver_id))
    }

    async fn positions(&self) -> Result<Vec<DriverPosition>> {
        Ok(self
            .store
            .drivers()
            .iter()
            .filter_map(|d| {
                d.last_gps.clone().map(|fix| DriverPosition {
                    driver_id: d.id.clone(),
                    status: d.status,
                    fix,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MemorySource;
    use crate::test_utils::{sample_drivers, sample_now};

    async fn locations() -> SnapshotLocations {
        let source = Arc::new(MemorySource::new(sample_drivers(), vec![], vec![]));
        let store = Arc::new(DataStore::new(source));
        store.load_drivers().await.unwrap();
        SnapshotLocations::new(store)
    }

    #[tokio::test]
    async fn positions_skip_drivers_without_fix() {
        let locations = locations().await;
        let positions = locations.positions().await.unwrap();
        assert_eq!(positions.len(), 9);
        assert!(positions.iter().all(|p| p.driver_id != "10"));

        let stale: Vec<&str> = positions
            .iter()
            .filter(|p| p.is_stale(sample_now(), 15))
            .map(|p| p.driver_id.as_str())
            .collect();
        assert_eq!(stale, vec!["7"]);
    }

    #[tokio::test]
    async fn latest_fix_lookups() {
        let locations = locations().await;
        assert!(locations.latest_fix("1").await.unwrap().is_some());
        assert!(locations.latest_fix("10").await.unwrap().is_none());
        assert!(locations.latest_fix("nope").await.unwrap_err().is_not_found());
    }
}
