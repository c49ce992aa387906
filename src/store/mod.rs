//! Reactive state container for dashboard data
//!
//! The [`DataStore`] owns one snapshot per [`EntityFamily`] and is the only
//! place snapshots are mutated. Readers either take the current snapshot
//! (cheap `Arc` clone) or subscribe to a watch channel and are notified on every
//! change. While a fetch is in flight the previous snapshot stays readable.

mod family;

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::source::DataSource;
use crate::types::{
    Alert, AlertUpdate, DEFAULT_TREND_CAPACITY, District, Driver, DriverStatus, EntityFamily,
    FamilyStatus, KpiSnapshot, Snapshot, validate_drivers,
};
use crate::{DashboardError, Result};

use family::{Family, LoadMode};

/// Canonical snapshots for every entity family plus the source they come from.
pub struct DataStore {
    source: Arc<dyn DataSource>,
    trend_capacity: usize,
    drivers: Family<Vec<Driver>>,
    alerts: Family<Vec<Alert>>,
    districts: Family<Vec<District>>,
    metrics: Family<KpiSnapshot>,
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore")
            .field("source", &self.source.name())
            .field("trend_capacity", &self.trend_capacity)
            .finish_non_exhaustive()
    }
}

impl DataStore {
    /// Create an empty store backed by `source`.
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            trend_capacity: DEFAULT_TREND_CAPACITY,
            drivers: Family::new(EntityFamily::Drivers, Vec::new()),
            alerts: Family::new(EntityFamily::Alerts, Vec::new()),
            districts: Family::new(EntityFamily::Districts, Vec::new()),
            metrics: Family::new(EntityFamily::Metrics, KpiSnapshot::default()),
        }
    }

    /// Bound every KPI trend series to `capacity` points.
    pub fn with_trend_capacity(mut self, capacity: usize) -> Self {
        self.trend_capacity = capacity.max(1);
        self
    }

    /// Seed the driver, alert and district snapshots before the first fetch.
    ///
    /// Seeded snapshots keep revision 0, so any later fetch replaces them.
    pub fn with_initial(
        self,
        drivers: Vec<Driver>,
        alerts: Vec<Alert>,
        districts: Vec<District>,
    ) -> Result<Self> {
        validate_drivers(&drivers)?;
        self.drivers.seed(drivers);
        self.alerts.seed(alerts);
        self.districts.seed(districts);
        Ok(self)
    }

    /// Name of the backing source.
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Replace the driver snapshot from the source.
    ///
    /// A call made while another driver load is in flight waits for that load
    /// and returns its outcome. Batches that violate record invariants are
    /// rejected whole.
    pub async fn load_drivers(&self) -> Result<Snapshot<Vec<Driver>>> {
        self.fetch_drivers(LoadMode::Coalesce).await
    }

    /// Replace the alert snapshot from the source.
    pub async fn load_alerts(&self) -> Result<Snapshot<Vec<Alert>>> {
        self.fetch_alerts(LoadMode::Coalesce).await
    }

    /// Replace the district snapshot from the source.
    pub async fn load_districts(&self) -> Result<Snapshot<Vec<District>>> {
        self.fetch_districts(LoadMode::Coalesce).await
    }

    /// Replace the KPI snapshot from the source.
    pub async fn load_metrics(&self) -> Result<Snapshot<KpiSnapshot>> {
        self.fetch_metrics(LoadMode::Coalesce).await
    }

    /// Issue a fresh request for `family` even if one is already in flight.
    ///
    /// Whichever request was issued last wins; an older reply arriving late is
    /// discarded.
    pub async fn reload(&self, family: EntityFamily) -> Result<()> {
        match family {
            EntityFamily::Drivers => self.fetch_drivers(LoadMode::Supersede).await.map(drop),
            EntityFamily::Alerts => self.fetch_alerts(LoadMode::Supersede).await.map(drop),
            EntityFamily::Districts => self.fetch_districts(LoadMode::Supersede).await.map(drop),
            EntityFamily::Metrics => self.fetch_metrics(LoadMode::Supersede).await.map(drop),
        }
    }

    /// Load every family once, concurrently. Returns the first failure.
    pub async fn load_all(&self) -> Result<()> {
        let (drivers, alerts, districts, metrics) = tokio::join!(
            self.load_drivers(),
            self.load_alerts(),
            self.load_districts(),
            self.load_metrics()
        );
        drivers?;
        alerts?;
        districts?;
        metrics?;
        Ok(())
    }

    /// Drop the results of every fetch of `family` issued so far.
    pub fn cancel_in_flight(&self, family: EntityFamily) {
        match family {
            EntityFamily::Drivers => self.drivers.cancel_in_flight(),
            EntityFamily::Alerts => self.alerts.cancel_in_flight(),
            EntityFamily::Districts => self.districts.cancel_in_flight(),
            EntityFamily::Metrics => self.metrics.cancel_in_flight(),
        }
    }

    async fn fetch_drivers(&self, mode: LoadMode) -> Result<Snapshot<Vec<Driver>>> {
        let source = Arc::clone(&self.source);
        self.drivers
            .load(mode, async move {
                let drivers = source.fetch_drivers().await?;
                validate_drivers(&drivers)?;
                debug!(count = drivers.len(), source = source.name(), "Fetched drivers");
                Ok(drivers)
            })
            .await
    }

    async fn fetch_alerts(&self, mode: LoadMode) -> Result<Snapshot<Vec<Alert>>> {
        let source = Arc::clone(&self.source);
        self.alerts
            .load(mode, async move {
                let alerts = source.fetch_alerts().await?;
                debug!(count = alerts.len(), source = source.name(), "Fetched alerts");
                Ok(alerts)
            })
            .await
    }

    async fn fetch_districts(&self, mode: LoadMode) -> Result<Snapshot<Vec<District>>> {
        let source = Arc::clone(&self.source);
        self.districts
            .load(mode, async move {
                let districts = source.fetch_districts().await?;
                debug!(count = districts.len(), source = source.name(), "Fetched districts");
                Ok(districts)
            })
            .await
    }

    async fn fetch_metrics(&self, mode: LoadMode) -> Result<Snapshot<KpiSnapshot>> {
        let source = Arc::clone(&self.source);
        let capacity = self.trend_capacity;
        self.metrics
            .load(mode, async move {
                let mut metrics = source.fetch_metrics().await?;
                metrics.rebound_trends(capacity);
                debug!(
                    drivers_online = metrics.drivers_online,
                    source = source.name(),
                    "Fetched metrics"
                );
                Ok(metrics)
            })
            .await
    }

    /// Closing KPIs of a past day, read straight from the source.
    ///
    /// Past periods do not change, so they bypass the snapshot families.
    pub async fn period_metrics(&self, date: NaiveDate) -> Result<KpiSnapshot> {
        let mut kpis = self.source.fetch_period(date).await?;
        kpis.rebound_trends(self.trend_capacity);
        debug!(%date, source = self.source.name(), "Fetched period metrics");
        Ok(kpis)
    }

    pub fn drivers(&self) -> Snapshot<Vec<Driver>> {
        self.drivers.current()
    }

    pub fn alerts(&self) -> Snapshot<Vec<Alert>> {
        self.alerts.current()
    }

    pub fn districts(&self) -> Snapshot<Vec<District>> {
        self.districts.current()
    }

    pub fn metrics(&self) -> Snapshot<KpiSnapshot> {
        self.metrics.current()
    }

    /// Look a driver up in the current snapshot.
    pub fn get_driver_by_id(&self, id: &str) -> Option<Driver> {
        self.drivers.current().iter().find(|d| d.id == id).cloned()
    }

    /// Like [`get_driver_by_id`](Self::get_driver_by_id), but a missing id is an error.
    pub fn require_driver(&self, id: &str) -> Result<Driver> {
        self.get_driver_by_id(id).ok_or_else(|| DashboardError::not_found("driver", id))
    }

    pub fn district_by_id(&self, id: &str) -> Option<District> {
        self.districts.current().iter().find(|d| d.id == id).cloned()
    }

    /// Match a district by its Russian or Armenian name, ignoring case.
    pub fn district_by_name(&self, name: &str) -> Option<District> {
        let needle = name.trim().to_lowercase();
        self.districts
            .current()
            .iter()
            .find(|d| {
                d.name_ru.to_lowercase() == needle
                    || d.name_hy.as_deref().is_some_and(|hy| hy.to_lowercase() == needle)
            })
            .cloned()
    }

    pub fn status(&self, family: EntityFamily) -> FamilyStatus {
        match family {
            EntityFamily::Drivers => self.drivers.status(),
            EntityFamily::Alerts => self.alerts.status(),
            EntityFamily::Districts => self.districts.status(),
            EntityFamily::Metrics => self.metrics.status(),
        }
    }

    pub fn subscribe_drivers(&self) -> watch::Receiver<Snapshot<Vec<Driver>>> {
        self.drivers.subscribe()
    }

    pub fn subscribe_alerts(&self) -> watch::Receiver<Snapshot<Vec<Alert>>> {
        self.alerts.subscribe()
    }

    pub fn subscribe_districts(&self) -> watch::Receiver<Snapshot<Vec<District>>> {
        self.districts.subscribe()
    }

    pub fn subscribe_metrics(&self) -> watch::Receiver<Snapshot<KpiSnapshot>> {
        self.metrics.subscribe()
    }

    pub fn subscribe_status(&self, family: EntityFamily) -> watch::Receiver<FamilyStatus> {
        match family {
            EntityFamily::Drivers => self.drivers.subscribe_status(),
            EntityFamily::Alerts => self.alerts.subscribe_status(),
            EntityFamily::Districts => self.districts.subscribe_status(),
            EntityFamily::Metrics => self.metrics.subscribe_status(),
        }
    }

    /// Acknowledge an alert and remove it from the active snapshot.
    ///
    /// Acknowledging an id that is not active (never existed or already
    /// acknowledged) succeeds without contacting the backend. A backend
    /// `NotFound` also counts as success. Any other backend failure leaves the
    /// alert in place and is returned.
    pub async fn acknowledge_alert(&self, id: &str) -> Result<()> {
        self.acknowledge(id).await.map(drop)
    }

    /// Acknowledge every active alert. Returns how many were acknowledged.
    ///
    /// Every alert is attempted; if any backend write fails, the first failure
    /// is returned after the rest have been processed.
    pub async fn acknowledge_all_alerts(&self) -> Result<usize> {
        let ids: Vec<String> =
            self.alerts.current().iter().filter(|a| a.is_active()).map(|a| a.id.clone()).collect();

        let mut acknowledged = 0;
        let mut first_error = None;
        for id in &ids {
            match self.acknowledge(id).await {
                Ok(true) => acknowledged += 1,
                Ok(false) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        info!(acknowledged, total = ids.len(), "Bulk alert acknowledgement finished");
        match first_error {
            Some(err) => Err(err),
            None => Ok(acknowledged),
        }
    }

    async fn acknowledge(&self, id: &str) -> Result<bool> {
        let active = self.alerts.current().iter().any(|a| a.id == id && a.is_active());
        if !active {
            debug!(alert_id = id, "Alert not active, nothing to acknowledge");
            return Ok(false);
        }

        match self.source.update_alert(id, AlertUpdate::acknowledge()).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(alert_id = id, "Backend no longer knows alert, treating as acknowledged");
            }
            Err(e) => {
                warn!(alert_id = id, error = %e, "Failed to acknowledge alert");
                return Err(e);
            }
        }

        let removed = self.alerts.patch(|alerts| {
            let before = alerts.len();
            alerts.retain(|a| a.id != id);
            alerts.len() != before
        });
        info!(alert_id = id, "Alert acknowledged");
        Ok(removed)
    }

    /// Persist a driver status change, then patch the local snapshot.
    ///
    /// The next driver load reconciles whatever the backend actually stored.
    pub async fn update_driver_status(&self, id: &str, status: DriverStatus) -> Result<()> {
        let current = self.require_driver(id)?;
        if current.status == status {
            debug!(driver_id = id, %status, "Driver already has requested status");
            return Ok(());
        }

        self.source.update_driver_status(id, status).await.inspect_err(|e| {
            warn!(driver_id = id, %status, error = %e, "Failed to update driver status");
        })?;

        self.drivers.patch(|drivers| match drivers.iter_mut().find(|d| d.id == id) {
            Some(driver) => {
                driver.status = status;
                true
            }
            None => false,
        });
        info!(driver_id = id, from = %current.status, to = %status, "Driver status updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MemorySource;
    use crate::test_utils::{ScriptedSource, driver, sample_alerts, sample_districts, sample_drivers};
    use crate::types::{LoadState, TrendSeries};
    use std::time::Duration;

    fn memory_store() -> (Arc<MemorySource>, DataStore) {
        let source = Arc::new(MemorySource::new(sample_drivers(), sample_alerts(), sample_districts()));
        let store = DataStore::new(source.clone());
        (source, store)
    }

    #[tokio::test]
    async fn load_replaces_snapshot() {
        let (_, store) = memory_store();
        assert!(store.drivers().is_empty());
        assert_eq!(store.status(EntityFamily::Drivers).state, LoadState::Idle);

        let snap = store.load_drivers().await.unwrap();
        assert_eq!(snap.len(), 10);
        assert_eq!(store.drivers().version, 1);
        assert_eq!(store.status(EntityFamily::Drivers).state, LoadState::Ready);
    }

    #[tokio::test]
    async fn invalid_batch_is_rejected_whole() {
        let mut bad = driver("x", "Bad", "Counter", DriverStatus::Online);
        bad.stats.completed_stops = 9;
        bad.stats.total_stops = 3;
        let source = Arc::new(MemorySource::new(vec![bad], vec![], vec![]));
        let store = DataStore::new(source);

        let err = store.load_drivers().await.unwrap_err();
        assert!(matches!(err, DashboardError::Validation { .. }));
        assert!(store.drivers().is_empty());
        assert_eq!(store.status(EntityFamily::Drivers).state, LoadState::Error);
    }

    #[tokio::test]
    async fn failed_reload_keeps_last_good_snapshot() {
        let source = Arc::new(ScriptedSource::new(sample_drivers()));
        let store = DataStore::new(source.clone());
        store.load_drivers().await.unwrap();

        source.fail_next(EntityFamily::Drivers);
        let err = store.reload(EntityFamily::Drivers).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.drivers().len(), 10);

        let status = store.status(EntityFamily::Drivers);
        assert_eq!(status.state, LoadState::Error);
        assert!(status.last_error.is_some_and(|f| f.retryable));
    }

    #[tokio::test]
    async fn double_acknowledge_succeeds() {
        let (source, store) = memory_store();
        store.load_alerts().await.unwrap();
        let id = store.alerts()[0].id.clone();

        store.acknowledge_alert(&id).await.unwrap();
        assert!(store.alerts().iter().all(|a| a.id != id));
        store.acknowledge_alert(&id).await.unwrap();

        assert_eq!(source.alert_updates(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_issued_before_acknowledge_cannot_restore_alert() {
        let source = Arc::new(ScriptedSource::new(sample_drivers()));
        let store = Arc::new(
            DataStore::new(source.clone()).with_initial(vec![], sample_alerts(), vec![]).unwrap(),
        );
        source.set_fetch_delay(Some(Duration::from_secs(5)));

        let pending = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.load_alerts().await }
        });
        let mut status = store.subscribe_status(EntityFamily::Alerts);
        status.wait_for(|s| s.in_flight > 0).await.unwrap();

        store.acknowledge_alert("a1").await.unwrap();
        // The reply still lists a1 and lands after the acknowledgement
        let snap = pending.await.unwrap().unwrap();
        assert!(snap.iter().all(|a| a.id != "a1"));
        assert!(store.alerts().iter().all(|a| a.id != "a1"));
        assert_eq!(store.status(EntityFamily::Alerts).in_flight, 0);

        // Requests issued after the edit still apply
        source.set_fetch_delay(None);
        store.reload(EntityFamily::Alerts).await.unwrap();
        assert!(store.alerts().is_fetched());
    }

    #[tokio::test]
    async fn backend_not_found_counts_as_acknowledged() {
        let (source, store) = memory_store();
        store.load_alerts().await.unwrap();
        let id = store.alerts()[0].id.clone();

        source.remove_alert(&id);
        store.acknowledge_alert(&id).await.unwrap();
        assert!(store.alerts().iter().all(|a| a.id != id));
    }

    #[tokio::test]
    async fn failed_acknowledge_keeps_alert() {
        let source = Arc::new(ScriptedSource::new(sample_drivers()));
        let store = DataStore::new(source.clone())
            .with_initial(vec![], sample_alerts(), vec![])
            .unwrap();
        let id = store.alerts()[0].id.clone();

        source.fail_writes(true);
        let err = store.acknowledge_alert(&id).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(store.alerts().iter().any(|a| a.id == id));
    }

    #[tokio::test]
    async fn acknowledge_all_counts_removed_alerts() {
        let (_, store) = memory_store();
        store.load_alerts().await.unwrap();
        let total = store.alerts().len();

        assert_eq!(store.acknowledge_all_alerts().await.unwrap(), total);
        assert!(store.alerts().is_empty());
        assert_eq!(store.acknowledge_all_alerts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn driver_status_update_patches_snapshot() {
        let (source, store) = memory_store();
        store.load_drivers().await.unwrap();
        let before = store.drivers().version;

        store.update_driver_status("1", DriverStatus::Offline).await.unwrap();
        assert_eq!(store.get_driver_by_id("1").unwrap().status, DriverStatus::Offline);
        assert_eq!(store.drivers().version, before + 1);

        // The backend saw the write, so a reload agrees
        store.load_drivers().await.unwrap();
        assert_eq!(store.get_driver_by_id("1").unwrap().status, DriverStatus::Offline);
        assert_eq!(source.driver_status("1"), Some(DriverStatus::Offline));
    }

    #[tokio::test]
    async fn point_lookups() {
        let (_, store) = memory_store();
        store.load_all().await.unwrap();

        assert!(store.get_driver_by_id("missing").is_none());
        assert!(store.require_driver("missing").unwrap_err().is_not_found());
        assert!(store.require_driver("1").is_ok());
        assert!(matches!(
            store.update_driver_status("missing", DriverStatus::Idle).await,
            Err(DashboardError::NotFound { .. })
        ));

        let kentron = store.district_by_id("d1").unwrap();
        assert_eq!(store.district_by_name("КЕНТРОН").unwrap().id, kentron.id);
        assert_eq!(store.district_by_name("Կենտրոն").unwrap().id, kentron.id);
        assert!(store.district_by_name("Nowhere").is_none());
    }

    #[tokio::test]
    async fn metrics_trends_are_rebounded() {
        let (source, _) = memory_store();
        let mut metrics = KpiSnapshot::default();
        metrics.drivers_online_trend = TrendSeries::from_values(48, (0..48).map(f64::from));
        source.set_metrics(Some(metrics));

        let store = DataStore::new(source).with_trend_capacity(12);
        let snap = store.load_metrics().await.unwrap();
        assert_eq!(snap.drivers_online_trend.len(), 12);
        assert_eq!(snap.drivers_online_trend.latest(), Some(47.0));
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let (_, store) = memory_store();
        let mut rx = store.subscribe_drivers();
        store.load_drivers().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 10);
    }
}
