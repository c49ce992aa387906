//! Dashboard facade
//!
//! [`Dashboard`] wires a [`DataStore`], its [`Scheduler`], the session gate
//! and the read-side views together. Every view and command checks the gate
//! first and fails with [`DashboardError::Unauthenticated`] while nobody is
//! signed in.

use chrono::{DateTime, NaiveDate, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::aggregate::{ParetoEntry, PeriodComparison, WatchEntry, compare_periods, issue_pareto};
use crate::alerts::AlertManager;
use crate::config::{BackendConfig, DashboardConfig};
use crate::export::Exporter;
use crate::filter::{FacetKey, FilterCriteria, FleetView, QuickFilter, StatusCounts};
use crate::location::SnapshotLocations;
use crate::scheduler::Scheduler;
use crate::session::{Identity, IdentityProvider, SessionGate, StaticIdentity};
use crate::source::DataSource;
use crate::sources::{FixtureSource, MemorySource};
use crate::store::DataStore;
use crate::stream::ThrottleExt;
use crate::types::{
    Alert, District, Driver, DriverStatus, EntityFamily, FamilyStatus, KpiSnapshot, Snapshot,
    UpdateRate,
};
use crate::{DashboardError, Result};

/// How long `connect` waits for the first fetch of each polled family to settle.
const FIRST_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// An open fleet dashboard.
pub struct Dashboard {
    store: Arc<DataStore>,
    scheduler: Scheduler,
    session: SessionGate,
    config: DashboardConfig,
    alerts: AlertManager,
    locations: SnapshotLocations,
    criteria: watch::Sender<FilterCriteria>,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("source", &self.store.source_name())
            .field("session", &self.session)
            .field("pollers", &self.scheduler.active_count())
            .finish_non_exhaustive()
    }
}

impl Dashboard {
    /// Open a dashboard over `source`.
    ///
    /// Resolves the session first. When it is authenticated the district
    /// reference data is loaded, every polled family is started and the call
    /// waits for their first fetches to settle before returning.
    pub async fn connect(
        source: Arc<dyn DataSource>,
        identity: Arc<dyn IdentityProvider>,
        config: DashboardConfig,
    ) -> Result<Self> {
        config.validate()?;
        info!(source = source.name(), "Opening dashboard");

        let store = Arc::new(DataStore::new(source).with_trend_capacity(config.trend_capacity));
        let scheduler = Scheduler::new(Arc::clone(&store), config.poll.clone());
        let (criteria, _) = watch::channel(FilterCriteria::default());

        let mut dashboard = Self {
            alerts: AlertManager::new(Arc::clone(&store)),
            locations: SnapshotLocations::new(Arc::clone(&store)),
            session: SessionGate::new(identity),
            store,
            scheduler,
            config,
            criteria,
        };

        // A failing provider leaves the gate anonymous; the dashboard still opens
        if let Err(e) = dashboard.session.resolve().await {
            debug!(error = %e, "Session unresolved at connect");
        }

        if dashboard.session.is_authenticated() {
            dashboard.start().await;
        } else {
            info!("Session is anonymous, polling deferred until sign-in");
        }

        Ok(dashboard)
    }

    /// Open a dashboard over the backend named in `config`, signed in as the
    /// fixture user.
    pub async fn from_config(config: DashboardConfig) -> Result<Self> {
        let source = source_from_config(&config)?;
        let identity = Arc::new(StaticIdentity::signed_in(StaticIdentity::fixture_user()));
        Self::connect(source, identity, config).await
    }

    async fn start(&mut self) {
        if let Err(e) = self.store.load_districts().await {
            warn!(error = %e, "District reference data unavailable");
        }

        let started = self.scheduler.start_all();
        debug!(started, "Pollers started");

        let first_loads = EntityFamily::POLLED.map(|family| {
            let mut status = self.store.subscribe_status(family);
            async move {
                let loaded = status
                    .wait_for(|s| {
                        s.in_flight == 0 && (s.last_success.is_some() || s.last_error.is_some())
                    })
                    .await
                    .is_ok_and(|s| s.last_success.is_some());
                (family, loaded)
            }
        });

        match tokio::time::timeout(FIRST_LOAD_TIMEOUT, futures::future::join_all(first_loads)).await
        {
            Ok(results) => {
                for (family, loaded) in results {
                    if !loaded {
                        warn!(%family, "First load failed, keeping empty snapshot until the next poll");
                    }
                }
                info!(drivers = self.store.drivers().len(), "Dashboard ready");
            }
            Err(_) => warn!("Timeout waiting for first load"),
        }
    }

    fn ensure_authenticated(&self) -> Result<()> {
        self.session.require_authenticated().map(drop)
    }

    /// Run `f` over a borrowed view of the current driver and district snapshots.
    pub fn with_view<R>(&self, f: impl FnOnce(FleetView<'_>) -> R) -> Result<R> {
        self.ensure_authenticated()?;
        let drivers = self.store.drivers();
        let districts = self.store.districts();
        Ok(f(FleetView::new(&drivers, &districts)))
    }

    pub fn criteria(&self) -> FilterCriteria {
        self.criteria.borrow().clone()
    }

    /// Replace the active filter. Invalid criteria are rejected and the
    /// previous filter stays active.
    pub fn set_criteria(&self, criteria: FilterCriteria) -> Result<()> {
        criteria.validate()?;
        self.criteria.send_if_modified(|current| {
            if *current == criteria {
                return false;
            }
            *current = criteria;
            true
        });
        Ok(())
    }

    /// Toggle a quick-filter facet on the active filter.
    pub fn apply_facet(&self, key: &FacetKey) -> Result<FilterCriteria> {
        let next = self.criteria().apply_facet(key);
        self.set_criteria(next.clone())?;
        Ok(next)
    }

    pub fn clear_criteria(&self) {
        self.criteria.send_replace(FilterCriteria::default());
    }

    pub fn subscribe_criteria(&self) -> watch::Receiver<FilterCriteria> {
        self.criteria.subscribe()
    }

    /// Drivers matching the active filter.
    pub fn filtered_drivers(&self) -> Result<Vec<Driver>> {
        let criteria = self.criteria();
        self.with_view(|view| {
            view.filter(&criteria).map(|drivers| drivers.into_iter().cloned().collect())
        })?
    }

    pub fn status_counts(&self) -> Result<StatusCounts> {
        self.with_view(|view| view.status_counts())
    }

    /// Quick-filter facets, marked against the active filter.
    pub fn quick_filters(&self) -> Result<Vec<QuickFilter>> {
        let criteria = self.criteria();
        self.with_view(|view| view.quick_filters(&criteria))
    }

    pub fn hub_filters(&self) -> Result<Vec<QuickFilter>> {
        let criteria = self.criteria();
        self.with_view(|view| view.hub_filters(&criteria))
    }

    pub fn kpis(&self) -> Result<Snapshot<KpiSnapshot>> {
        self.ensure_authenticated()?;
        Ok(self.store.metrics())
    }

    /// Current KPIs against the closing KPIs of `date`.
    pub async fn compare_with(&self, date: NaiveDate) -> Result<PeriodComparison> {
        self.ensure_authenticated()?;
        let previous = self.store.period_metrics(date).await?;
        Ok(compare_periods(&self.store.metrics(), &previous))
    }

    /// Issue types of the current KPI snapshot as a Pareto breakdown.
    pub fn issue_breakdown(&self) -> Result<Vec<ParetoEntry>> {
        self.ensure_authenticated()?;
        Ok(issue_pareto(&self.store.metrics().issues_by_type))
    }

    pub fn alerts(&self) -> Result<&AlertManager> {
        self.ensure_authenticated()?;
        Ok(&self.alerts)
    }

    pub fn locations(&self) -> Result<&SnapshotLocations> {
        self.ensure_authenticated()?;
        Ok(&self.locations)
    }

    /// Drivers breaching the configured thresholds at `now`.
    pub fn watchlist(&self, now: DateTime<Utc>) -> Result<Vec<WatchEntry>> {
        let thresholds = &self.config.thresholds;
        self.with_view(|view| view.watchlist(now, thresholds))
    }

    /// Hand the filtered rows and current KPIs to `exporter`. Returns the row count.
    pub fn export(&self, exporter: &mut dyn Exporter) -> Result<usize> {
        let criteria = self.criteria();
        let rows = self.with_view(|view| view.export_rows(&criteria))??;
        let kpis = self.store.metrics();
        exporter.export(&rows, &kpis)?;
        info!(rows = rows.len(), "Exported drivers");
        Ok(rows.len())
    }

    pub async fn acknowledge_alert(&self, id: &str) -> Result<()> {
        self.ensure_authenticated()?;
        self.alerts.acknowledge(id).await
    }

    pub async fn update_driver_status(&self, id: &str, status: DriverStatus) -> Result<()> {
        self.ensure_authenticated()?;
        self.store.update_driver_status(id, status).await
    }

    /// Fetch `family` now, superseding any request in flight.
    pub async fn reload(&self, family: EntityFamily) -> Result<()> {
        self.ensure_authenticated()?;
        self.store.reload(family).await
    }

    pub fn status(&self, family: EntityFamily) -> FamilyStatus {
        self.store.status(family)
    }

    /// Sign in and start polling.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<Identity> {
        let identity = self.session.sign_in(email, password).await?;
        self.start().await;
        Ok(identity)
    }

    /// Stop polling and sign out. Snapshots already loaded are kept but no
    /// longer readable through the dashboard.
    pub async fn sign_out(&mut self) -> Result<()> {
        let stopped = self.scheduler.stop_all();
        debug!(stopped, "Pollers stopped for sign-out");
        self.session.sign_out().await
    }

    /// Driver snapshots, at most `rate` per second.
    pub fn subscribe_drivers(&self, rate: UpdateRate) -> BoxStream<'static, Snapshot<Vec<Driver>>> {
        throttled(self.store.subscribe_drivers(), rate)
    }

    pub fn subscribe_alerts(&self, rate: UpdateRate) -> BoxStream<'static, Snapshot<Vec<Alert>>> {
        throttled(self.store.subscribe_alerts(), rate)
    }

    pub fn subscribe_districts(&self) -> BoxStream<'static, Snapshot<Vec<District>>> {
        throttled(self.store.subscribe_districts(), UpdateRate::Immediate)
    }

    pub fn subscribe_metrics(&self, rate: UpdateRate) -> BoxStream<'static, Snapshot<KpiSnapshot>> {
        throttled(self.store.subscribe_metrics(), rate)
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn session(&self) -> &SessionGate {
        &self.session
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        debug!("Dropping dashboard");
        self.scheduler.stop_all();
    }
}

fn throttled<T>(rx: watch::Receiver<T>, rate: UpdateRate) -> BoxStream<'static, T>
where
    T: Clone + Send + Sync + 'static,
{
    let snapshots = WatchStream::new(rx);
    match rate.throttle_interval() {
        None => snapshots.boxed(),
        Some(interval) => snapshots.throttle(interval).boxed(),
    }
}

/// Build the data source named by `config.backend`.
pub fn source_from_config(config: &DashboardConfig) -> Result<Arc<dyn DataSource>> {
    let thresholds = config.thresholds.clone();
    let source: Arc<dyn DataSource> = match &config.backend {
        BackendConfig::Memory => {
            Arc::new(MemorySource::empty().with_thresholds(thresholds, config.trend_capacity))
        }
        BackendConfig::Fixture { path } => {
            Arc::new(FixtureSource::open(path)?.with_thresholds(thresholds, config.trend_capacity))
        }
    };
    Ok(source)
}
