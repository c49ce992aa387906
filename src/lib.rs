//! Type-safe state core for last-mile fleet dashboards.
//!
//! Fleetwatch turns raw driver and alert records from an opaque backend into
//! the quantities a fleet dashboard renders: online counts, filtered driver
//! lists, quick-filter facets, KPI trends and active/critical alert views.
//!
//! # Features
//!
//! - **Snapshot store**: one watch-channel snapshot per entity family, with
//!   stale-while-revalidate reads and out-of-order reply protection
//! - **Polling**: per-family refresh tasks that can be started and stopped at will
//! - **Pure views**: filtering and aggregation over borrowed snapshots
//! - **Boundaries**: data source, identity, export and location traits
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use fleetwatch::{Fleetwatch, DriverStatus, FacetKey};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> fleetwatch::Result<()> {
//!     let dashboard = Fleetwatch::open("test-data/fleet.yaml").await?;
//!
//!     let counts = dashboard.status_counts()?;
//!     println!("{} drivers online", counts.online_total());
//!
//!     dashboard.apply_facet(&FacetKey::Status(DriverStatus::Idle))?;
//!     for driver in dashboard.filtered_drivers()? {
//!         println!("{} idle for {} min", driver.full_name(), driver.stats.idle_minutes);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// State and scheduling
pub mod config;
pub mod scheduler;
pub mod store;
pub mod stream;

// Derived views
pub mod aggregate;
pub mod alerts;
pub mod filter;

// Boundaries
pub mod export;
pub mod location;
pub mod session;
pub mod source;
pub mod sources;

pub mod dashboard;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use aggregate::{
    KpiDelta, ParetoEntry, PeriodComparison, Trend, WatchEntry, WatchReason, advance_kpis,
    compare_periods, derive_kpis, issue_pareto,
};
pub use alerts::{AlertManager, SeverityCounts};
pub use config::{AlertThresholds, BackendConfig, DashboardConfig, PollIntervals};
pub use dashboard::Dashboard;
pub use export::{ExportRow, Exporter, YamlExporter};
pub use filter::{FacetKey, FilterCriteria, FleetView, QuickFilter, StatusCounts};
pub use location::{DriverPosition, LocationProvider, SnapshotLocations};
pub use scheduler::Scheduler;
pub use session::{Identity, IdentityProvider, SessionGate, SessionState, StaticIdentity};
pub use source::DataSource;
pub use sources::{FixtureDocument, FixtureSource, MemorySource};
pub use store::DataStore;

use std::path::Path;
use std::sync::Arc;

/// Unified entry point for opening a dashboard.
///
/// # Examples
///
/// ## Fixture file
/// ```rust,no_run
/// use fleetwatch::Fleetwatch;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> fleetwatch::Result<()> {
///     let dashboard = Fleetwatch::open("fleet.yaml").await?;
///     // Use dashboard...
///     Ok(())
/// }
/// ```
///
/// ## Injected backend
/// ```rust,no_run
/// use fleetwatch::{DashboardConfig, Fleetwatch, MemorySource, StaticIdentity};
/// use std::sync::Arc;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> fleetwatch::Result<()> {
///     let source = Arc::new(MemorySource::empty());
///     let identity = Arc::new(StaticIdentity::signed_out());
///     let dashboard = Fleetwatch::connect(source, identity, DashboardConfig::default()).await?;
///     assert!(!dashboard.session().is_authenticated());
///     Ok(())
/// }
/// ```
pub struct Fleetwatch;

impl Fleetwatch {
    /// Open a dashboard over a YAML fixture file with default settings.
    ///
    /// The session is signed in as the fixture user, so views are available
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File does not exist or is not readable
    /// - File is not valid fixture YAML
    /// - A driver record violates its invariants
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Dashboard> {
        let config = DashboardConfig {
            backend: BackendConfig::Fixture { path: path.as_ref().to_path_buf() },
            ..DashboardConfig::default()
        };
        Dashboard::from_config(config).await
    }

    /// Open a dashboard described by a YAML configuration file.
    pub async fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Dashboard> {
        Dashboard::from_config(DashboardConfig::from_file(path)?).await
    }

    /// Open a dashboard over an injected backend and identity provider.
    pub async fn connect(
        source: Arc<dyn DataSource>,
        identity: Arc<dyn IdentityProvider>,
        config: DashboardConfig,
    ) -> Result<Dashboard> {
        Dashboard::connect(source, identity, config).await
    }
}
