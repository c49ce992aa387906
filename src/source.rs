//! Data source trait for backend access

use chrono::NaiveDate;

use crate::{DashboardError, Result};
use crate::types::{Alert, AlertUpdate, District, Driver, DriverStatus, KpiSnapshot};

/// Trait for dashboard data sources
///
/// Sources abstract over where records come from (hosted backend, flat file,
/// in-memory fixture). Each entity family is fetched independently and
/// returned whole; the store decides whether the result is still current.
///
/// Write methods report a missing id as [`DashboardError::NotFound`] so the
/// store can treat repeated acknowledgements as benign.
///
/// [`DashboardError::NotFound`]: crate::DashboardError::NotFound
#[async_trait::async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Fetch every driver with today's statistics
    async fn fetch_drivers(&self) -> Result<Vec<Driver>>;

    /// Fetch alerts that have not been acknowledged yet
    async fn fetch_alerts(&self) -> Result<Vec<Alert>>;

    /// Fetch district reference data
    async fn fetch_districts(&self) -> Result<Vec<District>>;

    /// Fetch the current KPI snapshot
    async fn fetch_metrics(&self) -> Result<KpiSnapshot>;

    /// Apply an operator action to an alert
    async fn update_alert(&self, id: &str, update: AlertUpdate) -> Result<()>;

    /// Persist a driver status change
    async fn update_driver_status(&self, id: &str, status: DriverStatus) -> Result<()>;

    /// Fetch the closing KPI snapshot of a past day.
    ///
    /// Sources without history report every date as not found.
    async fn fetch_period(&self, date: NaiveDate) -> Result<KpiSnapshot> {
        Err(DashboardError::not_found("period", date.to_string()))
    }
}
