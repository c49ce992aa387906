//! Driver filtering and quick-filter facets
//!
//! Everything here is a pure function of a borrowed driver snapshot and a
//! [`FilterCriteria`] value. Nothing is cached; views are recomputed on every
//! read, which keeps them consistent with whatever snapshot the caller holds.
//!
//! ```rust
//! use fleetwatch::{DriverStatus, FilterCriteria};
//!
//! let criteria = FilterCriteria::default().toggle_status(DriverStatus::Idle);
//! assert_eq!(criteria.status, Some(DriverStatus::Idle));
//!
//! // Selecting the active value again clears it
//! assert_eq!(criteria.toggle_status(DriverStatus::Idle).status, None);
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{District, Driver, DriverStatus};
use crate::{DashboardError, Result};

/// Longest accepted search query, in characters.
pub const MAX_QUERY_LEN: usize = 128;

/// Label of the facet that clears the region selection.
pub const ALL_REGIONS_LABEL: &str = "All regions";

/// Current filter selection. Immutable; every change produces a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(default)]
pub struct FilterCriteria {
    /// Free-text search over names and phone
    pub query: String,
    pub status: Option<DriverStatus>,
    /// Region key as produced by [`FleetView::region_of`]
    pub region: Option<String>,
    /// Dispatch hub id
    pub hub: Option<String>,
}

impl FilterCriteria {
    pub fn with_query(self, query: impl Into<String>) -> Self {
        Self { query: query.into(), ..self }
    }

    pub fn with_status(self, status: Option<DriverStatus>) -> Self {
        Self { status, ..self }
    }

    pub fn with_region(self, region: Option<String>) -> Self {
        Self { region, ..self }
    }

    pub fn with_hub(self, hub: Option<String>) -> Self {
        Self { hub, ..self }
    }

    /// Select `status`, or clear it if it is already selected.
    pub fn toggle_status(&self, status: DriverStatus) -> Self {
        let status = if self.status == Some(status) { None } else { Some(status) };
        Self { status, ..self.clone() }
    }

    /// Select `region`, or clear it if it is already selected.
    pub fn toggle_region(&self, region: &str) -> Self {
        let region =
            if self.region.as_deref() == Some(region) { None } else { Some(region.to_string()) };
        Self { region, ..self.clone() }
    }

    /// Select `hub`, or clear it if it is already selected.
    pub fn toggle_hub(&self, hub: &str) -> Self {
        let hub = if self.hub.as_deref() == Some(hub) { None } else { Some(hub.to_string()) };
        Self { hub, ..self.clone() }
    }

    /// Apply a quick-filter click.
    pub fn apply_facet(&self, key: &FacetKey) -> Self {
        match key {
            FacetKey::Status(status) => self.toggle_status(*status),
            FacetKey::AllRegions => Self { region: None, ..self.clone() },
            FacetKey::Region(region) => self.toggle_region(region),
            FacetKey::Hub(hub) => self.toggle_hub(hub),
        }
    }

    /// Reset every criterion.
    pub fn clear(&self) -> Self {
        Self::default()
    }

    /// Whether no criterion restricts the result.
    pub fn is_empty(&self) -> bool {
        self.search_term().is_none()
            && self.status.is_none()
            && self.region.is_none()
            && self.hub.is_none()
    }

    /// Reject criteria that could never come from a well-behaved UI.
    pub fn validate(&self) -> Result<()> {
        let len = self.query.chars().count();
        if len > MAX_QUERY_LEN {
            return Err(DashboardError::validation(
                "query",
                format!("{len} characters exceeds the limit of {MAX_QUERY_LEN}"),
            ));
        }
        if self.query.chars().any(char::is_control) {
            return Err(DashboardError::validation("query", "contains control characters"));
        }
        if self.region.as_deref().is_some_and(|r| r.trim().is_empty()) {
            return Err(DashboardError::validation("region", "region key must not be blank"));
        }
        if self.hub.as_deref().is_some_and(|h| h.trim().is_empty()) {
            return Err(DashboardError::validation("hub", "hub id must not be blank"));
        }
        Ok(())
    }

    /// Lowercased trimmed query, `None` when there is nothing to search for.
    fn search_term(&self) -> Option<String> {
        let term = self.query.trim();
        (!term.is_empty()).then(|| term.to_lowercase())
    }
}

/// Identity of a quick-filter facet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FacetKey {
    Status(DriverStatus),
    AllRegions,
    Region(String),
    Hub(String),
}

/// A toggleable single-predicate filter with its count against the full snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct QuickFilter {
    pub key: FacetKey,
    pub label: String,
    pub count: usize,
    pub active: bool,
}

/// Drivers per status. The four buckets partition the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct StatusCounts {
    pub online: usize,
    pub driving: usize,
    pub idle: usize,
    pub offline: usize,
}

impl StatusCounts {
    /// Drivers counted as "online" on the dashboard (online plus driving).
    pub fn online_total(&self) -> usize {
        self.online + self.driving
    }

    pub fn total(&self) -> usize {
        self.online + self.driving + self.idle + self.offline
    }

    pub fn get(&self, status: DriverStatus) -> usize {
        match status {
            DriverStatus::Online => self.online,
            DriverStatus::Driving => self.driving,
            DriverStatus::Idle => self.idle,
            DriverStatus::Offline => self.offline,
        }
    }
}

/// Read-only view over a driver snapshot and the district reference data.
#[derive(Debug, Clone, Copy)]
pub struct FleetView<'a> {
    pub drivers: &'a [Driver],
    pub districts: &'a [District],
}

impl<'a> FleetView<'a> {
    pub fn new(drivers: &'a [Driver], districts: &'a [District]) -> Self {
        Self { drivers, districts }
    }

    /// Grouping key of a driver: its district's name when the district id
    /// resolves, otherwise its free-form region.
    pub fn region_of(&self, driver: &'a Driver) -> Option<&'a str> {
        let district = driver
            .district_id
            .as_deref()
            .and_then(|id| self.districts.iter().find(|d| d.id == id))
            .map(|d| d.name_ru.as_str());

        district
            .or(driver.region.as_deref())
            .filter(|r| !r.trim().is_empty())
    }

    /// Drivers matching every criterion, in snapshot order.
    pub fn filter(&self, criteria: &FilterCriteria) -> Result<Vec<&'a Driver>> {
        criteria.validate()?;
        let term = criteria.search_term();

        Ok(self
            .drivers
            .iter()
            .filter(|d| term.as_deref().is_none_or(|t| matches_query(d, t)))
            .filter(|d| criteria.status.is_none_or(|s| d.status == s))
            .filter(|d| {
                criteria.region.as_deref().is_none_or(|r| self.region_of(d) == Some(r))
            })
            .filter(|d| criteria.hub.as_deref().is_none_or(|h| d.hub_id == h))
            .collect())
    }

    /// Count drivers per status over the whole snapshot.
    pub fn status_counts(&self) -> StatusCounts {
        self.drivers.iter().fold(StatusCounts::default(), |mut counts, d| {
            match d.status {
                DriverStatus::Online => counts.online += 1,
                DriverStatus::Driving => counts.driving += 1,
                DriverStatus::Idle => counts.idle += 1,
                DriverStatus::Offline => counts.offline += 1,
            }
            counts
        })
    }

    /// Region keys in the order they first appear in the snapshot.
    pub fn regions(&self) -> Vec<&'a str> {
        let mut seen: Vec<&'a str> = Vec::new();
        for driver in self.drivers {
            if let Some(region) = self.region_of(driver) {
                if !seen.contains(&region) {
                    seen.push(region);
                }
            }
        }
        seen
    }

    /// Quick-filter facets: one per status, "all regions", then one per region.
    ///
    /// Counts are computed against the full snapshot, independent of
    /// `criteria`; only the `active` flags depend on it.
    pub fn quick_filters(&self, criteria: &FilterCriteria) -> Vec<QuickFilter> {
        let counts = self.status_counts();
        let mut facets = Vec::with_capacity(DriverStatus::ALL.len() + 1);

        for status in DriverStatus::ALL {
            facets.push(QuickFilter {
                key: FacetKey::Status(status),
                label: status.label().to_string(),
                count: counts.get(status),
                active: criteria.status == Some(status),
            });
        }

        facets.push(QuickFilter {
            key: FacetKey::AllRegions,
            label: ALL_REGIONS_LABEL.to_string(),
            count: self.drivers.len(),
            active: criteria.region.is_none(),
        });

        for region in self.regions() {
            let count = self.drivers.iter().filter(|d| self.region_of(d) == Some(region)).count();
            facets.push(QuickFilter {
                key: FacetKey::Region(region.to_string()),
                label: region.to_string(),
                count,
                active: criteria.region.as_deref() == Some(region),
            });
        }

        facets
    }

    /// Hub ids in the order they first appear in the snapshot.
    pub fn hubs(&self) -> Vec<&'a str> {
        let mut seen: Vec<&'a str> = Vec::new();
        for driver in self.drivers {
            let hub = driver.hub_id.as_str();
            if !hub.trim().is_empty() && !seen.contains(&hub) {
                seen.push(hub);
            }
        }
        seen
    }

    /// One facet per hub, counted against the full snapshot.
    pub fn hub_filters(&self, criteria: &FilterCriteria) -> Vec<QuickFilter> {
        self.hubs()
            .into_iter()
            .map(|hub| QuickFilter {
                key: FacetKey::Hub(hub.to_string()),
                label: hub.to_string(),
                count: self.drivers.iter().filter(|d| d.hub_id == hub).count(),
                active: criteria.hub.as_deref() == Some(hub),
            })
            .collect()
    }
}

fn matches_query(driver: &Driver, term: &str) -> bool {
    driver.first_name.to_lowercase().contains(term)
        || driver.last_name.to_lowercase().contains(term)
        || driver.full_name().to_lowercase().contains(term)
        || driver.phone.to_lowercase().contains(term)
}
