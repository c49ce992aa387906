//! Dashboard configuration.
//!
//! Poll cadences, alert thresholds and backend selection are injected rather
//! than hardcoded. Every section has defaults matching the production
//! dashboard, so an empty YAML document is a valid configuration.
//!
//! ```rust
//! use fleetwatch::DashboardConfig;
//! use std::time::Duration;
//!
//! let config = DashboardConfig::from_yaml_str("poll:\n  alerts_secs: 60\n").unwrap();
//! assert_eq!(config.poll.alerts(), Duration::from_secs(60));
//! assert_eq!(config.poll.drivers(), Duration::from_secs(30));
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::types::{DEFAULT_TREND_CAPACITY, EntityFamily};
use crate::{DashboardError, Result};

/// Refresh cadence per polled family, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollIntervals {
    pub drivers_secs: u64,
    pub alerts_secs: u64,
    pub metrics_secs: u64,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self { drivers_secs: 30, alerts_secs: 300, metrics_secs: 30 }
    }
}

impl PollIntervals {
    pub fn drivers(&self) -> Duration {
        Duration::from_secs(self.drivers_secs)
    }

    pub fn alerts(&self) -> Duration {
        Duration::from_secs(self.alerts_secs)
    }

    pub fn metrics(&self) -> Duration {
        Duration::from_secs(self.metrics_secs)
    }

    /// Interval for a family, `None` for load-once families.
    pub fn for_family(&self, family: EntityFamily) -> Option<Duration> {
        match family {
            EntityFamily::Drivers => Some(self.drivers()),
            EntityFamily::Alerts => Some(self.alerts()),
            EntityFamily::Metrics => Some(self.metrics()),
            EntityFamily::Districts => None,
        }
    }
}

/// Thresholds used for idle classification and the driver watchlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Idle minutes above which a driver (or the fleet average) is flagged
    pub long_idle_minutes: u32,
    /// Average idle minutes above which the fleet idle status turns critical
    pub critical_idle_minutes: u32,
    /// Issue count at which a driver is flagged
    pub max_issues: u32,
    /// Minutes without a GPS fix before the signal counts as lost
    pub gps_lost_minutes: u32,
    /// Minutes behind schedule before a route counts as delayed
    pub route_delay_minutes: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            long_idle_minutes: 60,
            critical_idle_minutes: 90,
            max_issues: 3,
            gps_lost_minutes: 15,
            route_delay_minutes: 30,
        }
    }
}

/// Which data source backs the dashboard.
///
/// Remote backends are injected directly as a [`DataSource`](crate::DataSource);
/// this enum only covers the sources the crate ships.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Empty in-memory source
    #[default]
    Memory,
    /// Static YAML fixture file
    Fixture { path: PathBuf },
}

/// Complete dashboard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub poll: PollIntervals,
    pub thresholds: AlertThresholds,
    /// Points kept per KPI trend series
    pub trend_capacity: usize,
    pub backend: BackendConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll: PollIntervals::default(),
            thresholds: AlertThresholds::default(),
            trend_capacity: DEFAULT_TREND_CAPACITY,
            backend: BackendConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: DashboardConfig = if yaml.trim().is_empty() {
            DashboardConfig::default()
        } else {
            serde_yaml_ng::from_str(yaml).map_err(|e| DashboardError::Parse {
                context: "Dashboard configuration".to_string(),
                details: e.to_string(),
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    ///
    /// A relative fixture path inside the file is resolved against the
    /// configuration file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| DashboardError::fixture_error(path.to_path_buf(), e))?;
        let mut config = Self::from_yaml_str(&yaml)?;

        if let BackendConfig::Fixture { path: fixture } = &mut config.backend {
            if fixture.is_relative() {
                if let Some(dir) = path.parent() {
                    *fixture = dir.join(&*fixture);
                }
            }
        }

        debug!(path = %path.display(), backend = ?config.backend, "Loaded dashboard configuration");
        Ok(config)
    }

    /// Reject configurations the scheduler or aggregation could not honour.
    pub fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("poll.drivers_secs", self.poll.drivers_secs),
            ("poll.alerts_secs", self.poll.alerts_secs),
            ("poll.metrics_secs", self.poll.metrics_secs),
        ] {
            if secs == 0 {
                return Err(DashboardError::config(format!("{name} must be greater than zero")));
            }
        }

        if self.trend_capacity == 0 {
            return Err(DashboardError::config("trend_capacity must be greater than zero"));
        }

        if self.thresholds.critical_idle_minutes < self.thresholds.long_idle_minutes {
            return Err(DashboardError::config(format!(
                "thresholds.critical_idle_minutes ({}) is below thresholds.long_idle_minutes ({})",
                self.thresholds.critical_idle_minutes, self.thresholds.long_idle_minutes
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_constants() {
        let config = DashboardConfig::default();
        assert_eq!(config.poll.drivers(), Duration::from_secs(30));
        assert_eq!(config.poll.metrics(), Duration::from_secs(30));
        assert_eq!(config.poll.alerts(), Duration::from_secs(300));
        assert_eq!(config.thresholds.long_idle_minutes, 60);
        assert_eq!(config.thresholds.gps_lost_minutes, 15);
        assert_eq!(config.backend, BackendConfig::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(DashboardConfig::from_yaml_str("").unwrap(), DashboardConfig::default());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let yaml = r#"
thresholds:
  max_issues: 5
backend:
  kind: fixture
  path: fleet.yaml
"#;
        let config = DashboardConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.thresholds.max_issues, 5);
        assert_eq!(config.thresholds.long_idle_minutes, 60);
        assert_eq!(config.backend, BackendConfig::Fixture { path: PathBuf::from("fleet.yaml") });
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = DashboardConfig::from_yaml_str("poll:\n  drivers_secs: 0\n").unwrap_err();
        assert!(matches!(err, DashboardError::Config { .. }));
    }

    #[test]
    fn inverted_idle_thresholds_are_rejected() {
        let yaml = "thresholds:\n  long_idle_minutes: 100\n  critical_idle_minutes: 50\n";
        assert!(DashboardConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn districts_are_not_polled() {
        let poll = PollIntervals::default();
        assert_eq!(poll.for_family(EntityFamily::Districts), None);
        assert_eq!(poll.for_family(EntityFamily::Alerts), Some(Duration::from_secs(300)));
    }
}
