//! Error types for dashboard state management.
//!
//! All errors implement `std::error::Error` and carry enough structured
//! context to decide whether a retry makes sense.
//!
//! ## Error Categories
//!
//! - **Fetch / Update Errors**: backend reads or writes failed
//! - **Not Found**: an operation referenced an id that is not in the snapshot
//! - **Validation**: malformed filter criteria or records
//! - **Config / Fixture / Parse**: configuration or fixture files are unusable
//! - **Cancelled**: a fetch finished after its poller was stopped
//! - **Unauthenticated**: the session gate is closed
//! - **Export**: a report could not be written
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use fleetwatch::{DashboardError, EntityFamily};
//!
//! let error = DashboardError::fetch_failed(EntityFamily::Drivers, "backend unreachable");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::EntityFamily;

/// Result type alias for dashboard operations.
pub type Result<T, E = DashboardError> = std::result::Result<T, E>;

/// Main error type for dashboard operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DashboardError {
    #[error("Failed to fetch {family}: {reason}")]
    Fetch {
        family: EntityFamily,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to update {entity} '{id}': {reason}")]
    Update {
        entity: &'static str,
        id: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Fixture file error: {path}")]
    Fixture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Fetch of {family} was cancelled by a scheduler stop")]
    Cancelled { family: EntityFamily },

    #[error("Session is not authenticated")]
    Unauthenticated,

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Export failed: {reason}")]
    Export { reason: String },
}

impl DashboardError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            DashboardError::Fetch { .. } => true,
            DashboardError::Update { .. } => true,
            DashboardError::Timeout { .. } => true,
            DashboardError::NotFound { .. } => false,
            DashboardError::Validation { .. } => false,
            DashboardError::Config { .. } => false,
            DashboardError::Fixture { .. } => false,
            DashboardError::Parse { .. } => false,
            DashboardError::Cancelled { .. } => false,
            DashboardError::Unauthenticated => false,
            DashboardError::Export { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            DashboardError::Fetch { .. } => vec![
                "Keep showing the last known snapshot",
                "Wait for the next scheduled poll",
                "Check backend connectivity",
            ],
            DashboardError::Update { .. } => vec![
                "Retry the operator action",
                "Check backend write permissions",
            ],
            DashboardError::NotFound { .. } => vec![
                "Reload the entity family",
                "Verify the id against the current snapshot",
            ],
            DashboardError::Validation { .. } => vec![
                "Correct the filter input",
                "Check source records for inconsistent counters",
            ],
            DashboardError::Config { .. } => vec![
                "Check configuration values",
                "Fall back to DashboardConfig::default()",
            ],
            DashboardError::Fixture { .. } => vec![
                "Check fixture file exists and is readable",
                "Check file permissions",
            ],
            DashboardError::Parse { .. } => vec![
                "Check YAML syntax",
                "Verify field names against the record types",
            ],
            DashboardError::Cancelled { .. } => vec![
                "Restart the poller for this family",
            ],
            DashboardError::Unauthenticated => vec![
                "Sign in before opening the dashboard",
            ],
            DashboardError::Timeout { .. } => vec![
                "Increase timeout duration",
                "Verify the backend is responding",
            ],
            DashboardError::Export { .. } => vec![
                "Check the export destination is writable",
            ],
        }
    }

    /// Helper constructor for fetch errors.
    pub fn fetch_failed(family: EntityFamily, reason: impl Into<String>) -> Self {
        DashboardError::Fetch { family, reason: reason.into(), source: None }
    }

    /// Helper constructor for fetch errors with source.
    pub fn fetch_failed_with_source(
        family: EntityFamily,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        DashboardError::Fetch { family, reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for backend write failures.
    pub fn update_failed(
        entity: &'static str,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DashboardError::Update { entity, id: id.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for missing ids.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        DashboardError::NotFound { entity, id: id.into() }
    }

    /// Helper constructor for validation errors.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DashboardError::Validation { field: field.into(), reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        DashboardError::Config { reason: reason.into() }
    }

    /// Helper constructor for fixture file errors with path context.
    pub fn fixture_error(path: PathBuf, source: std::io::Error) -> Self {
        DashboardError::Fixture { path, source }
    }

    /// Whether this is a missing-id error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DashboardError::NotFound { .. })
    }
}

impl From<serde_yaml_ng::Error> for DashboardError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        DashboardError::Parse { context: "YAML".to_string(), details: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_carry_their_context(
            reason in ".*",
            id in "[a-z0-9-]{1,16}",
            field in "\\w+",
          ) {
            let fetch = DashboardError::fetch_failed(EntityFamily::Alerts, reason.clone());
            prop_assert!(fetch.to_string().contains(&reason));
            prop_assert!(fetch.to_string().contains("alerts"));

            let missing = DashboardError::not_found("alert", id.clone());
            prop_assert!(missing.to_string().contains(&id));

            let invalid = DashboardError::validation(field.clone(), reason.clone());
            prop_assert!(invalid.to_string().contains(&field));
            prop_assert!(!invalid.is_retryable());
          }

          #[test]
          fn source_chain_is_preserved(base in ".*") {
            let io = std::io::Error::other(base.clone());
            let err = DashboardError::fetch_failed_with_source(
              EntityFamily::Drivers,
              "transport",
              Box::new(io),
            );

            let source = std::error::Error::source(&err);
            prop_assert!(source.is_some());
            prop_assert_eq!(source.unwrap().to_string(), base);
          }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<DashboardError>();

        let error = DashboardError::fetch_failed(EntityFamily::Metrics, "test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn retry_classification() {
        assert!(DashboardError::fetch_failed(EntityFamily::Drivers, "x").is_retryable());
        assert!(DashboardError::update_failed("alert", "a1", "x").is_retryable());
        assert!(!DashboardError::not_found("driver", "7").is_retryable());
        assert!(!DashboardError::Cancelled { family: EntityFamily::Alerts }.is_retryable());
        assert!(!DashboardError::Unauthenticated.is_retryable());
    }

    #[test]
    fn every_variant_has_suggestions() {
        let errors = vec![
            DashboardError::fetch_failed(EntityFamily::Drivers, "x"),
            DashboardError::update_failed("alert", "a1", "x"),
            DashboardError::not_found("driver", "7"),
            DashboardError::validation("query", "too long"),
            DashboardError::config("bad"),
            DashboardError::fixture_error(
                PathBuf::from("fleet.yaml"),
                std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            ),
            DashboardError::Parse { context: "c".into(), details: "d".into() },
            DashboardError::Cancelled { family: EntityFamily::Metrics },
            DashboardError::Unauthenticated,
            DashboardError::Timeout { duration: Duration::from_secs(1) },
            DashboardError::Export { reason: "disk full".into() },
        ];

        for error in errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty(), "no suggestions for {error}");
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn yaml_errors_become_parse_errors() {
        let err: DashboardError =
            serde_yaml_ng::from_str::<Vec<u32>>("not: [a list").unwrap_err().into();
        assert!(matches!(err, DashboardError::Parse { .. }));
    }
}
