//! Snapshot type shared between the store and its readers

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// The current in-memory copy of one entity family.
///
/// Cloning is cheap: the data sits behind an `Arc`, so readers can hold a
/// snapshot while the store swaps in a newer one.
#[derive(Debug)]
pub struct Snapshot<T> {
    /// Newest request sequence the data is known to supersede (0 = initial
    /// state). Local edits raise it to every sequence issued before the edit.
    pub revision: u64,

    /// Bumped on every change, including local optimistic edits
    pub version: u64,

    /// Snapshot contents
    pub data: Arc<T>,

    /// When the data was last replaced from the backend
    pub fetched_at: Option<DateTime<Utc>>,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            revision: self.revision,
            version: self.version,
            data: Arc::clone(&self.data),
            fetched_at: self.fetched_at,
        }
    }
}

impl<T> Snapshot<T> {
    /// Initial snapshot, before any fetch.
    pub fn initial(data: T) -> Self {
        Self { revision: 0, version: 0, data: Arc::new(data), fetched_at: None }
    }

    /// Whether the snapshot came from a backend fetch.
    pub fn is_fetched(&self) -> bool {
        self.fetched_at.is_some()
    }
}

impl<T> std::ops::Deref for Snapshot<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}
