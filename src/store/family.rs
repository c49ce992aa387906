//! Per-family snapshot bookkeeping
//!
//! A [`Family`] owns one snapshot channel and one status channel. Every fetch
//! gets a sequence number when it is issued; its result is applied only if the
//! sequence is newer than the one behind the current snapshot and newer than
//! the cancellation floor. All compare-and-apply steps run inside the watch
//! channels' modify closures.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::types::{EntityFamily, FamilyStatus, LoadFailure, LoadState, Snapshot};
use crate::{DashboardError, Result};

/// How a load interacts with a fetch that is already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoadMode {
    /// Wait for the in-flight fetch and share its outcome
    Coalesce,
    /// Issue a new request regardless; sequence ordering decides the winner
    Supersede,
}

/// What happened to a completed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Applied,
    /// A newer request or a local edit already produced the current snapshot
    Stale,
    /// Issued before the last cancellation
    Cancelled,
}

/// Outcome of one fetch as seen by the loads that joined it.
enum Settled<T> {
    Done(Snapshot<T>),
    Cancelled,
    Failed(String),
}

/// One issued fetch. Coalescing loads wait on its settlement channel.
struct Pending<T> {
    settled: watch::Sender<Option<Settled<T>>>,
}

impl<T> Pending<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self { settled: watch::channel(None).0 })
    }
}

pub(crate) struct Family<T> {
    kind: EntityFamily,
    snapshot: watch::Sender<Snapshot<T>>,
    status: watch::Sender<FamilyStatus>,
    /// Newest fetch still in flight
    newest: watch::Sender<Option<Arc<Pending<T>>>>,
    /// Highest sequence handed out so far
    issued: AtomicU64,
    /// Results with a sequence at or below this are dropped
    cancel_floor: AtomicU64,
}

impl<T: Send + Sync + 'static> Family<T> {
    pub(crate) fn new(kind: EntityFamily, initial: T) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::initial(initial));
        let (status, _) = watch::channel(FamilyStatus::default());
        let (newest, _) = watch::channel(None);
        Self {
            kind,
            snapshot,
            status,
            newest,
            issued: AtomicU64::new(0),
            cancel_floor: AtomicU64::new(0),
        }
    }

    pub(crate) fn current(&self) -> Snapshot<T> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn status(&self) -> FamilyStatus {
        self.status.borrow().clone()
    }

    pub(crate) fn subscribe_status(&self) -> watch::Receiver<FamilyStatus> {
        self.status.subscribe()
    }

    /// Drop the results of every request issued so far.
    pub(crate) fn cancel_in_flight(&self) {
        let issued = self.issued.load(Ordering::SeqCst);
        let previous = self.cancel_floor.fetch_max(issued, Ordering::SeqCst);
        if previous < issued {
            debug!(family = %self.kind, floor = issued, "Raised cancellation floor");
        }
    }

    /// Run `fetch` under a new request sequence, or join the newest in-flight one.
    pub(crate) async fn load<F>(&self, mode: LoadMode, fetch: F) -> Result<Snapshot<T>>
    where
        F: Future<Output = Result<T>>,
    {
        let (seq, pending) = self.begin(mode);
        let Some(seq) = seq else {
            return self.join(&pending).await;
        };

        trace!(family = %self.kind, seq, "Fetch issued");
        let mut guard = InFlight { family: self, seq, pending, finished: false };
        let result = fetch.await;
        guard.finished = true;

        let outcome = self.complete(seq, result);
        let settled = match &outcome {
            Ok(snap) => Settled::Done(snap.clone()),
            Err(DashboardError::Cancelled { .. }) => Settled::Cancelled,
            Err(DashboardError::Fetch { reason, .. }) => Settled::Failed(reason.clone()),
            Err(err) => Settled::Failed(err.to_string()),
        };
        self.settle(&guard.pending, settled);
        outcome
    }

    /// Apply a local edit to the current data. `edit` returns whether it changed
    /// anything; only then is the version bumped and subscribers notified.
    ///
    /// Fetches issued before a change can no longer overwrite it; their replies
    /// are treated as stale.
    pub(crate) fn patch<F>(&self, edit: F) -> bool
    where
        T: Clone,
        F: FnOnce(&mut T) -> bool,
    {
        self.snapshot.send_if_modified(|snap| {
            let changed = edit(Arc::make_mut(&mut snap.data));
            if changed {
                snap.version += 1;
                snap.revision = snap.revision.max(self.issued.load(Ordering::SeqCst));
            }
            changed
        })
    }

    /// Replace the data without going through a fetch. Used to seed a store.
    pub(crate) fn seed(&self, data: T) {
        self.snapshot.send_modify(|snap| {
            snap.data = Arc::new(data);
            snap.version += 1;
        });
    }

    /// Issue a sequence, or hand back the fetch to join when coalescing.
    fn begin(&self, mode: LoadMode) -> (Option<u64>, Arc<Pending<T>>) {
        let fresh = Pending::new();
        let mut target = Arc::clone(&fresh);
        let mut seq = None;

        self.newest.send_if_modified(|newest| {
            if let (LoadMode::Coalesce, Some(pending)) = (mode, newest.as_ref()) {
                target = Arc::clone(pending);
                return false;
            }
            seq = Some(self.issued.fetch_add(1, Ordering::SeqCst) + 1);
            *newest = Some(Arc::clone(&fresh));
            true
        });

        if seq.is_some() {
            self.status.send_modify(|status| {
                status.in_flight += 1;
                status.state = LoadState::Loading;
            });
        }
        (seq, target)
    }

    async fn join(&self, pending: &Pending<T>) -> Result<Snapshot<T>> {
        debug!(family = %self.kind, "Joining in-flight fetch");
        let mut rx = pending.settled.subscribe();
        let Ok(settled) = rx.wait_for(Option::is_some).await else {
            return Err(DashboardError::Cancelled { family: self.kind });
        };

        match settled.as_ref() {
            Some(Settled::Done(snap)) => Ok(snap.clone()),
            Some(Settled::Failed(reason)) => {
                Err(DashboardError::fetch_failed(self.kind, reason.clone()))
            }
            Some(Settled::Cancelled) | None => Err(DashboardError::Cancelled { family: self.kind }),
        }
    }

    /// Publish a fetch's outcome to its joiners and retire it as the newest.
    fn settle(&self, pending: &Arc<Pending<T>>, settled: Settled<T>) {
        pending.settled.send_replace(Some(settled));
        self.newest.send_if_modified(|newest| {
            let retire = newest.as_ref().is_some_and(|n| Arc::ptr_eq(n, pending));
            if retire {
                *newest = None;
            }
            retire
        });
    }

    fn complete(&self, seq: u64, result: Result<T>) -> Result<Snapshot<T>> {
        let now = Utc::now();

        let (disposition, outcome) = match result {
            Ok(data) => {
                let mut disposition = Disposition::Stale;
                self.snapshot.send_if_modified(|snap| {
                    if seq <= self.cancel_floor.load(Ordering::SeqCst) {
                        disposition = Disposition::Cancelled;
                        return false;
                    }
                    if seq <= snap.revision {
                        return false;
                    }
                    snap.revision = seq;
                    snap.version += 1;
                    snap.data = Arc::new(data);
                    snap.fetched_at = Some(now);
                    disposition = Disposition::Applied;
                    true
                });

                match disposition {
                    Disposition::Applied => {
                        debug!(family = %self.kind, seq, "Applied fetch result");
                        (disposition, Ok(self.current()))
                    }
                    Disposition::Stale => {
                        debug!(family = %self.kind, seq, "Discarded stale fetch result");
                        (disposition, Ok(self.current()))
                    }
                    Disposition::Cancelled => {
                        debug!(family = %self.kind, seq, "Discarded cancelled fetch result");
                        (disposition, Err(DashboardError::Cancelled { family: self.kind }))
                    }
                }
            }
            Err(err) => {
                let disposition = if seq <= self.cancel_floor.load(Ordering::SeqCst) {
                    Disposition::Cancelled
                } else if seq <= self.snapshot.borrow().revision {
                    Disposition::Stale
                } else {
                    warn!(family = %self.kind, seq, error = %err, "Fetch failed, keeping last snapshot");
                    Disposition::Applied
                };
                (disposition, Err(err))
            }
        };

        self.status.send_modify(|status| {
            status.in_flight = status.in_flight.saturating_sub(1);
            if disposition == Disposition::Applied {
                match &outcome {
                    Ok(_) => {
                        status.settled = LoadState::Ready;
                        status.last_success = Some(now);
                        status.last_error = None;
                    }
                    Err(err) => {
                        status.settled = LoadState::Error;
                        status.last_error = Some(LoadFailure {
                            message: err.to_string(),
                            retryable: err.is_retryable(),
                            at: now,
                        });
                    }
                }
            }
            if status.in_flight == 0 {
                status.state = status.settled;
            }
        });

        outcome
    }

    /// Release an in-flight slot whose fetch future was dropped before completing.
    fn abandon(&self, seq: u64, pending: &Arc<Pending<T>>) {
        debug!(family = %self.kind, seq, "Fetch abandoned before completion");
        self.settle(pending, Settled::Cancelled);
        self.status.send_modify(|status| {
            status.in_flight = status.in_flight.saturating_sub(1);
            if status.in_flight == 0 {
                status.state = status.settled;
            }
        });
    }
}

/// Keeps the in-flight count honest when a fetch future is dropped mid-await.
struct InFlight<'a, T: Send + Sync + 'static> {
    family: &'a Family<T>,
    seq: u64,
    pending: Arc<Pending<T>>,
    finished: bool,
}

impl<T: Send + Sync + 'static> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if !self.finished {
            self.family.abandon(self.seq, &self.pending);
        }
    }
}
