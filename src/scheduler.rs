//! Polling scheduler that keeps store families fresh
//!
//! One task per polled family. Each task fetches immediately on start and
//! then once per configured interval until it is stopped. Stopping a family
//! also raises its cancellation floor in the store, so replies to requests
//! issued before the stop are dropped even if they were not issued by the
//! poller itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::PollIntervals;
use crate::store::DataStore;
use crate::types::EntityFamily;
use crate::{DashboardError, Result};

/// Consecutive failures after which poll errors are logged at error level.
const ESCALATE_AFTER: u32 = 5;

struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the polling tasks for a [`DataStore`].
///
/// Tasks are cancelled when the scheduler is dropped.
pub struct Scheduler {
    store: Arc<DataStore>,
    intervals: PollIntervals,
    pollers: HashMap<EntityFamily, Poller>,
}

impl Scheduler {
    pub fn new(store: Arc<DataStore>, intervals: PollIntervals) -> Self {
        Self { store, intervals, pollers: HashMap::new() }
    }

    /// Start polling `family`. Returns `Ok(false)` if it is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, family: EntityFamily) -> Result<bool> {
        let Some(period) = self.intervals.for_family(family) else {
            return Err(DashboardError::validation(
                "family",
                format!("{family} is load-once reference data and cannot be polled"),
            ));
        };

        if self.is_running(family) {
            debug!(%family, "Poller already running");
            return Ok(false);
        }

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let store = Arc::clone(&self.store);
        let handle = tokio::spawn(async move {
            Self::poll_task(store, family, period, task_cancel).await;
        });

        self.pollers.insert(family, Poller { cancel, handle });
        Ok(true)
    }

    /// Stop polling `family` and drop the results of its in-flight fetches.
    /// Returns `false` if it was not running.
    pub fn stop(&mut self, family: EntityFamily) -> bool {
        let Some(poller) = self.pollers.remove(&family) else {
            return false;
        };

        poller.cancel.cancel();
        self.store.cancel_in_flight(family);
        info!(%family, "Poller stop requested");
        !poller.handle.is_finished()
    }

    /// Start every polled family. Returns how many were newly started.
    pub fn start_all(&mut self) -> usize {
        EntityFamily::POLLED
            .into_iter()
            .filter(|family| matches!(self.start(*family), Ok(true)))
            .count()
    }

    /// Stop every running poller. Returns how many were stopped.
    pub fn stop_all(&mut self) -> usize {
        let running: Vec<EntityFamily> = self.pollers.keys().copied().collect();
        running.into_iter().filter(|family| self.stop(*family)).count()
    }

    pub fn is_running(&self, family: EntityFamily) -> bool {
        self.pollers.get(&family).is_some_and(|p| !p.handle.is_finished())
    }

    /// Number of live polling tasks.
    pub fn active_count(&self) -> usize {
        self.pollers.values().filter(|p| !p.handle.is_finished()).count()
    }

    pub fn intervals(&self) -> &PollIntervals {
        &self.intervals
    }

    async fn poll_task(
        store: Arc<DataStore>,
        family: EntityFamily,
        period: Duration,
        cancel: CancellationToken,
    ) {
        info!(%family, ?period, "Poller started");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut polls = 0u64;
        let mut consecutive_errors = 0u32;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // Dropping the fetch on cancel releases its in-flight slot
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = store.reload(family) => result,
            };
            polls += 1;

            match result {
                Ok(()) => {
                    if consecutive_errors > 0 {
                        info!(%family, after = consecutive_errors, "Polling recovered");
                    }
                    consecutive_errors = 0;
                    trace!(%family, polls, "Poll applied");
                }
                Err(DashboardError::Cancelled { .. }) => {
                    debug!(%family, "Poll result discarded by stop");
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= ESCALATE_AFTER {
                        error!(%family, consecutive_errors, error = %e, "Polling keeps failing");
                    } else {
                        warn!(%family, consecutive_errors, error = %e, "Poll failed");
                    }
                }
            }
        }

        info!(%family, polls, "Poller ended");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if !self.pollers.is_empty() {
            debug!(active = self.pollers.len(), "Dropping scheduler");
        }
        for (_, poller) in self.pollers.drain() {
            poller.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedSource, sample_drivers};
    use crate::types::LoadState;

    fn setup() -> (Arc<ScriptedSource>, Arc<DataStore>, Scheduler) {
        let source = Arc::new(ScriptedSource::new(sample_drivers()));
        let store = Arc::new(DataStore::new(source.clone()));
        let scheduler = Scheduler::new(Arc::clone(&store), PollIntervals::default());
        (source, store, scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_immediately_then_on_interval() {
        let (source, store, mut scheduler) = setup();
        assert!(scheduler.start(EntityFamily::Drivers).unwrap());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.calls(EntityFamily::Drivers), 1);
        assert_eq!(store.drivers().len(), 10);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(EntityFamily::Drivers), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_runs_one_task() {
        let (source, _store, mut scheduler) = setup();
        assert!(scheduler.start(EntityFamily::Drivers).unwrap());
        assert!(!scheduler.start(EntityFamily::Drivers).unwrap());
        assert_eq!(scheduler.active_count(), 1);

        // t = 0, 30, 60, 90
        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(source.calls(EntityFamily::Drivers), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_in_flight_results() {
        let (source, store, mut scheduler) = setup();
        let poll_gate = source.gate_drivers();
        let manual_gate = source.gate_drivers();

        scheduler.start(EntityFamily::Drivers).unwrap();
        let manual = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.reload(EntityFamily::Drivers).await }
        });

        let mut status = store.subscribe_status(EntityFamily::Drivers);
        status.wait_for(|s| s.in_flight == 2).await.unwrap();

        assert!(scheduler.stop(EntityFamily::Drivers));
        let _ = poll_gate.send(sample_drivers());
        let _ = manual_gate.send(sample_drivers());

        let result = manual.await.unwrap();
        assert!(matches!(result, Err(DashboardError::Cancelled { .. })));
        assert!(store.drivers().is_empty());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.calls(EntityFamily::Drivers), 2);
        assert_eq!(store.status(EntityFamily::Drivers).in_flight, 0);
        assert_eq!(store.status(EntityFamily::Drivers).state, LoadState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_keep_polling() {
        let (source, store, mut scheduler) = setup();
        source.fail_next(EntityFamily::Drivers);
        scheduler.start(EntityFamily::Drivers).unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.status(EntityFamily::Drivers).state, LoadState::Error);
        assert!(store.drivers().is_empty());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.status(EntityFamily::Drivers).state, LoadState::Ready);
        assert_eq!(store.drivers().len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn start_all_and_stop_all() {
        let (source, _store, mut scheduler) = setup();
        assert_eq!(scheduler.start_all(), 3);
        assert_eq!(scheduler.start_all(), 0);
        assert!(!scheduler.is_running(EntityFamily::Districts));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.calls(EntityFamily::Alerts), 1);
        assert_eq!(source.calls(EntityFamily::Metrics), 1);
        assert_eq!(source.calls(EntityFamily::Districts), 0);

        assert_eq!(scheduler.stop_all(), 3);
        assert_eq!(scheduler.active_count(), 0);
        assert!(!scheduler.stop(EntityFamily::Alerts));
    }

    #[tokio::test]
    async fn districts_cannot_be_polled() {
        let (_, _, mut scheduler) = setup();
        let err = scheduler.start(EntityFamily::Districts).unwrap_err();
        assert!(matches!(err, DashboardError::Validation { .. }));
        assert_eq!(scheduler.active_count(), 0);
    }
}
