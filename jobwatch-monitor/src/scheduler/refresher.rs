//! Poll-driven refresher
//!
//! Keeps a store's live rows fresh while any of them is still running.
//! The refresher is either idle or owns exactly one tick task; each tick
//! issues a merge fetch and, once no materialized job is active anymore,
//! the task releases itself and the refresher falls back to idle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::store::{FetchOutcome, JobStore};

/// Delay between two merge fetches
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Observable state of a refresher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefresherPhase {
    Idle,
    Polling,
}

enum PollState {
    Idle,
    Polling {
        generation: u64,
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    },
}

struct PollSlot {
    state: PollState,
    /// Incremented for every tick task spawned
    generation: u64,
}

/// Periodic merge-refresh driver for one store
pub struct Refresher {
    store: Arc<JobStore>,
    interval: Duration,
    slot: Arc<Mutex<PollSlot>>,
}

impl Refresher {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self::with_interval(store, POLL_INTERVAL)
    }

    pub fn with_interval(store: Arc<JobStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            slot: Arc::new(Mutex::new(PollSlot {
                state: PollState::Idle,
                generation: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PollSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> RefresherPhase {
        match self.lock().state {
            PollState::Idle => RefresherPhase::Idle,
            PollState::Polling { .. } => RefresherPhase::Polling,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.phase() == RefresherPhase::Polling
    }

    /// Arms polling after a completed fetch
    ///
    /// Starts a tick task only when the fetch found an active job and no
    /// task is running yet. Returns whether a task was started.
    pub fn after_fetch(&self, outcome: FetchOutcome) -> bool {
        if !outcome.found_active() {
            return false;
        }
        self.start()
    }

    fn start(&self) -> bool {
        let mut slot = self.lock();
        if matches!(slot.state, PollState::Polling { .. }) || self.store.is_disposed() {
            return false;
        }

        slot.generation += 1;
        let generation = slot.generation;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll(
            Arc::clone(&self.store),
            Arc::clone(&self.slot),
            self.interval,
            generation,
            cancel.clone(),
        ));

        info!(
            "Polling {} every {:?} while jobs are active",
            self.store.view(),
            self.interval
        );
        slot.state = PollState::Polling {
            generation,
            cancel,
            handle,
        };
        true
    }

    /// Cancels the tick task, if any; no fetch is issued afterwards
    pub fn stop(&self) {
        let previous = std::mem::replace(&mut self.lock().state, PollState::Idle);
        if let PollState::Polling { cancel, handle, .. } = previous {
            cancel.cancel();
            handle.abort();
            debug!("Polling of {} stopped", self.store.view());
        }
    }

    /// Tears the refresher down; equivalent to [`Refresher::stop`]
    pub fn dispose(&self) {
        self.stop();
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the tick task
async fn poll(
    store: Arc<JobStore>,
    slot: Arc<Mutex<PollSlot>>,
    interval: Duration,
    generation: u64,
    cancel: CancellationToken,
) {
    // The first merge happens one full interval after arming
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        debug!("Refreshing active jobs of {}", store.view());

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            outcome = store.merge_fetch() => outcome,
        };

        // Decided under the slot lock so a concurrent arm sees either the
        // running task or the idle state, never a task about to exit
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let owned = matches!(guard.state, PollState::Polling { generation: g, .. } if g == generation);
        if !owned {
            return;
        }

        if outcome == FetchOutcome::Discarded && store.is_disposed() {
            guard.state = PollState::Idle;
            return;
        }

        if !store.has_active_jobs() {
            info!("No active jobs left in {}, polling stopped", store.view());
            guard.state = PollState::Idle;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDirectory, job, store_with};
    use jobwatch_core::domain::job::{JobId, JobStatus};

    const AFTER_TICK: Duration = Duration::from_millis(5_100);

    async fn running_store(ids: &[i64]) -> (Arc<JobStore>, Arc<FakeDirectory>, FetchOutcome) {
        let directory = FakeDirectory::with_jobs(
            ids.iter().map(|id| job(*id, JobStatus::Running)).collect(),
        );
        let (store, _sink) = store_with(directory.clone());
        let store = Arc::new(store);
        let outcome = store.replace_fetch().await;
        (store, directory, outcome)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stays_idle_without_active_jobs() {
        let directory = FakeDirectory::with_jobs(vec![job(1, JobStatus::Success)]);
        let (store, _sink) = store_with(directory.clone());
        let store = Arc::new(store);
        let refresher = Refresher::new(Arc::clone(&store));

        let outcome = store.replace_fetch().await;

        assert!(!refresher.after_fetch(outcome));
        assert_eq!(refresher.phase(), RefresherPhase::Idle);
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(directory.list_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_goes_idle_when_jobs_finish() {
        let (store, directory, outcome) = running_store(&[1, 2]).await;
        let refresher = Refresher::new(Arc::clone(&store));

        assert!(refresher.after_fetch(outcome));
        assert!(refresher.is_polling());

        directory.set_status(JobId(1), JobStatus::Success);
        directory.set_status(JobId(2), JobStatus::Success);
        time::sleep(AFTER_TICK).await;

        assert_eq!(refresher.phase(), RefresherPhase::Idle);
        assert!(store.jobs().iter().all(|job| job.status == JobStatus::Success));
        assert_eq!(directory.list_calls(), 2);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(directory.list_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_at_most_one_tick_task() {
        let (store, directory, outcome) = running_store(&[1]).await;
        let refresher = Refresher::new(Arc::clone(&store));

        assert!(refresher.after_fetch(outcome));
        assert!(!refresher.after_fetch(outcome));
        assert!(!refresher.after_fetch(FetchOutcome::Applied { active: true }));

        time::sleep(AFTER_TICK).await;
        assert_eq!(directory.list_calls(), 2);
        assert!(refresher.is_polling());

        time::sleep(POLL_INTERVAL).await;
        assert_eq!(directory.list_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_polling_through_failed_tick() {
        let (store, directory, outcome) = running_store(&[1]).await;
        let refresher = Refresher::new(Arc::clone(&store));
        refresher.after_fetch(outcome);

        directory.fail_next_list("gateway timeout");
        time::sleep(AFTER_TICK).await;
        assert!(refresher.is_polling());

        directory.set_status(JobId(1), JobStatus::Failed);
        time::sleep(POLL_INTERVAL).await;
        assert!(!refresher.is_polling());
        assert_eq!(store.jobs()[0].status, JobStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_fetches() {
        let (store, directory, outcome) = running_store(&[1]).await;
        let refresher = Refresher::new(Arc::clone(&store));
        refresher.after_fetch(outcome);

        time::sleep(AFTER_TICK).await;
        refresher.stop();
        let calls = directory.list_calls();

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(directory.list_calls(), calls);
        assert_eq!(refresher.phase(), RefresherPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_tick_task() {
        let (store, directory, outcome) = running_store(&[1]).await;
        {
            let refresher = Refresher::new(Arc::clone(&store));
            refresher.after_fetch(outcome);
        }

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(directory.list_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_can_rearm_after_going_idle() {
        let (store, directory, outcome) = running_store(&[1]).await;
        let refresher = Refresher::new(Arc::clone(&store));
        refresher.after_fetch(outcome);

        directory.set_status(JobId(1), JobStatus::Stopped);
        time::sleep(AFTER_TICK).await;
        assert!(!refresher.is_polling());

        directory.set_status(JobId(1), JobStatus::Running);
        let outcome = store.replace_fetch().await;
        assert!(refresher.after_fetch(outcome));
        assert!(refresher.is_polling());
    }
}
