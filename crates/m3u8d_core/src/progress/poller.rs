//! Periodic progress polling on behalf of the owner thread.
//!
//! A background loop wakes every interval and posts one owner task that
//! reads a [`ProgressSnapshot`] and hands it to display logic. The loop and
//! the owner tasks share a [`FinishFlag`] by reference count, so neither
//! outlives the other's state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::snapshot::ProgressSnapshot;
use crate::sync_ui::DispatcherHandle;

/// Something that can report progress on demand.
///
/// Queried on the owner thread.
pub trait ProgressSource: Send + Sync {
    fn snapshot(&self) -> ProgressSnapshot;
}

impl<F> ProgressSource for F
where
    F: Fn() -> ProgressSnapshot + Send + Sync,
{
    fn snapshot(&self) -> ProgressSnapshot {
        self()
    }
}

/// Shared one-way "finished" flag.
#[derive(Debug, Clone, Default)]
pub struct FinishFlag(Arc<AtomicBool>);

impl FinishFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Idempotent.
    pub fn finish(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Callback receiving each polled snapshot on the owner thread.
pub type ProgressCallback = Arc<dyn Fn(&ProgressSnapshot) + Send + Sync>;

/// State shared by the polling loop and the owner tasks it posts.
struct PollState {
    finished: FinishFlag,
    /// An owner poll is queued and has not run yet.
    in_flight: AtomicBool,
    /// A running snapshot has been observed.
    seen_running: AtomicBool,
    source: Arc<dyn ProgressSource>,
    on_update: ProgressCallback,
}

impl PollState {
    fn poll_on_owner(&self) {
        self.in_flight.store(false, Ordering::Release);
        if self.finished.is_finished() {
            return;
        }

        let snapshot = self.source.snapshot();
        (self.on_update)(&snapshot);

        if snapshot.is_running {
            self.seen_running.store(true, Ordering::Release);
        } else if self.seen_running.load(Ordering::Acquire) {
            self.finished.finish();
        }
    }
}

/// Spawns progress polling loops.
pub struct ProgressPoller;

impl ProgressPoller {
    /// Start polling `source` every `interval`.
    ///
    /// The loop occupies one worker for its lifetime. It stops when:
    /// - the returned handle is stopped,
    /// - the dispatcher is torn down, or
    /// - a snapshot reports not running after a running one was seen.
    ///
    /// At most one poll is queued for the owner at a time, so a slow owner
    /// does not accumulate a backlog of stale polls.
    pub fn spawn(
        handle: &DispatcherHandle,
        source: Arc<dyn ProgressSource>,
        interval: Duration,
        on_update: impl Fn(&ProgressSnapshot) + Send + Sync + 'static,
    ) -> PollerHandle {
        let finished = FinishFlag::new();
        if handle.is_torn_down() {
            finished.finish();
            return PollerHandle { finished };
        }

        let state = Arc::new(PollState {
            finished: finished.clone(),
            in_flight: AtomicBool::new(false),
            seen_running: AtomicBool::new(false),
            source,
            on_update: Arc::new(on_update),
        });

        let owner = handle.clone();
        handle.submit_background(move || {
            tracing::debug!(interval_ms = interval.as_millis() as u64, "Progress poller started");
            while !state.finished.is_finished() {
                thread::sleep(interval);
                if owner.is_torn_down() {
                    state.finished.finish();
                    break;
                }
                if state.in_flight.swap(true, Ordering::AcqRel) {
                    continue;
                }
                let poll = Arc::clone(&state);
                owner.submit_to_owner(move || poll.poll_on_owner());
            }
            tracing::debug!("Progress poller stopped");
        });

        PollerHandle { finished }
    }
}

/// Control handle for a running poller.
#[derive(Debug, Clone)]
pub struct PollerHandle {
    finished: FinishFlag,
}

impl PollerHandle {
    /// Stop polling. A poll already queued for the owner becomes a no-op.
    pub fn stop(&self) {
        self.finished.finish();
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_finished()
    }

    /// The shared flag, for callers that track completion themselves.
    pub fn finish_flag(&self) -> FinishFlag {
        self.finished.clone()
    }
}
