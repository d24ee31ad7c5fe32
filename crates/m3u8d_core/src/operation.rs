//! Background operations that report back to the owner thread.
//!
//! `work` runs on a worker and owns every resource it needs; release
//! happens there (see [`ResourceGuard`]). `on_complete` only notifies the
//! owner and is skipped entirely if the dispatcher is torn down first.

use std::sync::Arc;
use std::time::Duration;

use crate::progress::{PollerHandle, ProgressPoller, ProgressSnapshot, ProgressSource};
use crate::sync_ui::DispatcherHandle;

/// Run `work` in the background, then `on_complete(result)` on the owner.
pub fn spawn_operation<R, W, C>(handle: &DispatcherHandle, work: W, on_complete: C)
where
    R: Send + 'static,
    W: FnOnce() -> R + Send + 'static,
    C: FnOnce(R) + Send + 'static,
{
    let owner = handle.clone();
    handle.submit_background(move || {
        let result = work();
        owner.submit_to_owner(move || on_complete(result));
    });
}

/// Like [`spawn_operation`], with a progress poller running alongside.
///
/// The poller is stopped on the owner thread just before `on_complete`
/// runs, so no progress update is delivered after the completion.
pub fn spawn_tracked_operation<R, W, U, C>(
    handle: &DispatcherHandle,
    source: Arc<dyn ProgressSource>,
    interval: Duration,
    work: W,
    on_update: U,
    on_complete: C,
) -> PollerHandle
where
    R: Send + 'static,
    W: FnOnce() -> R + Send + 'static,
    U: Fn(&ProgressSnapshot) + Send + Sync + 'static,
    C: FnOnce(R) + Send + 'static,
{
    let poller = ProgressPoller::spawn(handle, source, interval, on_update);
    let stop = poller.clone();
    spawn_operation(handle, work, move |result| {
        stop.stop();
        on_complete(result);
    });
    poller
}

/// Runs a release closure when dropped, on whichever thread drops it.
///
/// Ties cleanup to scope instead of to an owner task that may never run.
#[must_use = "the resource is released as soon as the guard is dropped"]
pub struct ResourceGuard<F: FnOnce()> {
    release: Option<F>,
}

impl<F: FnOnce()> ResourceGuard<F> {
    pub fn new(release: F) -> Self {
        Self {
            release: Some(release),
        }
    }

    /// Cancel the release; ownership moved elsewhere.
    pub fn disarm(mut self) {
        self.release = None;
    }
}

impl<F: FnOnce()> Drop for ResourceGuard<F> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
