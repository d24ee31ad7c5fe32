//! Owner-thread dispatcher.
//!
//! Background work runs on a [`WorkerPool`]. Anything that must touch
//! owner-context state (widgets, view models) is posted back through
//! [`DispatcherHandle::submit_to_owner`] and runs when the owner calls
//! [`Dispatcher::drain`].
//!
//! Lifetime contract: owner tasks are `'static` and own what they capture.
//! A task that reaches owner state must do so through a shared handle
//! (`Arc`, channel sender) that stays valid after teardown; capturing
//! anything that dangles once the owner goes away is a contract violation.
//! Owner tasks are notifications only. They are dropped unexecuted on
//! teardown, so resource release must never live inside one.

use std::io;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use super::pool::{BackgroundTask, WorkerPool};
use super::wake::{WakeNotifier, WakeSignal};
use crate::config::DispatcherSettings;

/// A unit of work destined for the owner context.
pub type OwnerTask = Box<dyn FnOnce() + Send + 'static>;

/// Errors from constructing a dispatcher.
///
/// Submissions never fail; see the module docs.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] io::Error),
}

/// Dispatcher lifecycle. One-way: `Active` then `TornDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Accepting and executing both task kinds.
    Active,
    /// Owner context stopped draining. Owner submissions are dropped.
    TornDown,
}

/// State shared between the owner and every handle.
struct Shared {
    pending: Mutex<Vec<OwnerTask>>,
    wake: WakeSignal,
    torn_down: AtomicBool,
}

impl Shared {
    fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    fn submit_to_owner(&self, task: OwnerTask) {
        {
            let mut pending = self.pending.lock();
            // Checked under the lock so nothing lands after teardown's clear.
            if self.is_torn_down() {
                tracing::trace!("Owner task dropped: dispatcher torn down");
                return;
            }
            pending.push(task);
        }
        self.wake.raise();
    }
}

fn submit_background(shared: &Shared, pool: &WorkerPool, task: BackgroundTask) {
    if shared.is_torn_down() || !pool.submit(task) {
        tracing::trace!("Background task dropped: dispatcher torn down");
    }
}

/// Owner-side dispatcher.
///
/// Pinned to the thread that created it (neither `Send` nor `Sync`), which
/// makes that thread the owner context and guarantees drains never overlap.
/// Dropping the dispatcher tears it down.
pub struct Dispatcher {
    shared: Arc<Shared>,
    pool: WorkerPool,
    _owner: PhantomData<*const ()>,
}

impl Dispatcher {
    /// Create a dispatcher owned by the current thread.
    pub fn new(settings: &DispatcherSettings) -> Result<Self, DispatchError> {
        let pool = WorkerPool::new(
            settings.effective_worker_count(),
            settings.thread_name.clone(),
            settings.backlog_warn_threshold,
        )?;

        Ok(Self {
            shared: Arc::new(Shared {
                pending: Mutex::new(Vec::new()),
                wake: WakeSignal::new(),
                torn_down: AtomicBool::new(false),
            }),
            pool,
            _owner: PhantomData,
        })
    }

    /// Create a dispatcher with `workers` threads and otherwise default settings.
    pub fn with_workers(workers: usize) -> Result<Self, DispatchError> {
        let settings = DispatcherSettings {
            worker_count: workers,
            ..DispatcherSettings::default()
        };
        Self::new(&settings)
    }

    /// Install an event-loop wake hook.
    ///
    /// Called from the submitting thread each time the wake signal goes
    /// from lowered to raised. It should only schedule a drain on the owner
    /// (post to the toolkit's event queue); it must not drain itself.
    pub fn with_notifier(self, notifier: impl Fn() + Send + Sync + 'static) -> Self {
        let notifier: WakeNotifier = Arc::new(notifier);
        self.shared.wake.set_notifier(notifier);
        self
    }

    /// Submission handle for passing to background work.
    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            shared: Arc::clone(&self.shared),
            pool: self.pool.clone(),
        }
    }

    /// Run `task` on a worker thread. Fire and forget.
    pub fn submit_background(&self, task: impl FnOnce() + Send + 'static) {
        submit_background(&self.shared, &self.pool, Box::new(task));
    }

    /// Queue `task` for the next drain. Fire and forget.
    pub fn submit_to_owner(&self, task: impl FnOnce() + Send + 'static) {
        self.shared.submit_to_owner(Box::new(task));
    }

    /// Run every owner task queued so far, in submission order.
    ///
    /// The queue is swapped out under the lock and executed without it, so
    /// producers never wait on a running task. Tasks submitted while the
    /// batch runs (including by the batch itself) go to the next drain.
    ///
    /// Returns the number of tasks executed. If a task panics, the panic
    /// propagates to the caller and the rest of the batch is dropped.
    pub fn drain(&self) -> usize {
        // Lower before swapping: a raise racing the swap then survives for
        // the next drain instead of being lost.
        self.shared.wake.take();

        let batch = {
            let mut pending = self.shared.pending.lock();
            if self.shared.is_torn_down() {
                return 0;
            }
            std::mem::take(&mut *pending)
        };

        let count = batch.len();
        for task in batch {
            task();
        }

        if count > 0 {
            tracing::trace!(count, "Drained owner tasks");
        }
        count
    }

    /// Block for up to `timeout` waiting for owner work, then drain.
    ///
    /// For owner contexts that are a dedicated thread rather than an event
    /// loop tick. Returns immediately once torn down.
    pub fn wait_and_drain(&self, timeout: Duration) -> usize {
        if self.is_torn_down() {
            return 0;
        }
        if self.shared.wake.wait(timeout) {
            // `wait` already lowered the signal; drain lowers it again harmlessly.
            self.drain()
        } else if self.pending_owner_tasks() > 0 {
            self.drain()
        } else {
            0
        }
    }

    /// Mark the dispatcher torn down.
    ///
    /// Undrained owner tasks are dropped without running and later owner
    /// submissions are discarded. Background tasks already handed to the
    /// pool keep running; new ones are refused. Never waits on workers.
    /// Idempotent.
    pub fn teardown(&self) {
        let discarded = {
            let mut pending = self.shared.pending.lock();
            if self.shared.torn_down.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *pending)
        };
        self.pool.close();

        tracing::debug!(
            discarded = discarded.len(),
            "Dispatcher torn down"
        );
        // Dropped outside the lock: captured values may run arbitrary Drop code.
        drop(discarded);
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        if self.is_torn_down() {
            Lifecycle::TornDown
        } else {
            Lifecycle::Active
        }
    }

    /// Whether `teardown` has run.
    pub fn is_torn_down(&self) -> bool {
        self.shared.is_torn_down()
    }

    /// Owner tasks waiting for the next drain.
    pub fn pending_owner_tasks(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// The background worker pool.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("lifecycle", &self.lifecycle())
            .field("pending_owner_tasks", &self.pending_owner_tasks())
            .field("pool", &self.pool)
            .finish()
    }
}

/// Cloneable, thread-safe submission side of a [`Dispatcher`].
///
/// Holding a handle never keeps the owner draining: once the dispatcher is
/// torn down, submissions through the handle are silently dropped.
#[derive(Clone)]
pub struct DispatcherHandle {
    shared: Arc<Shared>,
    pool: WorkerPool,
}

impl DispatcherHandle {
    /// Run `task` on a worker thread. Fire and forget.
    pub fn submit_background(&self, task: impl FnOnce() + Send + 'static) {
        submit_background(&self.shared, &self.pool, Box::new(task));
    }

    /// Queue `task` for the owner's next drain. Fire and forget.
    pub fn submit_to_owner(&self, task: impl FnOnce() + Send + 'static) {
        self.shared.submit_to_owner(Box::new(task));
    }

    /// Whether the owning dispatcher has been torn down.
    pub fn is_torn_down(&self) -> bool {
        self.shared.is_torn_down()
    }
}

impl std::fmt::Debug for DispatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherHandle")
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    fn dispatcher() -> Dispatcher {
        Dispatcher::with_workers(2).unwrap()
    }

    /// Drain until `done` holds or the deadline passes.
    fn drain_until(dispatcher: &Dispatcher, mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "timed out waiting for owner tasks");
            dispatcher.wait_and_drain(Duration::from_millis(10));
        }
    }

    #[test]
    fn drain_on_empty_queue_is_noop() {
        let dispatcher = dispatcher();
        let started = Instant::now();

        assert_eq!(dispatcher.drain(), 0);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn owner_tasks_run_in_fifo_order() {
        let dispatcher = dispatcher();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let order = order.clone();
            dispatcher.submit_to_owner(move || order.lock().push(i));
        }

        assert_eq!(dispatcher.pending_owner_tasks(), 10);
        assert_eq!(dispatcher.drain(), 10);
        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
        assert_eq!(dispatcher.pending_owner_tasks(), 0);
    }

    #[test]
    fn owner_tasks_run_on_owner_thread() {
        let dispatcher = dispatcher();
        let owner = thread::current().id();
        let ran_on = Arc::new(Mutex::new(None));

        let handle = dispatcher.handle();
        let ran_on_clone = ran_on.clone();
        dispatcher.submit_background(move || {
            handle.submit_to_owner(move || {
                *ran_on_clone.lock() = Some(thread::current().id());
            });
        });

        drain_until(&dispatcher, || ran_on.lock().is_some());
        assert_eq!(*ran_on.lock(), Some(owner));
    }

    #[test]
    fn sequential_producers_keep_order() {
        let dispatcher = dispatcher();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["A", "B", "C"] {
            let handle = dispatcher.handle();
            let order = order.clone();
            thread::spawn(move || {
                handle.submit_to_owner(move || order.lock().push(label));
            })
            .join()
            .unwrap();
        }

        assert_eq!(dispatcher.drain(), 3);
        assert_eq!(*order.lock(), vec!["A", "B", "C"]);
    }

    #[test]
    fn concurrent_producers_each_task_runs_once() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 1000;

        let dispatcher = dispatcher();
        let executions = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::with_capacity(PRODUCERS * PER_PRODUCER)));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let handle = dispatcher.handle();
                let executions = executions.clone();
                let seen = seen.clone();
                thread::spawn(move || {
                    for seq in 0..PER_PRODUCER {
                        let executions = executions.clone();
                        let seen = seen.clone();
                        handle.submit_to_owner(move || {
                            executions.fetch_add(1, Ordering::SeqCst);
                            seen.lock().push((producer, seq));
                        });
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        assert_eq!(dispatcher.drain(), PRODUCERS * PER_PRODUCER);
        assert_eq!(executions.load(Ordering::SeqCst), PRODUCERS * PER_PRODUCER);

        let seen = seen.lock();
        let unique: HashSet<_> = seen.iter().copied().collect();
        assert_eq!(unique.len(), PRODUCERS * PER_PRODUCER);

        // Each producer's own submissions keep their relative order.
        for producer in 0..PRODUCERS {
            let seqs: Vec<_> = seen
                .iter()
                .filter(|(p, _)| *p == producer)
                .map(|(_, s)| *s)
                .collect();
            assert_eq!(seqs, (0..PER_PRODUCER).collect::<Vec<_>>());
        }
    }

    #[test]
    fn concurrent_producers_interleaved_with_drains() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 1000;

        let dispatcher = dispatcher();
        let counts: Arc<Vec<AtomicUsize>> = Arc::new(
            (0..PRODUCERS * PER_PRODUCER)
                .map(|_| AtomicUsize::new(0))
                .collect(),
        );

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let handle = dispatcher.handle();
                let counts = counts.clone();
                thread::spawn(move || {
                    for seq in 0..PER_PRODUCER {
                        let counts = counts.clone();
                        handle.submit_to_owner(move || {
                            counts[producer * PER_PRODUCER + seq].fetch_add(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();

        let mut total = 0;
        while producers.iter().any(|p| !p.is_finished()) {
            total += dispatcher.drain();
        }
        for producer in producers {
            producer.join().unwrap();
        }
        total += dispatcher.drain();

        assert_eq!(total, PRODUCERS * PER_PRODUCER);
        assert!(counts.iter().all(|c| c.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn submissions_during_drain_wait_for_next_drain() {
        let dispatcher = dispatcher();
        let handle = dispatcher.handle();
        let inner_ran = Arc::new(AtomicBool::new(false));

        let inner_flag = inner_ran.clone();
        dispatcher.submit_to_owner(move || {
            handle.submit_to_owner(move || inner_flag.store(true, Ordering::SeqCst));
        });

        assert_eq!(dispatcher.drain(), 1);
        assert!(!inner_ran.load(Ordering::SeqCst));
        assert_eq!(dispatcher.drain(), 1);
        assert!(inner_ran.load(Ordering::SeqCst));
    }

    #[test]
    fn background_tasks_never_enter_owner_queue() {
        let dispatcher = dispatcher();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        dispatcher.submit_background(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        });
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(dispatcher.pending_owner_tasks(), 0);
        let started = Instant::now();
        assert_eq!(dispatcher.drain(), 0);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(dispatcher.pool().active(), 1);

        release_tx.send(()).unwrap();
    }

    #[test]
    fn owner_task_after_teardown_never_runs() {
        let dispatcher = dispatcher();
        let handle = dispatcher.handle();
        let ran = Arc::new(AtomicBool::new(false));

        dispatcher.teardown();
        assert_eq!(dispatcher.lifecycle(), Lifecycle::TornDown);

        let ran_clone = ran.clone();
        handle.submit_to_owner(move || ran_clone.store(true, Ordering::SeqCst));
        let ran_clone = ran.clone();
        dispatcher.submit_to_owner(move || ran_clone.store(true, Ordering::SeqCst));

        assert_eq!(dispatcher.pending_owner_tasks(), 0);
        assert_eq!(dispatcher.drain(), 0);
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn teardown_drops_undrained_tasks() {
        struct DropCounter(Arc<AtomicUsize>);
        impl Drop for DropCounter {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let dispatcher = dispatcher();
        let drops = Arc::new(AtomicUsize::new(0));
        let ran = Arc::new(AtomicBool::new(false));

        let counter = DropCounter(drops.clone());
        let ran_clone = ran.clone();
        dispatcher.submit_to_owner(move || {
            let _counter = counter;
            ran_clone.store(true, Ordering::SeqCst);
        });

        dispatcher.teardown();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn teardown_is_idempotent() {
        let dispatcher = dispatcher();
        dispatcher.teardown();
        dispatcher.teardown();
        assert!(dispatcher.is_torn_down());
        assert_eq!(dispatcher.wait_and_drain(Duration::from_secs(5)), 0);
    }

    #[test]
    fn background_task_survives_teardown() {
        let dispatcher = dispatcher();
        let handle = dispatcher.handle();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel();
        let owner_ran = Arc::new(AtomicBool::new(false));

        let owner_flag = owner_ran.clone();
        dispatcher.submit_background(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
            handle.submit_to_owner(move || owner_flag.store(true, Ordering::SeqCst));
            done_tx.send(handle.is_torn_down()).unwrap();
        });

        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        dispatcher.teardown();
        release_tx.send(()).unwrap();

        let saw_teardown = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(saw_teardown);
        assert_eq!(dispatcher.drain(), 0);
        assert!(!owner_ran.load(Ordering::SeqCst));
    }

    #[test]
    fn background_submission_after_teardown_is_dropped() {
        let dispatcher = dispatcher();
        dispatcher.teardown();

        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        dispatcher.submit_background(move || ran_clone.store(true, Ordering::SeqCst));

        dispatcher.pool().join();
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn notifier_collapses_multiple_submissions() {
        let notified = Arc::new(AtomicUsize::new(0));
        let notified_clone = notified.clone();
        let dispatcher = dispatcher().with_notifier(move || {
            notified_clone.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..3 {
            dispatcher.submit_to_owner(|| {});
        }
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        assert_eq!(dispatcher.drain(), 3);
        dispatcher.submit_to_owner(|| {});
        assert_eq!(notified.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn wait_and_drain_times_out_without_work() {
        let dispatcher = dispatcher();
        assert_eq!(dispatcher.wait_and_drain(Duration::from_millis(10)), 0);
    }

    #[test]
    #[should_panic(expected = "owner failure")]
    fn owner_task_panic_propagates_from_drain() {
        let dispatcher = dispatcher();
        dispatcher.submit_to_owner(|| panic!("owner failure"));
        dispatcher.drain();
    }
}
