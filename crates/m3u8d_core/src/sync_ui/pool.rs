//! Worker pool for background tasks.
//!
//! A fixed set of named threads pulling from one shared FIFO backlog.
//!
//! Backlog policy: unbounded. Submissions never block and are never
//! rejected while the pool is open; a warning is logged each time the
//! backlog crosses `backlog_warn_threshold`.
//!
//! Panic policy: a panicking task is not caught. It unwinds and kills the
//! worker thread it ran on, and a replacement worker is spawned so the pool
//! keeps its size.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

/// A unit of background work.
pub type BackgroundTask = Box<dyn FnOnce() + Send + 'static>;

/// Backlog state guarded by the pool mutex.
struct Backlog {
    tasks: VecDeque<BackgroundTask>,
    closed: bool,
    warned: bool,
}

struct PoolShared {
    backlog: Mutex<Backlog>,
    condvar: Condvar,
    /// Tasks currently executing.
    active: AtomicUsize,
    /// Monotonic id used in thread names (respawns get fresh ids).
    next_worker_id: AtomicUsize,
    thread_name: String,
    backlog_warn_threshold: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Cheaply cloneable handle to a shared worker pool.
#[derive(Clone)]
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    worker_count: usize,
}

impl WorkerPool {
    /// Spawn `worker_count` workers named `"{thread_name} {id}"`.
    ///
    /// A `worker_count` of zero is treated as one.
    pub fn new(
        worker_count: usize,
        thread_name: impl Into<String>,
        backlog_warn_threshold: usize,
    ) -> io::Result<Self> {
        let worker_count = worker_count.max(1);
        let shared = Arc::new(PoolShared {
            backlog: Mutex::new(Backlog {
                tasks: VecDeque::new(),
                closed: false,
                warned: false,
            }),
            condvar: Condvar::new(),
            active: AtomicUsize::new(0),
            next_worker_id: AtomicUsize::new(0),
            thread_name: thread_name.into(),
            backlog_warn_threshold,
            handles: Mutex::new(Vec::with_capacity(worker_count)),
        });

        let pool = Self {
            shared,
            worker_count,
        };

        for _ in 0..worker_count {
            if let Err(e) = spawn_worker(&pool.shared) {
                pool.close();
                return Err(e);
            }
        }

        tracing::debug!(
            workers = worker_count,
            name = %pool.shared.thread_name,
            "Worker pool started"
        );
        Ok(pool)
    }

    /// Queue a task. Returns false (and drops the task) if the pool is closed.
    pub fn submit(&self, task: BackgroundTask) -> bool {
        {
            let mut backlog = self.shared.backlog.lock();
            if backlog.closed {
                return false;
            }
            backlog.tasks.push_back(task);

            let threshold = self.shared.backlog_warn_threshold;
            if threshold > 0 {
                let len = backlog.tasks.len();
                if len >= threshold && !backlog.warned {
                    backlog.warned = true;
                    tracing::warn!(
                        pending = len,
                        workers = self.worker_count,
                        "Background backlog crossed warning threshold"
                    );
                } else if len < threshold {
                    backlog.warned = false;
                }
            }
        }
        self.shared.condvar.notify_one();
        true
    }

    /// Stop accepting tasks.
    ///
    /// Already queued tasks still run; workers exit once the backlog is
    /// empty. Never blocks on running tasks.
    pub fn close(&self) {
        let was_closed = {
            let mut backlog = self.shared.backlog.lock();
            std::mem::replace(&mut backlog.closed, true)
        };
        if !was_closed {
            self.shared.condvar.notify_all();
            tracing::debug!(name = %self.shared.thread_name, "Worker pool closed");
        }
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.backlog.lock().closed
    }

    /// Wait for every worker (including respawned ones) to exit.
    ///
    /// Only returns once the pool is closed and its backlog has run dry.
    pub fn join(&self) {
        loop {
            let handles: Vec<_> = std::mem::take(&mut *self.shared.handles.lock());
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                // A worker that panicked already handed over to its replacement.
                let _ = handle.join();
            }
        }
    }

    /// Number of worker threads the pool keeps alive.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Tasks queued but not yet started.
    pub fn pending(&self) -> usize {
        self.shared.backlog.lock().tasks.len()
    }

    /// Tasks currently executing.
    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// True when nothing is queued or running.
    pub fn is_idle(&self) -> bool {
        self.pending() == 0 && self.active() == 0
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("thread_name", &self.shared.thread_name)
            .field("worker_count", &self.worker_count)
            .field("pending", &self.pending())
            .field("active", &self.active())
            .finish()
    }
}

fn spawn_worker(shared: &Arc<PoolShared>) -> io::Result<()> {
    let id = shared.next_worker_id.fetch_add(1, Ordering::Relaxed);
    let worker_shared = Arc::clone(shared);
    let handle = thread::Builder::new()
        .name(format!("{} {}", shared.thread_name, id))
        .spawn(move || worker_loop(worker_shared))?;
    shared.handles.lock().push(handle);
    Ok(())
}

fn worker_loop(shared: Arc<PoolShared>) {
    loop {
        let task = {
            let mut backlog = shared.backlog.lock();
            loop {
                if let Some(task) = backlog.tasks.pop_front() {
                    break Some(task);
                }
                if backlog.closed {
                    break None;
                }
                shared.condvar.wait(&mut backlog);
            }
        };

        let Some(task) = task else {
            break;
        };

        shared.active.fetch_add(1, Ordering::SeqCst);
        let sentinel = Sentinel {
            shared: Arc::clone(&shared),
        };
        task();
        drop(sentinel);
    }
}

/// Decrements the active count when a task ends, and replaces the worker
/// if the task unwound.
struct Sentinel {
    shared: Arc<PoolShared>,
}

impl Drop for Sentinel {
    fn drop(&mut self) {
        self.shared.active.fetch_sub(1, Ordering::SeqCst);
        if thread::panicking() {
            tracing::error!(
                name = %self.shared.thread_name,
                "Background task panicked; replacing worker"
            );
            if let Err(e) = spawn_worker(&self.shared) {
                tracing::error!("Failed to respawn worker: {}", e);
            }
        }
    }
}
