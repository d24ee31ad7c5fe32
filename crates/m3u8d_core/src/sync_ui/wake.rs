//! Level-triggered wake signal for the owner context.
//!
//! Any number of raises between two takes collapse into a single
//! "queue is non-empty" notification.

use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

/// Hook invoked when the signal goes from lowered to raised.
///
/// Used to wake an external event loop (e.g. a GUI toolkit's proxy) so it
/// schedules a drain on the owner thread.
pub type WakeNotifier = Arc<dyn Fn() + Send + Sync>;

/// Level-triggered flag with a condvar for blocking owners.
pub struct WakeSignal {
    raised: Mutex<bool>,
    condvar: Condvar,
    notifier: RwLock<Option<WakeNotifier>>,
}

impl WakeSignal {
    /// Create a lowered signal with no notifier.
    pub fn new() -> Self {
        Self {
            raised: Mutex::new(false),
            condvar: Condvar::new(),
            notifier: RwLock::new(None),
        }
    }

    /// Install (or replace) the event-loop notifier.
    pub fn set_notifier(&self, notifier: WakeNotifier) {
        *self.notifier.write() = Some(notifier);
    }

    /// Raise the signal.
    ///
    /// Returns true if this call transitioned the signal from lowered to
    /// raised. Only that transition wakes waiters and calls the notifier.
    pub fn raise(&self) -> bool {
        let was_raised = mem::replace(&mut *self.raised.lock(), true);
        if was_raised {
            return false;
        }

        self.condvar.notify_one();
        let notifier = self.notifier.read().clone();
        if let Some(notify) = notifier {
            notify();
        }
        true
    }

    /// Lower the signal, returning whether it was raised.
    pub fn take(&self) -> bool {
        mem::replace(&mut *self.raised.lock(), false)
    }

    /// Whether the signal is currently raised.
    pub fn is_raised(&self) -> bool {
        *self.raised.lock()
    }

    /// Block until the signal is raised or `timeout` elapses, then lower it.
    ///
    /// Returns true if the signal was raised.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut raised = self.raised.lock();
        while !*raised {
            if self.condvar.wait_until(&mut raised, deadline).timed_out() {
                break;
            }
        }
        mem::replace(&mut *raised, false)
    }
}

impl Default for WakeSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WakeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeSignal")
            .field("raised", &self.is_raised())
            .field("has_notifier", &self.notifier.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn raises_collapse_until_taken() {
        let signal = WakeSignal::new();

        assert!(signal.raise());
        assert!(!signal.raise());
        assert!(!signal.raise());

        assert!(signal.take());
        assert!(!signal.take());
        assert!(signal.raise());
    }

    #[test]
    fn notifier_fires_once_per_transition() {
        let signal = WakeSignal::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        signal.set_notifier(Arc::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));

        signal.raise();
        signal.raise();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        signal.take();
        signal.raise();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn wait_times_out_when_lowered() {
        let signal = WakeSignal::new();
        let started = Instant::now();

        assert!(!signal.wait(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn wait_returns_after_raise_from_other_thread() {
        let signal = Arc::new(WakeSignal::new());
        let raiser = signal.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            raiser.raise();
        });

        assert!(signal.wait(Duration::from_secs(5)));
        assert!(!signal.is_raised());
        handle.join().unwrap();
    }
}
