//! Cross-thread task dispatch between background workers and the owner
//! (UI) thread.
//!
//! This module provides:
//! - A bounded worker pool for fire-and-forget background tasks
//! - A mutex-guarded FIFO of owner tasks, drained on the owner thread
//! - A level-triggered wake signal with an optional event-loop hook
//! - One-way teardown that drops undrained owner work
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use m3u8d_core::sync_ui::Dispatcher;
//!
//! let dispatcher = Dispatcher::with_workers(4).unwrap();
//! let handle = dispatcher.handle();
//!
//! dispatcher.submit_background(move || {
//!     let result = 6 * 7;
//!     handle.submit_to_owner(move || println!("result: {}", result));
//! });
//!
//! // Owner event loop tick
//! dispatcher.wait_and_drain(Duration::from_millis(50));
//! ```

mod dispatcher;
mod pool;
mod wake;

pub use dispatcher::{DispatchError, Dispatcher, DispatcherHandle, Lifecycle, OwnerTask};
pub use pool::{BackgroundTask, WorkerPool};
pub use wake::{WakeNotifier, WakeSignal};
