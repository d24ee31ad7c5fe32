//! m3u8d core - owner-thread dispatch for the m3u8d desktop shell.
//!
//! The download/merge engine runs on background workers; everything that
//! touches UI state is posted back to the owner thread and drained there.
//! This crate has no UI toolkit dependency: the owner context is whatever
//! thread creates the [`sync_ui::Dispatcher`] and calls its drain.

pub mod config;
pub mod logging;
pub mod operation;
pub mod progress;
pub mod sync_ui;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
