//! Logging infrastructure for m3u8d.
//!
//! This module provides:
//! - Global `tracing` subscriber setup (stderr, optional log file)
//! - Forwarding of log lines to the owner (UI) thread
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use m3u8d_core::logging::{init_tracing, LogLevel, OwnerLogForwarder};
//! use m3u8d_core::sync_ui::Dispatcher;
//!
//! init_tracing(LogLevel::Info);
//!
//! let dispatcher = Dispatcher::with_workers(2).unwrap();
//! let forwarder = OwnerLogForwarder::new(
//!     dispatcher.handle(),
//!     Arc::new(|line: &str| println!("{}", line)),
//! );
//!
//! forwarder.log("Starting download");
//! dispatcher.drain();
//! ```

mod forward;
mod types;

pub use forward::OwnerLogForwarder;
pub use types::{GuiLogCallback, LogLevel, MessagePrefix};

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingSettings;

/// File name prefix for log files written by [`init_tracing_with_file`].
pub const LOG_FILE_PREFIX: &str = "m3u8d";

/// Initialize global tracing subscriber for application-wide logging.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Outputs to stderr with timestamps
///
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(env_filter(default_level))
        .init();
}

/// Like [`init_tracing`], plus a non-blocking file layer in `log_dir`.
///
/// Keep the returned guard alive for the life of the program; dropping it
/// flushes and stops the file writer.
pub fn init_tracing_with_file(
    default_level: LogLevel,
    log_dir: impl AsRef<Path>,
) -> Result<WorkerGuard, InitError> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(log_dir.as_ref())?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_thread_names(true)
                .with_writer(writer),
        )
        .with(env_filter(default_level))
        .init();

    Ok(guard)
}

/// Initialize tracing from the `[logging]` config section.
///
/// Returns the file writer guard when file logging is enabled.
pub fn init_from_settings(settings: &LoggingSettings) -> Result<Option<WorkerGuard>, InitError> {
    if settings.log_to_file {
        init_tracing_with_file(settings.level, &settings.logs_folder).map(Some)
    } else {
        init_tracing(settings.level);
        Ok(None)
    }
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

fn env_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()))
}
