//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Background worker and owner-dispatch settings.
    #[serde(default)]
    pub dispatcher: DispatcherSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Worker pool and polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherSettings {
    /// Number of background workers. 0 means one per available core.
    #[serde(default)]
    pub worker_count: usize,

    /// Prefix for worker thread names.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,

    /// Backlog size that triggers a warning. 0 disables the warning.
    #[serde(default = "default_backlog_warn_threshold")]
    pub backlog_warn_threshold: usize,

    /// Interval between progress polls, in milliseconds.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

fn default_thread_name() -> String {
    "m3u8d-worker".to_string()
}

fn default_backlog_warn_threshold() -> usize {
    256
}

fn default_progress_interval_ms() -> u64 {
    50
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            worker_count: 0,
            thread_name: default_thread_name(),
            backlog_warn_threshold: default_backlog_warn_threshold(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

impl DispatcherSettings {
    /// Worker count with 0 resolved to the available parallelism.
    pub fn effective_worker_count(&self) -> usize {
        if self.worker_count > 0 {
            return self.worker_count;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

    /// Progress poll interval as a `Duration`.
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is not set.
    #[serde(default)]
    pub level: LogLevel,

    /// Also write logs to a file in `logs_folder`.
    #[serde(default)]
    pub log_to_file: bool,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Prefix forwarded UI log lines with `[HH:MM:SS]`.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

fn default_true() -> bool {
    true
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            log_to_file: false,
            logs_folder: default_logs_folder(),
            show_timestamps: true,
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Dispatcher,
    Logging,
}

impl ConfigSection {
    /// All sections, in file order.
    pub const ALL: [ConfigSection; 2] = [ConfigSection::Dispatcher, ConfigSection::Logging];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Dispatcher => "dispatcher",
            ConfigSection::Logging => "logging",
        }
    }

    /// Comment written above the section in generated files.
    pub fn description(&self) -> &'static str {
        match self {
            ConfigSection::Dispatcher => "Background workers and UI-thread dispatch",
            ConfigSection::Logging => "Logging configuration",
        }
    }
}
