//! Configuration management for m3u8d.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use m3u8d_core::config::{ConfigManager, ConfigSection};
//!
//! // Create manager and load (or create default) config
//! let mut config = ConfigManager::new(".config/m3u8d.toml");
//! config.load_or_create().unwrap();
//!
//! // Read settings
//! println!("Workers: {}", config.settings().dispatcher.effective_worker_count());
//!
//! // Modify a setting
//! config.settings_mut().logging.log_to_file = true;
//!
//! // Save just the logging section atomically
//! config.update_section(ConfigSection::Logging).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{ConfigSection, DispatcherSettings, LoggingSettings, Settings};
