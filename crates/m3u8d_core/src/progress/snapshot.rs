//! Progress snapshot reported by the download/merge engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Point-in-time view of a running operation.
///
/// The dispatcher never interprets these fields; owner tasks hand them to
/// display logic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Completion, 0..=100.
    pub percent: u8,
    /// Short title shown above the progress bar.
    pub title: String,
    /// Status-bar text (speed, sleeping threads, ...).
    pub status_bar: String,
    /// Whether the operation is still in progress.
    pub is_running: bool,
    /// Failure message, if the operation failed.
    pub error_message: Option<String>,
    /// Whether the failure was a user cancellation.
    pub is_cancelled: bool,
    /// Whether the output already existed and the work was skipped.
    pub is_skipped: bool,
    /// Where the result was written.
    pub save_file_to: Option<PathBuf>,
}

/// What a snapshot means for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Still in progress.
    Running,
    /// Stopped by the user. Nothing to report.
    Cancelled,
    /// Failed with a message.
    Failed(String),
    /// Output already existed.
    Skipped(Option<PathBuf>),
    /// Completed successfully.
    Finished(Option<PathBuf>),
}

impl ProgressSnapshot {
    /// A running snapshot at `percent` (clamped to 100).
    pub fn running(percent: u8, title: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            title: title.into(),
            is_running: true,
            ..Self::default()
        }
    }

    /// A finished snapshot at 100%.
    pub fn finished(save_file_to: impl Into<PathBuf>) -> Self {
        Self {
            percent: 100,
            save_file_to: Some(save_file_to.into()),
            ..Self::default()
        }
    }

    /// A failed snapshot.
    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            error_message: Some(error_message.into()),
            ..Self::default()
        }
    }

    /// Percent as a 0.0..=1.0 fraction for progress bars.
    pub fn fraction(&self) -> f64 {
        f64::from(self.percent.min(100)) / 100.0
    }

    /// Classify the snapshot.
    ///
    /// Cancellation wins over an error message, which wins over a skip.
    pub fn outcome(&self) -> Outcome {
        if self.is_running {
            return Outcome::Running;
        }
        if self.is_cancelled {
            return Outcome::Cancelled;
        }
        if let Some(ref msg) = self.error_message {
            if !msg.is_empty() {
                return Outcome::Failed(msg.clone());
            }
        }
        if self.is_skipped {
            return Outcome::Skipped(self.save_file_to.clone());
        }
        Outcome::Finished(self.save_file_to.clone())
    }
}
