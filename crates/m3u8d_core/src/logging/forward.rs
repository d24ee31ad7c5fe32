//! Forwarding of log lines to owner-context display logic.
//!
//! Background work cannot touch the log widget directly. The forwarder
//! wraps each line in an owner task so the sink only ever runs on the
//! owner thread, in the order the lines were logged.

use chrono::Local;

use super::types::{GuiLogCallback, MessagePrefix};
use crate::sync_ui::DispatcherHandle;

/// Posts log lines to a [`GuiLogCallback`] on the owner thread.
#[derive(Clone)]
pub struct OwnerLogForwarder {
    handle: DispatcherHandle,
    sink: GuiLogCallback,
    show_timestamps: bool,
}

impl OwnerLogForwarder {
    /// Create a forwarder with timestamps enabled.
    pub fn new(handle: DispatcherHandle, sink: GuiLogCallback) -> Self {
        Self {
            handle,
            sink,
            show_timestamps: true,
        }
    }

    /// Enable or disable the `[HH:MM:SS]` prefix.
    pub fn show_timestamps(mut self, show: bool) -> Self {
        self.show_timestamps = show;
        self
    }

    /// Forward a plain line.
    pub fn log(&self, message: &str) {
        tracing::info!(target: "m3u8d::ui", "{}", message);
        self.forward(MessagePrefix::None.format(message));
    }

    /// Forward a success line.
    pub fn success(&self, message: &str) {
        tracing::info!(target: "m3u8d::ui", "{}", message);
        self.forward(MessagePrefix::Success.format(message));
    }

    /// Forward a warning line.
    pub fn warn(&self, message: &str) {
        tracing::warn!(target: "m3u8d::ui", "{}", message);
        self.forward(MessagePrefix::Warning.format(message));
    }

    /// Forward an error line.
    pub fn error(&self, message: &str) {
        tracing::error!(target: "m3u8d::ui", "{}", message);
        self.forward(MessagePrefix::Error.format(message));
    }

    fn forward(&self, message: String) {
        let line = self.format_message(&message);
        let sink = self.sink.clone();
        self.handle.submit_to_owner(move || sink(&line));
    }

    /// Format a message with timestamp (if enabled).
    fn format_message(&self, message: &str) -> String {
        if self.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }
}

impl std::fmt::Debug for OwnerLogForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerLogForwarder")
            .field("show_timestamps", &self.show_timestamps)
            .finish()
    }
}
