//! Broadcast bus carrying [`BatchEvent`]s to any number of subscribers.

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::{BatchEvent, EventEnvelope, LogSeverity};
use crate::types::{ArtifactDescriptor, JobStatus};

/// Default channel capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// Cloneable handle for publishing batch events.
///
/// Publishing with no subscriber attached is not an error; the event is
/// dropped. Log lines are mirrored to `tracing` regardless.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with an explicit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Publish an event.
    pub fn publish(&self, event: BatchEvent) {
        if self.sender.send(EventEnvelope::new(event)).is_err() {
            debug!("No event subscribers attached");
        }
    }

    /// Publish a job status change.
    pub fn job_status(&self, file_name: &str, status: JobStatus) {
        self.publish(BatchEvent::JobStatusChanged {
            file_name: file_name.to_string(),
            status,
        });
    }

    /// Publish a progress update. `percent` is clamped to 100.
    pub fn progress(&self, percent: u8, label: impl Into<String>) {
        self.publish(BatchEvent::Progress {
            percent: percent.min(100),
            label: label.into(),
        });
    }

    /// Publish a log line and mirror it to `tracing`.
    pub fn log(&self, text: impl Into<String>, severity: LogSeverity) {
        let text = text.into();
        match severity {
            LogSeverity::Info | LogSeverity::Success => info!(target: "romcnv::console", "{}", text),
            LogSeverity::Warning => warn!(target: "romcnv::console", "{}", text),
            LogSeverity::Error => error!(target: "romcnv::console", "{}", text),
        }
        self.publish(BatchEvent::LogLine { text, severity });
    }

    /// Publish the completed artifact set.
    pub fn artifacts_ready(&self, descriptors: Vec<ArtifactDescriptor>) {
        self.publish(BatchEvent::ArtifactsReady { descriptors });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
