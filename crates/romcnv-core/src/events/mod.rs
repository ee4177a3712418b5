//! Events emitted by a running batch.
//!
//! The pipeline never mutates presentation state directly; it publishes
//! these events on the [`EventBus`] and whatever front end is attached
//! renders them.

pub mod bus;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ArtifactDescriptor, JobStatus};

pub use bus::EventBus;

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    /// Plain progress output.
    Info,
    /// A positive outcome.
    Success,
    /// Something unexpected that did not stop the batch.
    Warning,
    /// A failure.
    Error,
}

/// Observable batch event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    /// A job moved to a new status.
    JobStatusChanged {
        /// Input file name of the job.
        file_name: String,
        /// The new status.
        status: JobStatus,
    },
    /// Overall progress of the batch.
    Progress {
        /// Completion percentage, 0..=100.
        percent: u8,
        /// Short description of the current step.
        label: String,
    },
    /// A line of console output.
    LogLine {
        /// The text.
        text: String,
        /// Severity used for styling.
        severity: LogSeverity,
    },
    /// Completed artifacts are ready to be packaged.
    ArtifactsReady {
        /// Descriptors of all completed jobs.
        descriptors: Vec<ArtifactDescriptor>,
    },
}

/// Wrapper for batch events with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    pub event: BatchEvent,
}

impl EventEnvelope {
    /// Wrap an event with a fresh id and the current time.
    pub fn new(event: BatchEvent) -> Self {
        Self {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event,
        }
    }
}
