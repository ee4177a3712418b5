//! Conversion job status lattice.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a queued conversion job.
///
/// The lattice is `Pending -> Processing -> {Completed | Error}`. There is
/// no backward edge and no retry edge out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted into the queue, not yet dispatched.
    Pending,
    /// Currently staged and handed to the backend.
    Processing,
    /// The expected artifact was found after invocation.
    Completed,
    /// Staging failed or no artifact appeared.
    Error,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Whether moving from `self` to `next` respects the lattice.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Error)
        )
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
