//! Batch pipeline error type.
//!
//! Per-job failures (`StagingIo`, `ArtifactNotFound`, `Invocation`) are
//! recorded on the job and never abort the batch. The rest surface to the
//! caller.

use romcnv_backend::BackendError;
use romcnv_core::error::{AppError, ErrorKind};
use romcnv_core::types::{ArtifactKind, JobStatus, OutputFormat};
use thiserror::Error;

/// Errors raised while queueing, converting, or packaging.
#[derive(Debug, Error)]
pub enum BatchError {
    /// A file was refused at queue acceptance.
    #[error("Rejected '{file_name}': {reason}")]
    Rejected {
        /// The offending file.
        file_name: String,
        /// Why it was refused.
        reason: String,
    },

    /// No artifact rule exists for the requested format.
    #[error("System '{system}' has no '{format}' output")]
    UnsupportedFormat {
        /// The system key.
        system: String,
        /// The requested format.
        format: OutputFormat,
    },

    /// The queue holds jobs already run against another system.
    #[error("Job '{file_name}' was converted for {bound}; reset the queue before running {requested}")]
    SystemMismatch {
        /// The first job bound to another system.
        file_name: String,
        /// System that job ran against.
        bound: String,
        /// System the batch asked for.
        requested: String,
    },

    /// The backend could not be loaded or activated.
    #[error(transparent)]
    BackendUnavailable(BackendError),

    /// A read or write against the sandbox failed.
    #[error("Staging I/O failed on {path}: {message}")]
    StagingIo {
        /// The sandbox path.
        path: String,
        /// Underlying failure.
        message: String,
    },

    /// The backend could not be run.
    #[error("Invocation failed: {0}")]
    Invocation(String),

    /// The backend ran but the expected artifact did not appear.
    #[error("No {kind:?} artifact at {path}")]
    ArtifactNotFound {
        /// Expected location.
        path: String,
        /// Expected shape.
        kind: ArtifactKind,
    },

    /// A job status change that breaks the lattice.
    #[error("Job '{file_name}' cannot move from {from} to {to}")]
    InvalidTransition {
        /// The job's file.
        file_name: String,
        /// Current status.
        from: JobStatus,
        /// Requested status.
        to: JobStatus,
    },

    /// Building the deliverable failed.
    #[error("Packaging failed: {0}")]
    Packaging(String),
}

impl From<BackendError> for BatchError {
    fn from(err: BackendError) -> Self {
        match &err {
            BackendError::InvalidPath { path }
            | BackendError::NotFound { path }
            | BackendError::Sandbox { path, .. } => Self::StagingIo {
                path: path.clone(),
                message: err.to_string(),
            },
            BackendError::Invocation { .. } => Self::Invocation(err.to_string()),
            _ => Self::BackendUnavailable(err),
        }
    }
}

impl From<zip::result::ZipError> for BatchError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Packaging(err.to_string())
    }
}

impl From<tokio::task::JoinError> for BatchError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Packaging(format!("packaging task failed: {err}"))
    }
}

impl From<BatchError> for AppError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::BackendUnavailable(inner) => inner.into(),
            BatchError::Rejected { .. }
            | BatchError::UnsupportedFormat { .. }
            | BatchError::SystemMismatch { .. } => AppError::validation(err.to_string()),
            BatchError::StagingIo { .. } => AppError::staging(err.to_string()),
            BatchError::ArtifactNotFound { .. } => {
                AppError::new(ErrorKind::ArtifactNotFound, err.to_string())
            }
            BatchError::Packaging(_) => AppError::packaging(err.to_string()),
            BatchError::Invocation(_) | BatchError::InvalidTransition { .. } => {
                AppError::internal(err.to_string())
            }
        }
    }
}
