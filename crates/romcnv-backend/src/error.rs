//! Backend-specific error types.

use romcnv_core::error::{AppError, ErrorKind};

/// Errors raised while loading backends or touching their sandbox.
///
/// The type is `Clone` so the outcome of one in-flight load can be handed
/// to every caller waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// No backend unit is configured for the system.
    #[error("No backend configured for system '{system}'")]
    UnknownSystem {
        /// The requested system key.
        system: String,
    },

    /// The backend unit is missing or failed to instantiate.
    #[error("Backend for '{system}' is unavailable: {reason}")]
    Unavailable {
        /// The system key.
        system: String,
        /// Why loading failed.
        reason: String,
    },

    /// `set_active` was called before the backend finished loading.
    #[error("Backend for '{system}' is not loaded")]
    NotLoaded {
        /// The system key.
        system: String,
    },

    /// No backend has been activated yet.
    #[error("No backend is active")]
    NoActiveBackend,

    /// A sandbox path tried to escape the sandbox root.
    #[error("Invalid sandbox path: {path}")]
    InvalidPath {
        /// The offending path.
        path: String,
    },

    /// The sandbox path does not exist.
    #[error("Sandbox path not found: {path}")]
    NotFound {
        /// The missing path.
        path: String,
    },

    /// A sandbox read or write failed.
    #[error("Sandbox operation failed on {path}: {details}")]
    Sandbox {
        /// The path being accessed.
        path: String,
        /// Underlying failure.
        details: String,
    },

    /// The backend entrypoint could not be run at all.
    #[error("Backend '{system}' could not be invoked: {details}")]
    Invocation {
        /// The system key.
        system: String,
        /// Underlying failure.
        details: String,
    },
}

impl BackendError {
    /// Build a sandbox error from an I/O error.
    pub fn sandbox(path: impl Into<String>, err: &std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Sandbox {
                path,
                details: err.to_string(),
            }
        }
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        let kind = match &err {
            BackendError::UnknownSystem { .. } => ErrorKind::NotFound,
            BackendError::Unavailable { .. }
            | BackendError::NotLoaded { .. }
            | BackendError::NoActiveBackend => ErrorKind::BackendUnavailable,
            BackendError::InvalidPath { .. } => ErrorKind::Validation,
            BackendError::NotFound { .. } | BackendError::Sandbox { .. } => ErrorKind::Staging,
            BackendError::Invocation { .. } => ErrorKind::Internal,
        };
        AppError::new(kind, err.to_string())
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
