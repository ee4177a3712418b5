//! Convenience result type alias for ROMCNV.

use crate::error::AppError;

/// A specialized `Result` type for ROMCNV operations.
pub type AppResult<T> = Result<T, AppError>;
