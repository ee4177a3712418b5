//! # romcnv-core
//!
//! Core crate for the ROMCNV batch converter. Contains configuration
//! schemas, shared value types, batch events with their bus, and the
//! unified error system.
//!
//! This crate has **no** internal dependencies on other ROMCNV crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
