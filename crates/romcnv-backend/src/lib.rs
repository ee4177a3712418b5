//! # romcnv-backend
//!
//! Conversion backends are external engines keyed by target system. This
//! crate defines the capability set every backend exposes, loads and caches
//! one backend per system through [`BackendRegistry`], and wraps the active
//! backend's private sandbox as a [`StagingFs`].
//!
//! Two backends ship with the crate:
//! - [`ProcessBackend`] runs a native converter executable over an on-disk
//!   sandbox directory.
//! - [`MemoryBackend`] keeps its sandbox in memory and calls a scripted
//!   entrypoint, which makes pipelines testable without a converter.

pub mod error;
pub mod memory;
pub mod paths;
pub mod process;
pub mod registry;
pub mod source;
pub mod staging;
pub mod traits;

pub use error::{BackendError, BackendResult};
pub use memory::{MemoryBackend, MemoryBackendFactory, MemorySandbox};
pub use process::{ProcessBackend, ProcessBackendFactory};
pub use registry::{ActiveBackend, BackendRegistry};
pub use source::BackendSource;
pub use staging::StagingFs;
pub use traits::{Backend, BackendFactory, FileStat, InvocationOutput};
