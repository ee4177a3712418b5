//! Shared value types used by the registry, pipeline, and packager.

pub mod artifact;
pub mod job;
pub mod system;

pub use artifact::{ArtifactDescriptor, ArtifactKind, OutputFormat};
pub use job::JobStatus;
pub use system::SystemKey;
