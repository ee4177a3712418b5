//! # romcnv-pipeline
//!
//! Drives a queue of zip inputs through the active conversion backend one
//! job at a time and packages whatever the backend produced.
//!
//! ## Flow
//!
//! 1. Files are accepted into a [`JobQueue`] (`pending`).
//! 2. [`BatchPipeline::run_batch`] stages each input, purges stale output,
//!    invokes the backend, and checks the [`ArtifactTable`] for the
//!    expected artifact (`completed` or `error`).
//! 3. [`ResultPackager::package`] turns the completed artifacts into one
//!    [`Deliverable`].

pub mod error;
pub mod invocation;
pub mod job;
pub mod metrics;
pub mod packager;
pub mod pipeline;
pub mod resolver;

pub use error::BatchError;
pub use invocation::{FlagRule, InvocationTable};
pub use job::{ConversionJob, ConversionOptions, JobQueue};
pub use metrics::{BatchMetrics, MetricsSnapshot};
pub use packager::{Deliverable, DeliverableKind, ResultPackager};
pub use pipeline::{BatchPipeline, BatchReport};
pub use resolver::{ArtifactRule, ArtifactTable};
