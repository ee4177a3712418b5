//! Backend capability set and the factory seam used to load backends.

use std::sync::Arc;

use async_trait::async_trait;
use romcnv_core::types::SystemKey;

use crate::error::BackendResult;
use crate::source::BackendSource;

/// Result of a `stat` call on a sandbox path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Whether the path is a directory.
    pub is_directory: bool,
    /// Size in bytes (0 for directories).
    pub size: u64,
}

/// What the backend entrypoint reported.
///
/// `exit_code` is informational only. Converters of this family return
/// overlapping codes for "converted" and "nothing to do", so callers must
/// decide success by looking for the expected artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationOutput {
    /// Exit indicator of the entrypoint, `-1` if it was killed.
    pub exit_code: i32,
    /// Lines printed to standard output.
    pub stdout: Vec<String>,
    /// Lines printed to standard error.
    pub stderr: Vec<String>,
}

/// A loaded conversion engine for one target system.
///
/// All operations are synchronous: invoking the entrypoint blocks the
/// caller for the whole conversion. Paths are absolute sandbox paths
/// (`/roms/sf2.zip`); the sandbox is private to the instance and not
/// reentrant, so callers must serialise access.
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// The system this backend converts for.
    fn system(&self) -> &SystemKey;

    /// Write bytes to a sandbox file, creating parent directories.
    fn stage(&self, path: &str, bytes: &[u8]) -> BackendResult<()>;

    /// Create a sandbox directory and any missing parents.
    fn make_dir(&self, path: &str) -> BackendResult<()>;

    /// Run the synchronous entrypoint with the given arguments.
    fn invoke(&self, argv: &[String]) -> BackendResult<InvocationOutput>;

    /// Whether a sandbox path exists.
    fn exists(&self, path: &str) -> bool;

    /// Stat a sandbox path.
    fn stat(&self, path: &str) -> BackendResult<FileStat>;

    /// Read a sandbox file.
    fn read(&self, path: &str) -> BackendResult<Vec<u8>>;

    /// Names of the direct children of a sandbox directory.
    fn list(&self, path: &str) -> BackendResult<Vec<String>>;

    /// Remove a file or directory tree. Missing paths are not an error.
    fn remove_recursive(&self, path: &str) -> BackendResult<()>;

    /// Release the sandbox. Called when the registry unloads the backend.
    fn dispose(&self) {}
}

/// Loads backend units. Implementations decide where units live and how
/// an instance is created from one.
#[async_trait]
pub trait BackendFactory: Send + Sync + std::fmt::Debug {
    /// Check that the unit exists without instantiating it.
    async fn probe(&self, source: &BackendSource) -> BackendResult<()>;

    /// Create a fresh instance from the unit.
    async fn instantiate(&self, source: &BackendSource) -> BackendResult<Arc<dyn Backend>>;
}
