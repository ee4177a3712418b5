//! Native process backend.
//!
//! Runs a converter executable against an on-disk sandbox directory. The
//! sandbox is addressed with the same absolute paths as every other
//! backend; they are rebased under the sandbox root, both for file
//! operations and for argv entries handed to the converter.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use romcnv_core::config::BackendsConfig;
use romcnv_core::types::SystemKey;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BackendError, BackendResult};
use crate::paths;
use crate::source::BackendSource;
use crate::traits::{Backend, BackendFactory, FileStat, InvocationOutput};

/// Environment variable carrying the converter path when a launcher
/// script is used.
pub const BINARY_ENV: &str = "ROMCNV_BINARY";

/// Backend driving a converter executable.
#[derive(Debug)]
pub struct ProcessBackend {
    system: SystemKey,
    /// Script if configured, otherwise the binary.
    program: PathBuf,
    binary: PathBuf,
    via_script: bool,
    root: PathBuf,
}

impl ProcessBackend {
    /// Create a backend for `source` whose units live in `directory` and
    /// whose sandbox is `root`.
    pub fn new(source: &BackendSource, directory: &Path, root: PathBuf) -> Self {
        let binary = source.binary_path(directory);
        let script = source.script_path(directory);
        Self {
            system: source.system.clone(),
            program: script.clone().unwrap_or_else(|| binary.clone()),
            binary,
            via_script: script.is_some(),
            root,
        }
    }

    /// On-disk root of the sandbox.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> BackendResult<PathBuf> {
        let mut full = self.root.clone();
        for part in paths::components(path)? {
            full.push(part);
        }
        Ok(full)
    }

    fn rebase_arg(&self, arg: &str) -> OsString {
        if arg.starts_with('/') {
            if let Ok(path) = self.resolve(arg) {
                return path.into_os_string();
            }
        }
        OsString::from(arg)
    }
}

fn lines(raw: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(raw)
        .lines()
        .map(str::to_string)
        .collect()
}

impl Backend for ProcessBackend {
    fn system(&self) -> &SystemKey {
        &self.system
    }

    fn stage(&self, path: &str, bytes: &[u8]) -> BackendResult<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BackendError::sandbox(path, &e))?;
        }
        std::fs::write(&full, bytes).map_err(|e| BackendError::sandbox(path, &e))
    }

    fn make_dir(&self, path: &str) -> BackendResult<()> {
        let full = self.resolve(path)?;
        std::fs::create_dir_all(full).map_err(|e| BackendError::sandbox(path, &e))
    }

    fn invoke(&self, argv: &[String]) -> BackendResult<InvocationOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(argv.iter().map(|arg| self.rebase_arg(arg)))
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if self.via_script {
            cmd.env(BINARY_ENV, &self.binary);
        }

        debug!(
            system = %self.system,
            program = %self.program.display(),
            args = ?argv,
            "Spawning converter"
        );

        let start = Instant::now();
        let output = cmd.output().map_err(|e| BackendError::Invocation {
            system: self.system.to_string(),
            details: format!("{}: {e}", self.program.display()),
        })?;

        let exit_code = output.status.code().unwrap_or(-1);
        info!(
            system = %self.system,
            exit_code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Converter returned"
        );

        Ok(InvocationOutput {
            exit_code,
            stdout: lines(&output.stdout),
            stderr: lines(&output.stderr),
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.exists()).unwrap_or(false)
    }

    fn stat(&self, path: &str) -> BackendResult<FileStat> {
        let full = self.resolve(path)?;
        let metadata = std::fs::metadata(full).map_err(|e| BackendError::sandbox(path, &e))?;
        Ok(FileStat {
            is_directory: metadata.is_dir(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
        })
    }

    fn read(&self, path: &str) -> BackendResult<Vec<u8>> {
        let full = self.resolve(path)?;
        std::fs::read(full).map_err(|e| BackendError::sandbox(path, &e))
    }

    fn list(&self, path: &str) -> BackendResult<Vec<String>> {
        let full = self.resolve(path)?;
        let entries = std::fs::read_dir(full).map_err(|e| BackendError::sandbox(path, &e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BackendError::sandbox(path, &e))?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }

    fn remove_recursive(&self, path: &str) -> BackendResult<()> {
        let full = self.resolve(path)?;
        let result = match std::fs::symlink_metadata(&full) {
            Ok(metadata) if metadata.is_dir() => std::fs::remove_dir_all(&full),
            Ok(_) => std::fs::remove_file(&full),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => Err(e),
        };
        result.map_err(|e| BackendError::sandbox(path, &e))
    }

    fn dispose(&self) {
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            warn!(
                sandbox = %self.root.display(),
                error = %e,
                "Failed to remove backend sandbox"
            );
        }
    }
}

/// Loads [`ProcessBackend`]s from a directory of converter units.
#[derive(Debug, Clone)]
pub struct ProcessBackendFactory {
    directory: PathBuf,
    staging_root: PathBuf,
}

impl ProcessBackendFactory {
    /// Create a factory over explicit locations.
    pub fn new(directory: impl Into<PathBuf>, staging_root: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            staging_root: staging_root.into(),
        }
    }

    /// Create a factory from the `[backends]` section.
    pub fn from_config(config: &BackendsConfig) -> Self {
        Self::new(&config.directory, &config.staging_root)
    }

    async fn require_file(source: &BackendSource, path: &Path) -> BackendResult<()> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => Ok(()),
            Ok(_) => Err(BackendError::Unavailable {
                system: source.system.to_string(),
                reason: format!("{} is not a file", path.display()),
            }),
            Err(e) => Err(BackendError::Unavailable {
                system: source.system.to_string(),
                reason: format!("{}: {e}", path.display()),
            }),
        }
    }
}

#[async_trait]
impl BackendFactory for ProcessBackendFactory {
    async fn probe(&self, source: &BackendSource) -> BackendResult<()> {
        Self::require_file(source, &source.binary_path(&self.directory)).await?;
        if let Some(script) = source.script_path(&self.directory) {
            Self::require_file(source, &script).await?;
        }
        Ok(())
    }

    async fn instantiate(&self, source: &BackendSource) -> BackendResult<Arc<dyn Backend>> {
        let root = self
            .staging_root
            .join(source.system.as_str())
            .join(Uuid::now_v7().simple().to_string());

        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| BackendError::Unavailable {
                system: source.system.to_string(),
                reason: format!("cannot create sandbox {}: {e}", root.display()),
            })?;

        debug!(system = %source.system, sandbox = %root.display(), "Created sandbox");
        Ok(Arc::new(ProcessBackend::new(source, &self.directory, root)))
    }
}
