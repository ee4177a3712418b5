//! In-memory backend.
//!
//! The sandbox is a flat map of normalised paths to entries and the
//! entrypoint is a closure, so a pipeline can be driven end to end without
//! a converter executable.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use romcnv_core::types::SystemKey;

use crate::error::{BackendError, BackendResult};
use crate::paths;
use crate::source::BackendSource;
use crate::traits::{Backend, BackendFactory, FileStat, InvocationOutput};

/// Scripted entrypoint: receives the sandbox and argv, returns an exit code.
pub type MemoryEntrypoint = Arc<dyn Fn(&MemorySandbox, &[String]) -> i32 + Send + Sync>;

#[derive(Debug, Clone)]
enum Entry {
    Dir,
    File(Vec<u8>),
}

/// Hierarchical in-memory sandbox.
#[derive(Debug, Default)]
pub struct MemorySandbox {
    entries: Mutex<BTreeMap<String, Entry>>,
}

impl MemorySandbox {
    /// Create an empty sandbox.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> BackendResult<MutexGuard<'_, BTreeMap<String, Entry>>> {
        self.entries.lock().map_err(|_| BackendError::Sandbox {
            path: "/".to_string(),
            details: "sandbox lock poisoned".to_string(),
        })
    }

    fn ancestors(normalised: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = String::new();
        for part in normalised.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            out.push(current.clone());
        }
        out.pop();
        out
    }

    fn create_dirs(entries: &mut BTreeMap<String, Entry>, dirs: &[String]) -> BackendResult<()> {
        for dir in dirs {
            match entries.get(dir) {
                Some(Entry::File(_)) => {
                    return Err(BackendError::Sandbox {
                        path: dir.clone(),
                        details: "not a directory".to_string(),
                    });
                }
                Some(Entry::Dir) => {}
                None => {
                    entries.insert(dir.clone(), Entry::Dir);
                }
            }
        }
        Ok(())
    }

    /// Write a file, creating parent directories.
    pub fn write(&self, path: &str, bytes: &[u8]) -> BackendResult<()> {
        let normalised = paths::normalize(path)?;
        if normalised == "/" {
            return Err(BackendError::InvalidPath {
                path: path.to_string(),
            });
        }
        let mut entries = self.entries()?;
        Self::create_dirs(&mut entries, &Self::ancestors(&normalised))?;
        if matches!(entries.get(&normalised), Some(Entry::Dir)) {
            return Err(BackendError::Sandbox {
                path: normalised,
                details: "is a directory".to_string(),
            });
        }
        entries.insert(normalised, Entry::File(bytes.to_vec()));
        Ok(())
    }

    /// Create a directory and any missing parents.
    pub fn make_dir(&self, path: &str) -> BackendResult<()> {
        let normalised = paths::normalize(path)?;
        if normalised == "/" {
            return Ok(());
        }
        let mut dirs = Self::ancestors(&normalised);
        dirs.push(normalised);
        let mut entries = self.entries()?;
        Self::create_dirs(&mut entries, &dirs)
    }

    /// Whether a path exists.
    pub fn exists(&self, path: &str) -> bool {
        match paths::normalize(path) {
            Ok(normalised) if normalised == "/" => true,
            Ok(normalised) => self
                .entries()
                .map(|entries| entries.contains_key(&normalised))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Stat a path.
    pub fn stat(&self, path: &str) -> BackendResult<FileStat> {
        let normalised = paths::normalize(path)?;
        if normalised == "/" {
            return Ok(FileStat {
                is_directory: true,
                size: 0,
            });
        }
        match self.entries()?.get(&normalised) {
            Some(Entry::Dir) => Ok(FileStat {
                is_directory: true,
                size: 0,
            }),
            Some(Entry::File(bytes)) => Ok(FileStat {
                is_directory: false,
                size: bytes.len() as u64,
            }),
            None => Err(BackendError::NotFound { path: normalised }),
        }
    }

    /// Read a file.
    pub fn read(&self, path: &str) -> BackendResult<Vec<u8>> {
        let normalised = paths::normalize(path)?;
        match self.entries()?.get(&normalised) {
            Some(Entry::File(bytes)) => Ok(bytes.clone()),
            Some(Entry::Dir) => Err(BackendError::Sandbox {
                path: normalised,
                details: "is a directory".to_string(),
            }),
            None => Err(BackendError::NotFound { path: normalised }),
        }
    }

    /// Names of the direct children of a directory, sorted.
    pub fn list(&self, path: &str) -> BackendResult<Vec<String>> {
        let normalised = paths::normalize(path)?;
        let entries = self.entries()?;
        if normalised != "/" {
            match entries.get(&normalised) {
                Some(Entry::Dir) => {}
                Some(Entry::File(_)) => {
                    return Err(BackendError::Sandbox {
                        path: normalised,
                        details: "not a directory".to_string(),
                    });
                }
                None => return Err(BackendError::NotFound { path: normalised }),
            }
        }

        let prefix = if normalised == "/" {
            "/".to_string()
        } else {
            format!("{normalised}/")
        };
        Ok(entries
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| &key[prefix.len()..])
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }

    /// Remove a path and everything below it.
    pub fn remove_recursive(&self, path: &str) -> BackendResult<()> {
        let normalised = paths::normalize(path)?;
        let mut entries = self.entries()?;
        if normalised == "/" {
            entries.clear();
            return Ok(());
        }
        let prefix = format!("{normalised}/");
        entries.retain(|key, _| *key != normalised && !key.starts_with(&prefix));
        Ok(())
    }

    /// Number of files currently stored.
    pub fn file_count(&self) -> usize {
        self.entries()
            .map(|entries| {
                entries
                    .values()
                    .filter(|entry| matches!(entry, Entry::File(_)))
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Backend whose sandbox lives in memory.
pub struct MemoryBackend {
    system: SystemKey,
    sandbox: MemorySandbox,
    entrypoint: MemoryEntrypoint,
    invocations: Mutex<Vec<Vec<String>>>,
}

impl MemoryBackend {
    /// Create a backend for `system` driven by `entrypoint`.
    pub fn new(system: SystemKey, entrypoint: MemoryEntrypoint) -> Self {
        Self {
            system,
            sandbox: MemorySandbox::new(),
            entrypoint,
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// The sandbox.
    pub fn sandbox(&self) -> &MemorySandbox {
        &self.sandbox
    }

    /// Every argv the entrypoint has been called with.
    pub fn invocations(&self) -> Vec<Vec<String>> {
        self.invocations
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("system", &self.system)
            .field("files", &self.sandbox.file_count())
            .finish()
    }
}

impl Backend for MemoryBackend {
    fn system(&self) -> &SystemKey {
        &self.system
    }

    fn stage(&self, path: &str, bytes: &[u8]) -> BackendResult<()> {
        self.sandbox.write(path, bytes)
    }

    fn make_dir(&self, path: &str) -> BackendResult<()> {
        self.sandbox.make_dir(path)
    }

    fn invoke(&self, argv: &[String]) -> BackendResult<InvocationOutput> {
        if let Ok(mut calls) = self.invocations.lock() {
            calls.push(argv.to_vec());
        }
        let exit_code = (self.entrypoint)(&self.sandbox, argv);
        Ok(InvocationOutput {
            exit_code,
            ..Default::default()
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.sandbox.exists(path)
    }

    fn stat(&self, path: &str) -> BackendResult<FileStat> {
        self.sandbox.stat(path)
    }

    fn read(&self, path: &str) -> BackendResult<Vec<u8>> {
        self.sandbox.read(path)
    }

    fn list(&self, path: &str) -> BackendResult<Vec<String>> {
        self.sandbox.list(path)
    }

    fn remove_recursive(&self, path: &str) -> BackendResult<()> {
        self.sandbox.remove_recursive(path)
    }

    fn dispose(&self) {
        let _ = self.sandbox.remove_recursive("/");
    }
}

/// Factory producing [`MemoryBackend`]s that share one entrypoint.
///
/// Units can be marked missing to exercise load failures, and an optional
/// delay on `probe` stands in for fetching the unit.
#[derive(Clone)]
pub struct MemoryBackendFactory {
    entrypoint: MemoryEntrypoint,
    missing: Arc<Mutex<HashSet<SystemKey>>>,
    load_delay: Option<Duration>,
    probes: Arc<AtomicUsize>,
    instantiations: Arc<AtomicUsize>,
}

impl MemoryBackendFactory {
    /// Create a factory whose backends call `entrypoint`.
    pub fn new<F>(entrypoint: F) -> Self
    where
        F: Fn(&MemorySandbox, &[String]) -> i32 + Send + Sync + 'static,
    {
        Self {
            entrypoint: Arc::new(entrypoint),
            missing: Arc::new(Mutex::new(HashSet::new())),
            load_delay: None,
            probes: Arc::new(AtomicUsize::new(0)),
            instantiations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Delay every probe by `delay`.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    /// Make the unit for `system` fail its probe.
    pub fn mark_missing(&self, system: &SystemKey) {
        if let Ok(mut missing) = self.missing.lock() {
            missing.insert(system.clone());
        }
    }

    /// Make the unit for `system` loadable again.
    pub fn mark_present(&self, system: &SystemKey) {
        if let Ok(mut missing) = self.missing.lock() {
            missing.remove(system);
        }
    }

    /// Number of probes performed.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Number of backends created.
    pub fn instantiate_count(&self) -> usize {
        self.instantiations.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MemoryBackendFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackendFactory")
            .field("load_delay", &self.load_delay)
            .field("probes", &self.probe_count())
            .field("instantiations", &self.instantiate_count())
            .finish()
    }
}

#[async_trait]
impl BackendFactory for MemoryBackendFactory {
    async fn probe(&self, source: &BackendSource) -> BackendResult<()> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
        let missing = self
            .missing
            .lock()
            .map(|missing| missing.contains(&source.system))
            .unwrap_or(false);
        if missing {
            return Err(BackendError::Unavailable {
                system: source.system.to_string(),
                reason: format!("unit '{}' not found", source.binary_name),
            });
        }
        Ok(())
    }

    async fn instantiate(&self, source: &BackendSource) -> BackendResult<Arc<dyn Backend>> {
        self.instantiations.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryBackend::new(
            source.system.clone(),
            Arc::clone(&self.entrypoint),
        )))
    }
}
