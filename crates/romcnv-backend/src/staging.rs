//! Staging filesystem over the active backend's sandbox.
//!
//! Inputs are written here before invocation and artifacts are read back
//! from here afterwards. Before a game is (re-)converted, every path that
//! game could have produced must be purged so a stale result from an
//! earlier run can never pass for a fresh one.

use std::sync::Arc;

use tracing::debug;

use crate::error::BackendResult;
use crate::paths;
use crate::traits::Backend;

/// Thin wrapper over one backend's sandbox.
#[derive(Debug, Clone)]
pub struct StagingFs {
    backend: Arc<dyn Backend>,
}

impl StagingFs {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Create a directory unless it already exists.
    pub fn ensure_dir(&self, path: &str) -> BackendResult<()> {
        if self.backend.exists(path) && self.backend.stat(path)?.is_directory {
            return Ok(());
        }
        self.backend.make_dir(path)
    }

    /// Write a file.
    pub fn write(&self, path: &str, bytes: &[u8]) -> BackendResult<()> {
        self.backend.stage(path, bytes)?;
        debug!(path, bytes = bytes.len(), "Staged file");
        Ok(())
    }

    /// Read a file.
    pub fn read(&self, path: &str) -> BackendResult<Vec<u8>> {
        self.backend.read(path)
    }

    /// Whether a path exists.
    pub fn exists(&self, path: &str) -> bool {
        self.backend.exists(path)
    }

    /// Whether a path is a directory.
    pub fn is_directory(&self, path: &str) -> BackendResult<bool> {
        Ok(self.backend.stat(path)?.is_directory)
    }

    /// Remove a path recursively.
    pub fn remove_recursive(&self, path: &str) -> BackendResult<()> {
        self.backend.remove_recursive(path)
    }

    /// Direct children of a directory, sorted.
    pub fn list_children(&self, path: &str) -> BackendResult<Vec<String>> {
        let mut names: Vec<String> = self
            .backend
            .list(path)?
            .into_iter()
            .filter(|name| name != "." && name != "..")
            .collect();
        names.sort();
        Ok(names)
    }

    /// Remove every existing path in `paths`, returning how many were
    /// present.
    pub fn purge_all(&self, paths: &[String]) -> BackendResult<usize> {
        let mut removed = 0;
        for path in paths {
            if self.backend.exists(path) {
                self.backend.remove_recursive(path)?;
                debug!(path = %path, "Purged stale artifact");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Every file below `dir`, as sorted paths relative to `dir`.
    pub fn walk_files(&self, dir: &str) -> BackendResult<Vec<String>> {
        let mut files = Vec::new();
        let mut pending = vec![String::new()];

        while let Some(relative) = pending.pop() {
            let absolute = if relative.is_empty() {
                dir.to_string()
            } else {
                paths::join(dir, &relative)
            };
            for name in self.list_children(&absolute)? {
                let child_relative = if relative.is_empty() {
                    name
                } else {
                    format!("{relative}/{name}")
                };
                if self.is_directory(&paths::join(dir, &child_relative))? {
                    pending.push(child_relative);
                } else {
                    files.push(child_relative);
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBackend, MemorySandbox};
    use romcnv_core::types::SystemKey;

    fn staging() -> StagingFs {
        let backend = MemoryBackend::new(
            SystemKey::new("mvs").expect("key"),
            Arc::new(|_: &MemorySandbox, _: &[String]| 0),
        );
        StagingFs::new(Arc::new(backend))
    }

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let fs = staging();
        fs.ensure_dir("/roms").expect("first");
        fs.ensure_dir("/roms").expect("second");
        assert!(fs.is_directory("/roms").expect("stat"));
    }

    #[test]
    fn test_purge_all_removes_every_variant() {
        let fs = staging();
        fs.write("/cache/sf2_cache/a.bin", b"a").expect("write");
        fs.write("/cache/sf2.cache", b"b").expect("write");

        let removed = fs
            .purge_all(&[
                "/cache/sf2_cache".to_string(),
                "/cache/sf2_cache.zip".to_string(),
                "/cache/sf2.cache".to_string(),
            ])
            .expect("purge");

        assert_eq!(removed, 2);
        assert!(fs.list_children("/cache").expect("list").is_empty());
    }

    #[test]
    fn test_walk_files_recurses() {
        let fs = staging();
        fs.write("/cache/g/z.bin", b"z").expect("write");
        fs.write("/cache/g/sub/a.bin", b"a").expect("write");
        fs.write("/cache/g/sub/deeper/b.bin", b"b").expect("write");

        let files = fs.walk_files("/cache/g").expect("walk");
        assert_eq!(files, vec!["sub/a.bin", "sub/deeper/b.bin", "z.bin"]);
    }
}
