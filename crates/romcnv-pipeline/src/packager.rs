//! Result packaging.
//!
//! A single non-directory artifact is handed back as-is so an archive or
//! blob is never compressed twice. Anything else goes into one zip
//! container with one top-level group per game.

use std::io::{Cursor, Write};

use romcnv_backend::{BackendError, StagingFs};
use romcnv_backend::paths;
use romcnv_core::config::PipelineConfig;
use romcnv_core::types::{ArtifactDescriptor, ArtifactKind};
use serde::Serialize;
use tracing::{debug, info};
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::BatchError;

/// How the deliverable was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliverableKind {
    /// The artifact's own bytes, unwrapped.
    Passthrough,
    /// A freshly built zip container.
    Container,
}

/// The packaged batch result.
#[derive(Debug, Clone)]
pub struct Deliverable {
    /// Suggested download name.
    pub file_name: String,
    /// Contents.
    pub bytes: Vec<u8>,
    /// How the bytes were produced.
    pub kind: DeliverableKind,
}

/// Builds a [`Deliverable`] from completed artifacts.
#[derive(Debug, Clone)]
pub struct ResultPackager {
    compression_level: i64,
}

impl ResultPackager {
    /// Create a packager with a deflate level.
    pub fn new(compression_level: i64) -> Self {
        Self { compression_level }
    }

    /// Create a packager from the `[pipeline]` section.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.compression_level)
    }

    /// Container name for a set of artifacts.
    pub fn container_name(artifacts: &[ArtifactDescriptor]) -> String {
        match artifacts {
            [only] => format!("{}.zip", only.file_name()),
            _ => format!("romcnv_{}_games.zip", artifacts.len()),
        }
    }

    /// Package `artifacts`, reading them from `staging`.
    ///
    /// Container generation runs on the blocking pool.
    pub async fn package(
        &self,
        staging: &StagingFs,
        artifacts: &[ArtifactDescriptor],
    ) -> Result<Deliverable, BatchError> {
        if artifacts.is_empty() {
            return Err(BatchError::Packaging("no completed artifacts".to_string()));
        }

        let staging = staging.clone();
        let artifacts = artifacts.to_vec();
        let level = self.compression_level;
        let deliverable =
            tokio::task::spawn_blocking(move || Self::build(&staging, &artifacts, level))
                .await??;

        info!(
            file = %deliverable.file_name,
            kind = ?deliverable.kind,
            bytes = deliverable.bytes.len(),
            "Packaged batch result"
        );
        Ok(deliverable)
    }

    fn build(
        staging: &StagingFs,
        artifacts: &[ArtifactDescriptor],
        level: i64,
    ) -> Result<Deliverable, BatchError> {
        if let [only] = artifacts {
            if only.kind.is_single_file() {
                return Ok(Deliverable {
                    file_name: only.file_name().to_string(),
                    bytes: staging.read(&only.path).map_err(unreadable(&only.path))?,
                    kind: DeliverableKind::Passthrough,
                });
            }
        }

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(level));
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for artifact in artifacts {
            let group = artifact.file_name();
            match artifact.kind {
                ArtifactKind::Directory => {
                    let files = staging
                        .walk_files(&artifact.path)
                        .map_err(unreadable(&artifact.path))?;
                    if files.is_empty() {
                        writer.add_directory(format!("{group}/"), options)?;
                    }
                    for relative in files {
                        let path = paths::join(&artifact.path, &relative);
                        let bytes = staging.read(&path).map_err(unreadable(&path))?;
                        writer.start_file(format!("{group}/{relative}"), options)?;
                        writer
                            .write_all(&bytes)
                            .map_err(|e| BatchError::Packaging(e.to_string()))?;
                    }
                }
                ArtifactKind::Archive | ArtifactKind::RawBlob => {
                    let bytes = staging
                        .read(&artifact.path)
                        .map_err(unreadable(&artifact.path))?;
                    writer.start_file(group, options)?;
                    writer
                        .write_all(&bytes)
                        .map_err(|e| BatchError::Packaging(e.to_string()))?;
                }
            }
            debug!(group, kind = ?artifact.kind, "Added artifact to container");
        }

        let bytes = writer.finish()?.into_inner();
        Ok(Deliverable {
            file_name: Self::container_name(artifacts),
            bytes,
            kind: DeliverableKind::Container,
        })
    }
}

/// Map a staging failure while reading `path` into a packaging error.
fn unreadable(path: &str) -> impl FnOnce(BackendError) -> BatchError + '_ {
    move |e| BatchError::Packaging(format!("cannot read artifact {path}: {e}"))
}

impl Default for ResultPackager {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::io::Read;
    use std::sync::Arc;

    use romcnv_backend::{MemoryBackend, MemorySandbox};
    use romcnv_core::types::SystemKey;
    use zip::ZipArchive;

    use super::*;

    fn staging() -> StagingFs {
        StagingFs::new(Arc::new(MemoryBackend::new(
            SystemKey::new("mvs").expect("key"),
            Arc::new(|_: &MemorySandbox, _: &[String]| 0),
        )))
    }

    fn descriptor(game: &str, kind: ArtifactKind, path: &str) -> ArtifactDescriptor {
        ArtifactDescriptor {
            game_name: game.to_string(),
            kind,
            path: path.to_string(),
        }
    }

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(bytes)).expect("open");
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_single_blob_passthrough() {
        let fs = staging();
        fs.write("/cache/a.cache", b"raw blob bytes").expect("write");
        let artifacts = [descriptor("a", ArtifactKind::RawBlob, "/cache/a.cache")];

        let out = ResultPackager::default()
            .package(&fs, &artifacts)
            .await
            .expect("package");

        assert_eq!(out.kind, DeliverableKind::Passthrough);
        assert_eq!(out.file_name, "a.cache");
        assert_eq!(out.bytes, b"raw blob bytes");
    }

    #[tokio::test]
    async fn test_single_archive_passthrough() {
        let fs = staging();
        fs.write("/cache/a_cache.zip", b"PK\x03\x04zipped").expect("write");
        let artifacts = [descriptor("a", ArtifactKind::Archive, "/cache/a_cache.zip")];

        let out = ResultPackager::default()
            .package(&fs, &artifacts)
            .await
            .expect("package");

        assert_eq!(out.kind, DeliverableKind::Passthrough);
        assert_eq!(out.file_name, "a_cache.zip");
        assert_eq!(out.bytes, b"PK\x03\x04zipped");
    }

    #[tokio::test]
    async fn test_directories_flatten_into_groups() {
        let fs = staging();
        fs.write("/cache/a_cache/sprites.bin", b"a1").expect("write");
        fs.write("/cache/a_cache/audio/m1.bin", b"a2").expect("write");
        fs.write("/cache/b_cache/sprites.bin", b"b1").expect("write");
        let artifacts = [
            descriptor("a", ArtifactKind::Directory, "/cache/a_cache"),
            descriptor("b", ArtifactKind::Directory, "/cache/b_cache"),
        ];

        let out = ResultPackager::default()
            .package(&fs, &artifacts)
            .await
            .expect("package");

        assert_eq!(out.kind, DeliverableKind::Container);
        assert_eq!(out.file_name, "romcnv_2_games.zip");
        let names = entry_names(&out.bytes);
        assert_eq!(
            names,
            vec![
                "a_cache/audio/m1.bin",
                "a_cache/sprites.bin",
                "b_cache/sprites.bin",
            ]
        );
        let groups: BTreeSet<&str> = names
            .iter()
            .filter_map(|n| n.split('/').next())
            .collect();
        assert_eq!(groups.len(), 2);

        let mut archive = ZipArchive::new(Cursor::new(out.bytes.as_slice())).expect("open");
        let mut content = Vec::new();
        archive
            .by_name("a_cache/audio/m1.bin")
            .expect("entry")
            .read_to_end(&mut content)
            .expect("read");
        assert_eq!(content, b"a2");
    }

    #[tokio::test]
    async fn test_single_directory_uses_group_name() {
        let fs = staging();
        fs.write("/cache/a_cache/sprites.bin", b"a1").expect("write");
        let artifacts = [descriptor("a", ArtifactKind::Directory, "/cache/a_cache")];

        let out = ResultPackager::default()
            .package(&fs, &artifacts)
            .await
            .expect("package");

        assert_eq!(out.kind, DeliverableKind::Container);
        assert_eq!(out.file_name, "a_cache.zip");
        assert_eq!(entry_names(&out.bytes), vec!["a_cache/sprites.bin"]);
    }

    #[tokio::test]
    async fn test_mixed_single_files_are_named_entries() {
        let fs = staging();
        fs.write("/cache/a.cache", b"a").expect("write");
        fs.write("/cache/b_cache.zip", b"b").expect("write");
        let artifacts = [
            descriptor("a", ArtifactKind::RawBlob, "/cache/a.cache"),
            descriptor("b", ArtifactKind::Archive, "/cache/b_cache.zip"),
        ];

        let out = ResultPackager::default()
            .package(&fs, &artifacts)
            .await
            .expect("package");

        assert_eq!(entry_names(&out.bytes), vec!["a.cache", "b_cache.zip"]);
    }

    #[tokio::test]
    async fn test_empty_set_is_packaging_error() {
        let err = ResultPackager::default()
            .package(&staging(), &[])
            .await
            .expect_err("empty");
        assert!(matches!(err, BatchError::Packaging(_)));
    }

    #[tokio::test]
    async fn test_missing_artifact_fails() {
        let artifacts = [descriptor("a", ArtifactKind::RawBlob, "/cache/a.cache")];
        let err = ResultPackager::default()
            .package(&staging(), &artifacts)
            .await
            .expect_err("missing");
        assert!(
            matches!(err, BatchError::Packaging(ref message) if message.contains("/cache/a.cache")),
            "{err}"
        );
    }
}
