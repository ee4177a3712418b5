//! Integration tests for batch conversion and packaging.

mod helpers;

use std::collections::BTreeSet;
use std::io::Cursor;

use romcnv_core::error::{AppError, ErrorKind};
use romcnv_core::types::{JobStatus, OutputFormat};
use romcnv_pipeline::DeliverableKind;
use zip::ZipArchive;

fn entry_names(bytes: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(bytes)).expect("Failed to open container");
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_directory_batch_packs_one_group_per_game() {
    let app = helpers::TestBatch::new();
    let mut queue = app.queue(&["a.zip", "b.zip"]);

    let report = app
        .pipeline
        .run_batch(&mut queue, &helpers::options("mvs", OutputFormat::Directory))
        .await
        .expect("Batch failed");
    assert_eq!(report.completed, 2);

    let staging = app.pipeline.active_staging().await.expect("No staging");
    let deliverable = app
        .packager
        .package(&staging, &report.artifacts)
        .await
        .expect("Packaging failed");

    assert_eq!(deliverable.kind, DeliverableKind::Container);
    assert_eq!(deliverable.file_name, "romcnv_2_games.zip");

    let names = entry_names(&deliverable.bytes);
    assert!(names.iter().all(|n| n.starts_with("a_cache/") || n.starts_with("b_cache/")));
    let groups: BTreeSet<&str> = names.iter().filter_map(|n| n.split('/').next()).collect();
    assert_eq!(groups, BTreeSet::from(["a_cache", "b_cache"]));
}

#[tokio::test]
async fn test_single_raw_blob_is_passed_through() {
    let app = helpers::TestBatch::new();
    let mut queue = app.queue(&["a.zip"]);
    let staged = queue.jobs()[0].raw_bytes().to_vec();

    let report = app
        .pipeline
        .run_batch(&mut queue, &helpers::options("cps1", OutputFormat::Raw))
        .await
        .expect("Batch failed");

    let staging = app.pipeline.active_staging().await.expect("No staging");
    let deliverable = app
        .packager
        .package(&staging, &report.artifacts)
        .await
        .expect("Packaging failed");

    assert_eq!(deliverable.kind, DeliverableKind::Passthrough);
    assert_eq!(deliverable.file_name, "a.cache");
    assert_eq!(deliverable.bytes, staged);
}

#[tokio::test]
async fn test_partial_failure_keeps_going() {
    let app = helpers::TestBatch::new();
    let mut queue = app.queue(&["skip1.zip", "a.zip", "skip2.zip"]);

    let report = app
        .pipeline
        .run_batch(&mut queue, &helpers::options("cps2", OutputFormat::Archive))
        .await
        .expect("Batch failed");

    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 2);
    assert!(queue.jobs().iter().all(|j| j.status().is_terminal()));
    assert_eq!(queue.count(JobStatus::Completed), 1);

    let metrics = app.pipeline.metrics().snapshot();
    assert_eq!(metrics.jobs_failed, 2);
    assert_eq!(metrics.artifacts_missing, 2);
}

#[tokio::test]
async fn test_packaging_failure_keeps_results_queryable() {
    let app = helpers::TestBatch::new();
    let mut queue = app.queue(&["a.zip", "b.zip"]);
    app.pipeline
        .run_batch(&mut queue, &helpers::options("mvs", OutputFormat::Archive))
        .await
        .expect("Batch failed");

    let staging = app.pipeline.active_staging().await.expect("No staging");
    staging
        .remove_recursive("/cache/b_cache.zip")
        .expect("Failed to remove artifact");

    let err = app
        .packager
        .package(&staging, &queue.completed_artifacts())
        .await
        .expect_err("Packaging should fail");
    let err: AppError = err.into();
    assert_eq!(err.kind, ErrorKind::Packaging);
    assert!(err.message.contains("/cache/b_cache.zip"), "{}", err.message);
    assert_eq!(queue.completed_artifacts().len(), 2);

    let err = app
        .packager
        .package(&staging, &[])
        .await
        .expect_err("Empty set should fail");
    let err: AppError = err.into();
    assert_eq!(err.kind, ErrorKind::Packaging);
}

#[cfg(unix)]
#[tokio::test]
async fn test_process_backend_end_to_end() {
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;

    use romcnv_backend::{BackendRegistry, BackendSource, ProcessBackendFactory};
    use romcnv_core::config::BackendsConfig;
    use romcnv_core::events::EventBus;
    use romcnv_pipeline::{BatchPipeline, ResultPackager};

    let units = tempfile::tempdir().expect("tempdir");
    let staging_root = tempfile::tempdir().expect("tempdir");
    let converter = units.path().join("romcnv_mvs");
    std::fs::write(
        &converter,
        r#"#!/bin/sh
in="$1"; shift
game=$(basename "$in" .zip)
mode=dir
for a in "$@"; do
  case "$a" in
    -zip) mode=zip ;;
    -raw) mode=raw ;;
  esac
done
mkdir -p cache
case "$mode" in
  zip) cp "$in" "cache/${game}_cache.zip" ;;
  raw) cp "$in" "cache/${game}.cache" ;;
  *) mkdir -p "cache/${game}_cache/gfx" && cp "$in" "cache/${game}_cache/gfx/data.bin" ;;
esac
echo "done $game"
"#,
    )
    .expect("Failed to write converter");
    std::fs::set_permissions(&converter, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to chmod converter");

    let config = BackendsConfig {
        directory: units.path().to_string_lossy().to_string(),
        staging_root: staging_root.path().to_string_lossy().to_string(),
        ..BackendsConfig::default()
    };
    let registry = Arc::new(BackendRegistry::new(
        BackendSource::catalog(&config).expect("catalog"),
        Arc::new(ProcessBackendFactory::from_config(&config)),
    ));
    let pipeline = BatchPipeline::new(Arc::clone(&registry), EventBus::new());
    let app = helpers::TestBatch::new();
    let mut queue = app.queue(&["mslug.zip", "kof98.zip"]);

    let report = pipeline
        .run_batch(&mut queue, &helpers::options("mvs", OutputFormat::Directory))
        .await
        .expect("Batch failed");
    assert_eq!(report.completed, 2);

    let staging = pipeline.active_staging().await.expect("No staging");
    let deliverable = ResultPackager::default()
        .package(&staging, &report.artifacts)
        .await
        .expect("Packaging failed");
    assert_eq!(
        entry_names(&deliverable.bytes),
        vec!["kof98_cache/gfx/data.bin", "mslug_cache/gfx/data.bin"]
    );

    assert!(registry.unload(&helpers::key("mvs")).await);
    let sandboxes = std::fs::read_dir(staging_root.path().join("mvs"))
        .expect("Failed to list sandboxes")
        .count();
    assert_eq!(sandboxes, 0);
}
