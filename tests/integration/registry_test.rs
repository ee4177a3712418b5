//! Integration tests for backend loading and activation.

mod helpers;

use std::time::Duration;

use romcnv_backend::BackendError;
use romcnv_core::types::{JobStatus, OutputFormat};
use romcnv_pipeline::BatchError;

#[tokio::test]
async fn test_concurrent_loads_share_one_attempt() {
    let app = helpers::TestBatch::with_load_delay(Duration::from_millis(50));
    let system = helpers::key("cps2");

    let (first, second) = tokio::join!(
        app.registry.ensure_loaded(&system),
        app.registry.ensure_loaded(&system)
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(app.factory.probe_count(), 1);
    assert_eq!(app.factory.instantiate_count(), 1);
}

#[tokio::test]
async fn test_switching_keeps_one_active_backend() {
    let app = helpers::TestBatch::new();

    app.registry
        .activate(&helpers::key("mvs"))
        .await
        .expect("Failed to activate mvs");
    app.registry
        .activate(&helpers::key("cps1"))
        .await
        .expect("Failed to activate cps1");

    let active = app.registry.active().await.expect("No active backend");
    assert_eq!(active.system, helpers::key("cps1"));
    assert_eq!(
        app.registry.loaded_systems().await,
        vec![helpers::key("cps1"), helpers::key("mvs")]
    );

    app.registry
        .activate(&helpers::key("mvs"))
        .await
        .expect("Failed to reactivate mvs");
    assert_eq!(app.factory.instantiate_count(), 2);
}

#[tokio::test]
async fn test_batch_runs_against_requested_system() {
    let app = helpers::TestBatch::new();
    app.registry
        .activate(&helpers::key("cps2"))
        .await
        .expect("Failed to activate cps2");

    let mut queue = app.queue(&["a.zip"]);
    app.pipeline
        .run_batch(&mut queue, &helpers::options("mvs", OutputFormat::Raw))
        .await
        .expect("Batch failed");

    let active = app.registry.active().await.expect("No active backend");
    assert_eq!(active.system, helpers::key("mvs"));
    assert_eq!(queue.jobs()[0].status(), JobStatus::Completed);
}

#[tokio::test]
async fn test_failed_load_disables_submission_until_reload() {
    let app = helpers::TestBatch::new();
    let system = helpers::key("mvs");
    app.factory.mark_missing(&system);

    let err = app
        .registry
        .ensure_loaded(&system)
        .await
        .expect_err("Load should fail");
    assert!(matches!(err, BackendError::Unavailable { .. }));
    assert!(!app.registry.is_submittable(&system).await);
    assert!(app.registry.unavailable_reason(&system).await.is_some());
    assert!(app.registry.loaded_systems().await.is_empty());

    let mut queue = app.queue(&["a.zip"]);
    let err = app
        .pipeline
        .run_batch(&mut queue, &helpers::options("mvs", OutputFormat::Directory))
        .await
        .expect_err("Batch should fail");
    assert!(matches!(err, BatchError::BackendUnavailable(_)));
    assert_eq!(queue.jobs()[0].status(), JobStatus::Pending);

    app.factory.mark_present(&system);
    app.pipeline
        .run_batch(&mut queue, &helpers::options("mvs", OutputFormat::Directory))
        .await
        .expect("Batch failed after reload");
    assert!(app.registry.is_submittable(&system).await);
    assert_eq!(queue.jobs()[0].status(), JobStatus::Completed);
}

#[tokio::test]
async fn test_unknown_system_is_rejected() {
    let app = helpers::TestBatch::new();
    let err = app
        .registry
        .ensure_loaded(&helpers::key("naomi"))
        .await
        .expect_err("Unknown system");
    assert!(matches!(err, BackendError::UnknownSystem { .. }));
}
