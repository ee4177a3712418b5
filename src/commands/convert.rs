//! `romcnv convert`: run one batch and write the deliverable.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::output::{self, OutputFormat};
use romcnv_core::config::AppConfig;
use romcnv_core::error::{AppError, ErrorKind};
use romcnv_core::events::{EventBus, EventEnvelope};
use romcnv_core::types::{self, SystemKey};
use romcnv_pipeline::{
    BatchPipeline, BatchReport, ConversionJob, ConversionOptions, Deliverable, JobQueue,
    ResultPackager,
};

/// Arguments for the convert command
#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Zip files to convert
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Target system (e.g. cps1, cps2, mvs)
    #[arg(short, long)]
    pub system: String,

    /// Output shape
    #[arg(short, long, value_enum, default_value = "directory")]
    pub output_format: types::OutputFormat,

    /// Strip optional data from the output
    #[arg(long)]
    pub slim: bool,

    /// Directory the deliverable is written into
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
}

/// Job display row
#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    /// Input file
    file: String,
    /// Derived game name
    game: String,
    /// Status
    status: String,
    /// Produced artifact
    artifact: String,
    /// Failure reason
    error: String,
}

impl From<&ConversionJob> for JobRow {
    fn from(job: &ConversionJob) -> Self {
        let badge = output::status_badge(job.status());
        Self {
            file: job.file_name.clone(),
            game: job.game_name.clone(),
            status: format!("{} {}", badge.symbol, badge.label),
            artifact: job
                .artifact()
                .map(|a| a.file_name().to_string())
                .unwrap_or_default(),
            error: job.error().unwrap_or_default().to_string(),
        }
    }
}

/// Written deliverable summary
#[derive(Debug, Serialize)]
struct ConvertSummary {
    report: BatchReport,
    deliverable: PathBuf,
    bytes: usize,
    kind: romcnv_pipeline::DeliverableKind,
}

/// Execute the convert command
pub async fn execute(
    args: &ConvertArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let system = SystemKey::new(&args.system)?;
    let registry = super::build_registry(config)?;
    if registry.source(&system).is_none() {
        return Err(AppError::not_found(format!(
            "No backend configured for system '{}'",
            system
        )));
    }

    let mut queue = JobQueue::new(&config.pipeline);
    for path in &args.files {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| AppError::validation(format!("Not a file: {}", path.display())))?;
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Io,
                format!("Failed to read {}", path.display()),
                e,
            )
        })?;
        if let Err(e) = queue.accept(file_name, bytes) {
            output::print_warning(&e.to_string());
        }
    }
    if queue.is_empty() {
        return Err(AppError::validation("No acceptable input files"));
    }

    let pipeline = BatchPipeline::new(registry.clone(), EventBus::new());
    let printer = spawn_printer(pipeline.events().subscribe(), format);
    let options = ConversionOptions::new(system.clone(), args.output_format).with_slim(args.slim);
    let packager = ResultPackager::from_config(&config.pipeline);

    let outcome = run(&pipeline, &packager, &mut queue, &options, &args.out).await;

    drop(pipeline);
    if let Err(e) = printer.await {
        warn!(error = %e, "Event printer stopped unexpectedly");
    }
    registry.unload(&system).await;

    if format == OutputFormat::Table {
        let rows: Vec<JobRow> = queue.jobs().iter().map(JobRow::from).collect();
        output::print_list(&rows, format);
    }

    let (report, deliverable, path) = outcome?;
    match format {
        OutputFormat::Table => {
            output::print_success(&format!(
                "Wrote {} ({} bytes)",
                path.display(),
                deliverable.bytes.len()
            ));
            output::print_kv("Completed", &report.completed.to_string());
            output::print_kv("Failed", &report.failed.to_string());
            output::print_kv("Duration", &format!("{} ms", report.duration_ms));
        }
        OutputFormat::Json => {
            output::print_json(
                &ConvertSummary {
                    report,
                    bytes: deliverable.bytes.len(),
                    kind: deliverable.kind,
                    deliverable: path,
                },
                format,
            );
        }
    }
    Ok(())
}

async fn run(
    pipeline: &BatchPipeline,
    packager: &ResultPackager,
    queue: &mut JobQueue,
    options: &ConversionOptions,
    out: &Path,
) -> Result<(BatchReport, Deliverable, PathBuf), AppError> {
    let report = pipeline.run_batch(queue, options).await?;
    let staging = pipeline.active_staging().await?;
    let deliverable = packager.package(&staging, &report.artifacts).await?;

    tokio::fs::create_dir_all(out).await?;
    let path = out.join(&deliverable.file_name);
    tokio::fs::write(&path, &deliverable.bytes).await?;

    Ok((report, deliverable, path))
}

fn spawn_printer(
    mut events: broadcast::Receiver<EventEnvelope>,
    format: OutputFormat,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(envelope) => output::print_event(&envelope, format),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
