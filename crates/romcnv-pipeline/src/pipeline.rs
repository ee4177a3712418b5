//! Batch conversion pipeline.
//!
//! Jobs run strictly one after another against a single snapshot of the
//! active backend. A job that fails is marked `error` and the batch moves
//! on; only a backend that cannot be activated aborts the batch.

use std::sync::Arc;
use std::time::Instant;

use romcnv_backend::{BackendError, BackendRegistry, StagingFs};
use romcnv_core::events::{EventBus, LogSeverity};
use romcnv_core::types::{ArtifactDescriptor, ArtifactKind, JobStatus, SystemKey};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::BatchError;
use crate::invocation::InvocationTable;
use crate::job::{ConversionJob, ConversionOptions, INPUT_DIR, JobQueue};
use crate::metrics::BatchMetrics;
use crate::resolver::ArtifactTable;

/// Summary of one `run_batch` call.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// System the batch ran against.
    pub system: SystemKey,
    /// Jobs processed by this run.
    pub total: usize,
    /// Jobs that completed.
    pub completed: usize,
    /// Jobs that failed.
    pub failed: usize,
    /// Artifacts of every completed job in the queue.
    pub artifacts: Vec<ArtifactDescriptor>,
    /// Wall time of the run.
    pub duration_ms: u64,
}

/// The batch conversion pipeline.
#[derive(Debug)]
pub struct BatchPipeline {
    registry: Arc<BackendRegistry>,
    artifacts: ArtifactTable,
    invocations: InvocationTable,
    events: EventBus,
    metrics: Arc<BatchMetrics>,
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        100
    } else {
        (done * 100 / total) as u8
    }
}

impl BatchPipeline {
    /// Create a pipeline with the bundled tables.
    pub fn new(registry: Arc<BackendRegistry>, events: EventBus) -> Self {
        Self {
            registry,
            artifacts: ArtifactTable::builtin(),
            invocations: InvocationTable::builtin(),
            events,
            metrics: Arc::new(BatchMetrics::new()),
        }
    }

    /// Replace the artifact and invocation tables.
    pub fn with_tables(mut self, artifacts: ArtifactTable, invocations: InvocationTable) -> Self {
        self.artifacts = artifacts;
        self.invocations = invocations;
        self
    }

    /// The artifact table.
    pub fn artifacts(&self) -> &ArtifactTable {
        &self.artifacts
    }

    /// The invocation table.
    pub fn invocations(&self) -> &InvocationTable {
        &self.invocations
    }

    /// The event bus.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Metrics collector.
    pub fn metrics(&self) -> &Arc<BatchMetrics> {
        &self.metrics
    }

    /// Staging filesystem of the active backend.
    pub async fn active_staging(&self) -> Result<StagingFs, BatchError> {
        let active = self
            .registry
            .active()
            .await
            .ok_or(BatchError::BackendUnavailable(BackendError::NoActiveBackend))?;
        Ok(StagingFs::new(active.backend))
    }

    /// Run every pending job in `queue`.
    ///
    /// Returns an error only if the format is unsupported, the queue holds
    /// jobs already run against another system, or the backend cannot be
    /// activated; per-job failures are recorded on the jobs.
    #[instrument(skip(self, queue, options), fields(system = %options.system, format = %options.output_format))]
    pub async fn run_batch(
        &self,
        queue: &mut JobQueue,
        options: &ConversionOptions,
    ) -> Result<BatchReport, BatchError> {
        let started = Instant::now();

        if self
            .artifacts
            .rule(&options.system, options.output_format)
            .is_none()
        {
            return Err(BatchError::UnsupportedFormat {
                system: options.system.to_string(),
                format: options.output_format,
            });
        }

        if let Some(job) = queue.bound_elsewhere(&options.system) {
            return Err(BatchError::SystemMismatch {
                file_name: job.file_name.clone(),
                bound: job.system().map(ToString::to_string).unwrap_or_default(),
                requested: options.system.to_string(),
            });
        }

        let active = match self.registry.activate(&options.system).await {
            Ok(active) => active,
            Err(e) => {
                self.events.log(
                    format!("Failed to load {} backend: {e}", options.system.label()),
                    LogSeverity::Error,
                );
                return Err(e.into());
            }
        };
        let staging = StagingFs::new(active.backend);
        staging.ensure_dir(INPUT_DIR)?;

        let pending: Vec<usize> = queue
            .jobs()
            .iter()
            .enumerate()
            .filter(|(_, job)| job.status() == JobStatus::Pending)
            .map(|(index, _)| index)
            .collect();
        let total = pending.len();
        info!(jobs = total, "Starting batch");

        let mut completed = 0;
        let mut failed = 0;
        for (done, index) in pending.into_iter().enumerate() {
            self.events.progress(
                percent(done, total),
                format!("Processing {}/{}", done + 1, total),
            );

            let job = &mut queue.jobs_mut()[index];
            match self.process_job(&staging, job, options).await? {
                JobStatus::Completed => completed += 1,
                _ => failed += 1,
            }
        }

        self.events.progress(100, "Batch complete");
        self.events.log(
            format!("Batch finished: {completed} converted, {failed} failed"),
            if failed == 0 {
                LogSeverity::Success
            } else {
                LogSeverity::Warning
            },
        );

        let artifacts = queue.completed_artifacts();
        self.events.artifacts_ready(artifacts.clone());
        self.metrics.record_batch();

        let report = BatchReport {
            system: options.system.clone(),
            total,
            completed,
            failed,
            artifacts,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            completed = report.completed,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "Batch finished"
        );
        Ok(report)
    }

    /// Drive one job to a terminal status and return that status.
    async fn process_job(
        &self,
        staging: &StagingFs,
        job: &mut ConversionJob,
        options: &ConversionOptions,
    ) -> Result<JobStatus, BatchError> {
        job.start(&options.system)?;
        self.events.job_status(&job.file_name, JobStatus::Processing);
        self.events.log(
            format!(
                "Converting {} for {}...",
                job.file_name,
                options.system.label()
            ),
            LogSeverity::Info,
        );
        self.events.log(
            if options.slim {
                "Options: Slim mode enabled"
            } else {
                "Options: Standard mode"
            },
            LogSeverity::Info,
        );
        self.metrics.record_started(job.raw_bytes().len() as u64);

        let started = Instant::now();
        let input_path = job.input_path();
        let outcome = self.convert(staging, job, &input_path, options).await;

        if let Err(e) = staging.remove_recursive(&input_path) {
            warn!(job = %job.file_name, error = %e, "Failed to remove staged input");
        }

        let elapsed = started.elapsed();
        match outcome {
            Ok(artifact) => {
                let produced = artifact.file_name().to_string();
                job.complete(artifact)?;
                self.metrics.record_completed(elapsed);
                self.events.log(
                    format!("Converted {} -> {produced}", job.file_name),
                    LogSeverity::Success,
                );
            }
            Err(err) => {
                let missing = matches!(err, BatchError::ArtifactNotFound { .. });
                if missing {
                    self.events.log(
                        format!("No output for {}: {err}", job.file_name),
                        LogSeverity::Warning,
                    );
                } else {
                    self.events.log(
                        format!("Failed to convert {}: {err}", job.file_name),
                        LogSeverity::Error,
                    );
                }
                job.fail(err.to_string())?;
                self.metrics.record_failed(elapsed, missing);
            }
        }

        self.events.job_status(&job.file_name, job.status());
        Ok(job.status())
    }

    /// Stage, purge, invoke, and check for the expected artifact.
    ///
    /// The exit code is not consulted: converters report "nothing to do"
    /// and "converted" with overlapping codes, so an artifact of the
    /// expected shape is the only success signal.
    async fn convert(
        &self,
        staging: &StagingFs,
        job: &ConversionJob,
        input_path: &str,
        options: &ConversionOptions,
    ) -> Result<ArtifactDescriptor, BatchError> {
        staging.write(input_path, job.raw_bytes())?;

        let reserved = self
            .artifacts
            .reserved_paths(&options.system, &job.game_name);
        let purged = staging.purge_all(&reserved)?;
        if purged > 0 {
            debug!(job = %job.file_name, purged, "Removed stale artifacts");
        }

        let expected = self
            .artifacts
            .resolve(&options.system, options.output_format, &job.game_name)
            .ok_or_else(|| BatchError::UnsupportedFormat {
                system: options.system.to_string(),
                format: options.output_format,
            })?;

        let argv = self.invocations.argv(input_path, options);
        debug!(job = %job.file_name, args = ?argv, "Invoking backend");

        let backend = Arc::clone(staging.backend());
        let output = tokio::task::spawn_blocking(move || backend.invoke(&argv))
            .await
            .map_err(|e| BatchError::Invocation(e.to_string()))??;

        debug!(job = %job.file_name, exit_code = output.exit_code, "Backend returned");
        for line in &output.stdout {
            debug!(target: "romcnv::backend", job = %job.file_name, "{}", line);
        }
        for line in &output.stderr {
            debug!(target: "romcnv::backend", job = %job.file_name, stream = "stderr", "{}", line);
        }

        let shape_matches = staging.exists(&expected.path)
            && staging.is_directory(&expected.path)? == (expected.kind == ArtifactKind::Directory);
        if shape_matches {
            Ok(expected)
        } else {
            Err(BatchError::ArtifactNotFound {
                path: expected.path,
                kind: expected.kind,
            })
        }
    }
}
