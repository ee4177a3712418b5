//! Conversion jobs and the batch queue.

use std::io::Cursor;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use romcnv_core::config::PipelineConfig;
use romcnv_core::types::{ArtifactDescriptor, JobStatus, OutputFormat, SystemKey};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;
use zip::ZipArchive;

use crate::error::BatchError;

/// Sandbox directory inputs are staged into.
pub const INPUT_DIR: &str = "/roms";

/// Options applied to every job of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionOptions {
    /// Target system.
    pub system: SystemKey,
    /// Requested output shape.
    pub output_format: OutputFormat,
    /// Strip optional data from the output.
    pub slim: bool,
}

impl ConversionOptions {
    /// Create options in standard (non-slim) mode.
    pub fn new(system: SystemKey, output_format: OutputFormat) -> Self {
        Self {
            system,
            output_format,
            slim: false,
        }
    }

    /// Set slim mode.
    pub fn with_slim(mut self, slim: bool) -> Self {
        self.slim = slim;
        self
    }
}

/// Derive the game name from an input file name (`Sf2.ZIP` → `sf2`).
pub fn game_name(file_name: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    stem.to_lowercase()
}

/// One queued input file.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionJob {
    /// Unique job ID.
    pub id: Uuid,
    /// Input file name as supplied.
    pub file_name: String,
    /// Game name derived from the file name.
    pub game_name: String,
    #[serde(skip)]
    raw_bytes: Bytes,
    status: JobStatus,
    system: Option<SystemKey>,
    artifact: Option<ArtifactDescriptor>,
    error: Option<String>,
    /// When the job was queued.
    pub queued_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl ConversionJob {
    fn new(file_name: String, raw_bytes: Bytes) -> Self {
        Self {
            id: Uuid::now_v7(),
            game_name: game_name(&file_name),
            file_name,
            raw_bytes,
            status: JobStatus::Pending,
            system: None,
            artifact: None,
            error: None,
            queued_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// System the job was converted for; set once it leaves `pending`.
    pub fn system(&self) -> Option<&SystemKey> {
        self.system.as_ref()
    }

    /// Input bytes.
    pub fn raw_bytes(&self) -> &Bytes {
        &self.raw_bytes
    }

    /// Resolved artifact; only ever set on completed jobs.
    pub fn artifact(&self) -> Option<&ArtifactDescriptor> {
        self.artifact.as_ref()
    }

    /// Failure message of an errored job.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// When the job reached a terminal status.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Sandbox path the input is staged at.
    pub fn input_path(&self) -> String {
        format!("{INPUT_DIR}/{}", self.file_name)
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), BatchError> {
        if !self.status.can_transition_to(next) {
            return Err(BatchError::InvalidTransition {
                file_name: self.file_name.clone(),
                from: self.status,
                to: next,
            });
        }
        debug!(job = %self.file_name, from = %self.status, to = %next, "Job transition");
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// `pending → processing` against `system`.
    pub fn start(&mut self, system: &SystemKey) -> Result<(), BatchError> {
        self.transition(JobStatus::Processing)?;
        self.system = Some(system.clone());
        Ok(())
    }

    /// `processing → completed`, recording the artifact.
    pub fn complete(&mut self, artifact: ArtifactDescriptor) -> Result<(), BatchError> {
        self.transition(JobStatus::Completed)?;
        self.artifact = Some(artifact);
        Ok(())
    }

    /// `processing → error`, recording the reason.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), BatchError> {
        self.transition(JobStatus::Error)?;
        self.error = Some(reason.into());
        Ok(())
    }
}

/// Ordered queue of jobs for one batch.
#[derive(Debug, Clone)]
pub struct JobQueue {
    jobs: Vec<ConversionJob>,
    max_entries: usize,
    max_bytes: u64,
}

impl JobQueue {
    /// Create an empty queue with the configured limits.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            jobs: Vec::new(),
            max_entries: config.max_input_entries,
            max_bytes: config.max_input_bytes(),
        }
    }

    /// Accept a file, returning the new job's ID.
    ///
    /// The name must end in `.zip`, the bytes must open as a zip archive
    /// within the entry limit, and no queued job may share its game name.
    pub fn accept(
        &mut self,
        file_name: impl Into<String>,
        raw_bytes: impl Into<Bytes>,
    ) -> Result<Uuid, BatchError> {
        let file_name = file_name.into();
        let raw_bytes = raw_bytes.into();
        let reject = |reason: String| BatchError::Rejected {
            file_name: file_name.clone(),
            reason,
        };

        if file_name.contains('/') || file_name.contains('\\') {
            return Err(reject("file name must not contain a path".to_string()));
        }
        if !file_name.to_lowercase().ends_with(".zip") {
            return Err(reject("only .zip files are accepted".to_string()));
        }
        if raw_bytes.len() as u64 > self.max_bytes {
            return Err(reject(format!(
                "{} bytes exceeds the {} byte limit",
                raw_bytes.len(),
                self.max_bytes
            )));
        }

        let game = game_name(&file_name);
        if self.jobs.iter().any(|job| job.game_name == game) {
            return Err(reject(format!("game '{game}' is already queued")));
        }

        let archive = ZipArchive::new(Cursor::new(raw_bytes.as_ref()))
            .map_err(|e| reject(format!("not a zip archive: {e}")))?;
        if archive.len() > self.max_entries {
            return Err(reject(format!(
                "{} entries exceeds the limit of {}",
                archive.len(),
                self.max_entries
            )));
        }

        let job = ConversionJob::new(file_name, raw_bytes);
        let id = job.id;
        debug!(job = %job.file_name, game = %job.game_name, "Job queued");
        self.jobs.push(job);
        Ok(id)
    }

    /// All jobs in queue order.
    pub fn jobs(&self) -> &[ConversionJob] {
        &self.jobs
    }

    pub(crate) fn jobs_mut(&mut self) -> &mut [ConversionJob] {
        &mut self.jobs
    }

    /// Look up a job.
    pub fn get(&self, id: Uuid) -> Option<&ConversionJob> {
        self.jobs.iter().find(|job| job.id == id)
    }

    /// Number of queued jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Number of jobs with `status`.
    pub fn count(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|job| job.status == status).count()
    }

    /// Artifacts of every completed job, in queue order.
    pub fn completed_artifacts(&self) -> Vec<ArtifactDescriptor> {
        self.jobs
            .iter()
            .filter(|job| job.status == JobStatus::Completed)
            .filter_map(|job| job.artifact.clone())
            .collect()
    }

    /// First job already run against a system other than `system`.
    pub fn bound_elsewhere(&self, system: &SystemKey) -> Option<&ConversionJob> {
        self.jobs
            .iter()
            .find(|job| job.system.as_ref().is_some_and(|bound| bound != system))
    }

    /// Drop every job.
    pub fn reset(&mut self) {
        self.jobs.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use romcnv_core::types::ArtifactKind;
    use zip::write::SimpleFileOptions;

    use super::*;

    fn zip_bytes(entries: usize) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for i in 0..entries {
            writer
                .start_file(format!("rom{i}.bin"), SimpleFileOptions::default())
                .expect("start");
            writer.write_all(b"data").expect("write");
        }
        writer.finish().expect("finish").into_inner()
    }

    fn queue() -> JobQueue {
        JobQueue::new(&PipelineConfig::default())
    }

    #[test]
    fn test_game_name() {
        assert_eq!(game_name("Sf2.ZIP"), "sf2");
        assert_eq!(game_name("kof98.v2.zip"), "kof98.v2");
        assert_eq!(game_name("noext"), "noext");
    }

    #[test]
    fn test_accept_zip() {
        let mut q = queue();
        let id = q.accept("Sf2.Zip", zip_bytes(2)).expect("accept");
        let job = q.get(id).expect("job");
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.game_name, "sf2");
        assert_eq!(job.input_path(), "/roms/Sf2.Zip");
    }

    #[test]
    fn test_reject_non_zip() {
        let mut q = queue();
        assert!(matches!(
            q.accept("sf2.7z", zip_bytes(1)),
            Err(BatchError::Rejected { .. })
        ));
        assert!(matches!(
            q.accept("sf2.zip", b"not a zip".to_vec()),
            Err(BatchError::Rejected { .. })
        ));
        assert!(q.is_empty());
    }

    #[test]
    fn test_reject_too_many_entries() {
        let config = PipelineConfig {
            max_input_entries: 2,
            ..PipelineConfig::default()
        };
        let mut q = JobQueue::new(&config);
        assert!(q.accept("a.zip", zip_bytes(2)).is_ok());
        assert!(matches!(
            q.accept("b.zip", zip_bytes(3)),
            Err(BatchError::Rejected { .. })
        ));
    }

    #[test]
    fn test_reject_duplicate_game() {
        let mut q = queue();
        q.accept("sf2.zip", zip_bytes(1)).expect("first");
        assert!(q.accept("SF2.zip", zip_bytes(1)).is_err());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_lattice_is_monotonic() {
        let mut q = queue();
        q.accept("a.zip", zip_bytes(1)).expect("accept");
        let job = &mut q.jobs_mut()[0];

        let mvs = SystemKey::new("mvs").expect("key");
        assert!(job.fail("early").is_err());
        assert!(job.system().is_none());
        job.start(&mvs).expect("start");
        assert!(job.start(&mvs).is_err());
        assert_eq!(job.system(), Some(&mvs));
        job.complete(ArtifactDescriptor {
            game_name: "a".to_string(),
            kind: ArtifactKind::Directory,
            path: "/cache/a_cache".to_string(),
        })
        .expect("complete");
        assert!(job.fail("late").is_err());
        assert!(job.finished_at().is_some());
        assert_eq!(q.completed_artifacts().len(), 1);
    }

    #[test]
    fn test_bound_elsewhere() {
        let mvs = SystemKey::new("mvs").expect("key");
        let cps1 = SystemKey::new("cps1").expect("key");
        let mut q = queue();
        q.accept("a.zip", zip_bytes(1)).expect("accept");
        q.accept("b.zip", zip_bytes(1)).expect("accept");
        assert!(q.bound_elsewhere(&cps1).is_none());

        q.jobs_mut()[0].start(&mvs).expect("start");
        assert!(q.bound_elsewhere(&mvs).is_none());
        let bound = q.bound_elsewhere(&cps1).expect("bound");
        assert_eq!(bound.file_name, "a.zip");
    }

    #[test]
    fn test_reset_clears() {
        let mut q = queue();
        q.accept("a.zip", zip_bytes(1)).expect("accept");
        q.reset();
        assert!(q.is_empty());
        assert!(q.completed_artifacts().is_empty());
    }
}
