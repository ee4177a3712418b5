//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;

use zip::write::SimpleFileOptions;

use romcnv_backend::{BackendRegistry, BackendSource, MemoryBackendFactory, MemorySandbox};
use romcnv_core::config::{BackendsConfig, PipelineConfig};
use romcnv_core::events::EventBus;
use romcnv_core::types::{OutputFormat, SystemKey};
use romcnv_pipeline::{BatchPipeline, ConversionOptions, JobQueue, ResultPackager};

/// Test batch context over in-memory backends
pub struct TestBatch {
    /// Factory handing out memory backends
    pub factory: MemoryBackendFactory,
    /// Registry shared with the pipeline
    pub registry: Arc<BackendRegistry>,
    /// The pipeline under test
    pub pipeline: BatchPipeline,
    /// Packager with default settings
    pub packager: ResultPackager,
    /// Queue limits
    pub config: PipelineConfig,
}

impl TestBatch {
    /// Create a context whose converter writes the shape selected by argv
    pub fn new() -> Self {
        Self::with_factory(MemoryBackendFactory::new(fake_converter))
    }

    /// Create a context whose backend loads take `delay`
    pub fn with_load_delay(delay: Duration) -> Self {
        Self::with_factory(MemoryBackendFactory::new(fake_converter).with_load_delay(delay))
    }

    fn with_factory(factory: MemoryBackendFactory) -> Self {
        let sources = BackendSource::catalog(&BackendsConfig::default())
            .expect("Failed to build backend catalog");
        let registry = Arc::new(BackendRegistry::new(sources, Arc::new(factory.clone())));
        Self {
            pipeline: BatchPipeline::new(Arc::clone(&registry), EventBus::new()),
            packager: ResultPackager::default(),
            config: PipelineConfig::default(),
            factory,
            registry,
        }
    }

    /// Build a queue holding one small zip per name
    pub fn queue(&self, names: &[&str]) -> JobQueue {
        let mut queue = JobQueue::new(&self.config);
        for name in names {
            queue
                .accept(*name, zip_bytes(name.as_bytes()))
                .expect("Failed to accept input");
        }
        queue
    }
}

/// System key shorthand
pub fn key(raw: &str) -> SystemKey {
    SystemKey::new(raw).expect("Invalid system key")
}

/// Batch options shorthand
pub fn options(system: &str, format: OutputFormat) -> ConversionOptions {
    ConversionOptions::new(key(system), format)
}

/// A zip archive with a single entry holding `payload`
pub fn zip_bytes(payload: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("rom.bin", SimpleFileOptions::default())
        .expect("Failed to start zip entry");
    writer.write_all(payload).expect("Failed to write zip entry");
    writer
        .finish()
        .expect("Failed to finish zip")
        .into_inner()
}

/// Stand-in converter: `-zip` writes `<game>_cache.zip`, `-raw` writes
/// `<game>.cache`, otherwise `<game>_cache/` with two files. Games named
/// `skip*` produce nothing.
pub fn fake_converter(sandbox: &MemorySandbox, argv: &[String]) -> i32 {
    let Some(input) = argv.first() else {
        return 2;
    };
    let file_name = input.rsplit('/').next().unwrap_or(input);
    let game = file_name
        .strip_suffix(".zip")
        .unwrap_or(file_name)
        .to_lowercase();
    if game.starts_with("skip") {
        return 0;
    }
    let Ok(bytes) = sandbox.read(input) else {
        return 1;
    };

    let written = if argv.iter().any(|a| a == "-zip") {
        sandbox.write(&format!("/cache/{game}_cache.zip"), &bytes)
    } else if argv.iter().any(|a| a == "-raw") {
        sandbox.write(&format!("/cache/{game}.cache"), &bytes)
    } else {
        sandbox
            .write(&format!("/cache/{game}_cache/sprites.bin"), &bytes)
            .and_then(|_| sandbox.write(&format!("/cache/{game}_cache/audio/m1.bin"), b"m1"))
    };
    if written.is_ok() { 0 } else { 1 }
}
