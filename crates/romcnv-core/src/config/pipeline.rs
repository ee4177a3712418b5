//! Batch pipeline configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Limits applied when accepting files and building the deliverable.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of entries an input zip may contain.
    #[serde(default = "default_max_input_entries")]
    #[validate(range(min = 1, max = 65535))]
    pub max_input_entries: usize,
    /// Maximum size of a single input file in megabytes.
    #[serde(default = "default_max_input_size_mb")]
    #[validate(range(min = 1, max = 4096))]
    pub max_input_size_mb: u64,
    /// Deflate level for the packaged container.
    #[serde(default = "default_compression_level")]
    #[validate(range(min = 0, max = 9))]
    pub compression_level: i64,
}

impl PipelineConfig {
    /// Input size limit in bytes.
    pub fn max_input_bytes(&self) -> u64 {
        self.max_input_size_mb * 1024 * 1024
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_input_entries: default_max_input_entries(),
            max_input_size_mb: default_max_input_size_mb(),
            compression_level: default_compression_level(),
        }
    }
}

fn default_max_input_entries() -> usize {
    4096
}

fn default_max_input_size_mb() -> u64 {
    512
}

fn default_compression_level() -> i64 {
    6
}
