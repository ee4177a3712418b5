//! Output formats and the artifact descriptors resolved from them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Output format selected by the caller. Which formats a system offers is
/// decided by the artifact table in `romcnv-pipeline`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// A cache directory tree.
    Directory,
    /// A single compressed cache archive.
    Archive,
    /// A single uncompressed cache blob.
    Raw,
}

impl OutputFormat {
    /// Return the format as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Archive => "archive",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shape of an artifact left in the staging sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A directory tree, flattened into the container.
    Directory,
    /// An already compressed archive.
    Archive,
    /// A single raw blob.
    RawBlob,
}

impl ArtifactKind {
    /// Whether the artifact is a single file.
    pub fn is_single_file(&self) -> bool {
        !matches!(self, Self::Directory)
    }
}

/// Resolved expected output of one job. Only ever recorded for jobs that
/// end `completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Game name derived from the input file.
    pub game_name: String,
    /// Shape of the artifact.
    pub kind: ArtifactKind,
    /// Absolute path inside the staging sandbox.
    pub path: String,
}

impl ArtifactDescriptor {
    /// Final path component (`sf2_cache`, `sf2.cache`).
    pub fn file_name(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(self.path.as_str())
    }
}
