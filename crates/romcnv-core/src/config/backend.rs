//! Conversion backend locations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Where converter backends live and where their sandboxes are created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendsConfig {
    /// Directory holding the converter binaries and launcher scripts.
    #[serde(default = "default_directory")]
    pub directory: String,
    /// Root under which per-backend staging sandboxes are created.
    #[serde(default = "default_staging_root")]
    pub staging_root: String,
    /// System key → backend unit.
    #[serde(default = "default_systems")]
    pub systems: BTreeMap<String, BackendSourceConfig>,
}

/// A loadable backend unit, identified by its launcher/binary pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSourceConfig {
    /// Optional launcher script run in place of the binary.
    #[serde(default)]
    pub script_name: Option<String>,
    /// Converter executable file name.
    pub binary_name: String,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            staging_root: default_staging_root(),
            systems: default_systems(),
        }
    }
}

fn default_directory() -> String {
    "./backends".to_string()
}

fn default_staging_root() -> String {
    std::env::temp_dir()
        .join("romcnv")
        .to_string_lossy()
        .to_string()
}

fn default_systems() -> BTreeMap<String, BackendSourceConfig> {
    ["cps1", "cps2", "mvs"]
        .into_iter()
        .map(|system| {
            (
                system.to_string(),
                BackendSourceConfig {
                    script_name: None,
                    binary_name: format!("romcnv_{system}"),
                },
            )
        })
        .collect()
}
