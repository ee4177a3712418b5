//! Backend units as declared in configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use romcnv_core::config::BackendsConfig;
use romcnv_core::result::AppResult;
use romcnv_core::types::SystemKey;
use serde::Serialize;

/// A loadable backend unit, identified by its `{script, binary}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendSource {
    /// The system the unit converts for.
    pub system: SystemKey,
    /// Optional launcher script run in place of the binary.
    pub script_name: Option<String>,
    /// Converter executable file name.
    pub binary_name: String,
}

impl BackendSource {
    /// Create a source with no launcher script.
    pub fn new(system: SystemKey, binary_name: impl Into<String>) -> Self {
        Self {
            system,
            script_name: None,
            binary_name: binary_name.into(),
        }
    }

    /// Attach a launcher script.
    pub fn with_script(mut self, script_name: impl Into<String>) -> Self {
        self.script_name = Some(script_name.into());
        self
    }

    /// Location of the binary under `directory`.
    pub fn binary_path(&self, directory: &Path) -> PathBuf {
        directory.join(&self.binary_name)
    }

    /// Location of the launcher script under `directory`, if any.
    pub fn script_path(&self, directory: &Path) -> Option<PathBuf> {
        self.script_name.as_ref().map(|name| directory.join(name))
    }

    /// Build the system → source catalog from configuration.
    pub fn catalog(config: &BackendsConfig) -> AppResult<BTreeMap<SystemKey, BackendSource>> {
        config
            .systems
            .iter()
            .map(|(name, unit)| {
                let system = SystemKey::new(name)?;
                let source = Self {
                    system: system.clone(),
                    script_name: unit.script_name.clone(),
                    binary_name: unit.binary_name.clone(),
                };
                Ok((system, source))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use romcnv_core::config::BackendSourceConfig;

    #[test]
    fn test_catalog_from_config() {
        let mut config = BackendsConfig::default();
        config.systems.insert(
            "NCDZ".to_string(),
            BackendSourceConfig {
                script_name: Some("ncdz.sh".to_string()),
                binary_name: "romcnv_ncdz".to_string(),
            },
        );

        let catalog = BackendSource::catalog(&config).expect("catalog");
        let ncdz = SystemKey::new("ncdz").expect("key");
        let source = &catalog[&ncdz];
        assert_eq!(source.binary_name, "romcnv_ncdz");
        assert_eq!(
            source.script_path(Path::new("/opt")),
            Some(PathBuf::from("/opt/ncdz.sh"))
        );
        assert!(catalog.contains_key(&SystemKey::new("mvs").expect("key")));
    }
}
