//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section; every section has defaults so an empty file is valid.

pub mod backend;
pub mod logging;
pub mod pipeline;

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use self::backend::{BackendSourceConfig, BackendsConfig};
pub use self::logging::LoggingConfig;
pub use self::pipeline::PipelineConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Conversion backend locations.
    #[serde(default)]
    pub backends: BackendsConfig,
    /// Batch pipeline limits.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `<base>` with an environment-specific overlay `config/<env>`
    /// and environment variables prefixed with `ROMCNV__`. Missing files are
    /// skipped.
    pub fn load(base: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(base).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("ROMCNV")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        parsed.validate()?;
        Ok(parsed)
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml_str(document: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(document, config::FileFormat::Toml))
            .build()?;
        let parsed: Self = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Validate numeric ranges of every section.
    pub fn validate(&self) -> Result<(), AppError> {
        self.pipeline
            .validate()
            .map_err(|e| AppError::configuration(format!("Invalid [pipeline] section: {e}")))
    }
}
