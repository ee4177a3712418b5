//! CLI command definitions and dispatch.

pub mod convert;
pub mod probe;
pub mod systems;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use romcnv_backend::{BackendRegistry, BackendSource, ProcessBackendFactory};
use romcnv_core::config::AppConfig;
use romcnv_core::error::AppError;

/// ROMCNV — batch ROM cache converter
#[derive(Debug, Parser)]
#[command(name = "romcnv", version, about, long_about = None)]
pub struct Cli {
    /// Base configuration file, without extension
    #[arg(short, long, default_value = "config/default")]
    pub config: String,

    /// Environment overlay loaded from `config/<env>`
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert a batch of zip files
    Convert(convert::ConvertArgs),
    /// List systems and their output formats
    Systems,
    /// Check that a system's backend loads
    Probe(probe::ProbeArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: &AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Convert(args) => convert::execute(args, config, self.format).await,
            Commands::Systems => systems::execute(config, self.format).await,
            Commands::Probe(args) => probe::execute(args, config, self.format).await,
        }
    }
}

/// Helper: build the backend registry over the configured units
pub fn build_registry(config: &AppConfig) -> Result<Arc<BackendRegistry>, AppError> {
    let sources = BackendSource::catalog(&config.backends)?;
    let factory = ProcessBackendFactory::from_config(&config.backends);
    Ok(Arc::new(BackendRegistry::new(sources, Arc::new(factory))))
}
