//! `romcnv probe`: load a backend and report whether it is usable.

use std::path::Path;

use clap::Args;
use serde::Serialize;

use crate::output::{self, OutputFormat};
use romcnv_core::config::AppConfig;
use romcnv_core::error::AppError;
use romcnv_core::types::SystemKey;

/// Arguments for the probe command
#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// System to probe
    pub system: String,
}

/// Probe result
#[derive(Debug, Serialize)]
struct ProbeReport {
    system: SystemKey,
    available: bool,
    binary: String,
    script: Option<String>,
    reason: Option<String>,
}

/// Execute the probe command
pub async fn execute(
    args: &ProbeArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let system = SystemKey::new(&args.system)?;
    let registry = super::build_registry(config)?;
    let source = registry
        .source(&system)
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("No backend configured for '{}'", system)))?;

    let directory = Path::new(&config.backends.directory);
    let loaded = registry.ensure_loaded(&system).await;
    let report = ProbeReport {
        system: system.clone(),
        available: loaded.is_ok(),
        binary: source.binary_path(directory).display().to_string(),
        script: source
            .script_path(directory)
            .map(|p| p.display().to_string()),
        reason: registry.unavailable_reason(&system).await,
    };
    registry.unload(&system).await;

    match format {
        OutputFormat::Json => output::print_json(&report, format),
        OutputFormat::Table => {
            if report.available {
                output::print_success(&format!("{} backend is available", system.label()));
            } else {
                output::print_warning(&format!("{} backend is unavailable", system.label()));
            }
            output::print_kv("Binary", &report.binary);
            if let Some(script) = &report.script {
                output::print_kv("Script", script);
            }
            if let Some(reason) = &report.reason {
                output::print_kv("Reason", reason);
            }
        }
    }

    loaded.map(|_| ()).map_err(AppError::from)
}
