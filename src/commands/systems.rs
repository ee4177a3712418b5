//! `romcnv systems`: show the artifact and invocation tables.

use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use romcnv_backend::BackendSource;
use romcnv_core::config::AppConfig;
use romcnv_core::error::AppError;
use romcnv_core::types::SystemKey;
use romcnv_pipeline::{ArtifactTable, InvocationTable};

/// System/format display row
#[derive(Debug, Serialize, Tabled)]
struct SystemRow {
    /// System key
    system: String,
    /// Output format
    format: String,
    /// Artifact shape
    shape: String,
    /// Expected sandbox path
    path: String,
    /// Converter flags
    flags: String,
    /// Backend unit
    unit: String,
}

/// Execute the systems command
pub async fn execute(config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let catalog = BackendSource::catalog(&config.backends)?;
    let artifacts = ArtifactTable::builtin();
    let invocations = InvocationTable::builtin();

    let mut rows = Vec::new();
    for rule in artifacts.rules() {
        let system = SystemKey::new(&rule.system)?;
        rows.push(SystemRow {
            system: system.label(),
            format: rule.format.to_string(),
            shape: format!("{:?}", rule.kind),
            path: rule.template.clone(),
            flags: invocations.flags(&system, rule.format).join(" "),
            unit: catalog
                .get(&system)
                .map(|source| match &source.script_name {
                    Some(script) => format!("{} ({})", script, source.binary_name),
                    None => source.binary_name.clone(),
                })
                .unwrap_or_else(|| "not configured".to_string()),
        });
    }

    output::print_list(&rows, format);
    Ok(())
}
