//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use romcnv_core::events::{BatchEvent, EventEnvelope, LogSeverity};
use romcnv_core::types::JobStatus;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Display attributes of a job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBadge {
    /// Single-glyph marker.
    pub symbol: &'static str,
    /// Short label.
    pub label: &'static str,
}

/// Look up how a job status is displayed.
pub fn status_badge(status: JobStatus) -> StatusBadge {
    match status {
        JobStatus::Pending => StatusBadge {
            symbol: "…",
            label: "Pending",
        },
        JobStatus::Processing => StatusBadge {
            symbol: "⟳",
            label: "Converting",
        },
        JobStatus::Completed => StatusBadge {
            symbol: "✓",
            label: "Done",
        },
        JobStatus::Error => StatusBadge {
            symbol: "✗",
            label: "Failed",
        },
    }
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                let table = Table::new(items).to_string();
                println!("{}", table);
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
            println!("{}", json);
        }
    }
}

/// Print a single item as JSON; table mode prints nothing
pub fn print_json<T: Serialize>(item: &T, format: OutputFormat) {
    if format == OutputFormat::Json {
        let json = serde_json::to_string_pretty(item).unwrap_or_else(|_| "{}".to_string());
        println!("{}", json);
    }
}

/// Print a batch event as it arrives
pub fn print_event(envelope: &EventEnvelope, format: OutputFormat) {
    if format == OutputFormat::Json {
        if let Ok(line) = serde_json::to_string(envelope) {
            println!("{}", line);
        }
        return;
    }

    match &envelope.event {
        BatchEvent::Progress { percent, label } => println!("[{:>3}%] {}", percent, label),
        BatchEvent::LogLine { text, severity } => match severity {
            LogSeverity::Info => println!("  {}", text),
            LogSeverity::Success => print_success(text),
            LogSeverity::Warning => print_warning(text),
            LogSeverity::Error => print_error(text),
        },
        BatchEvent::JobStatusChanged { .. } => {}
        BatchEvent::ArtifactsReady { descriptors } => {
            println!("{} artifact(s) ready", descriptors.len());
        }
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {}", msg);
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{}:", key), value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_status_has_distinct_badge() {
        let badges: Vec<StatusBadge> = [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Error,
        ]
        .into_iter()
        .map(status_badge)
        .collect();

        for (i, a) in badges.iter().enumerate() {
            for b in &badges[i + 1..] {
                assert_ne!(a.symbol, b.symbol);
                assert_ne!(a.label, b.label);
            }
        }
        assert_eq!(status_badge(JobStatus::Completed).label, "Done");
    }
}
