//! Converter argument vectors.

use romcnv_core::types::{OutputFormat, SystemKey};

use crate::job::ConversionOptions;

/// Flag appended when slim mode is on.
pub const SLIM_FLAG: &str = "-slim";

/// Format-selection flags for one `(system, format)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagRule {
    /// System key the row applies to.
    pub system: String,
    /// Output format the row applies to.
    pub format: OutputFormat,
    /// Flags passed after the input path.
    pub flags: Vec<String>,
}

impl FlagRule {
    /// Create a row.
    pub fn new(system: impl Into<String>, format: OutputFormat, flags: &[&str]) -> Self {
        Self {
            system: system.into(),
            format,
            flags: flags.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Table of format-selection flags.
///
/// A pair with no row gets no flags; the directory output is every
/// converter's default.
#[derive(Debug, Clone)]
pub struct InvocationTable {
    rules: Vec<FlagRule>,
}

impl InvocationTable {
    /// An empty table.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The rows for the bundled converters.
    pub fn builtin() -> Self {
        Self::empty()
            .with_rule(FlagRule::new("cps1", OutputFormat::Raw, &["-raw"]))
            .with_rule(FlagRule::new("cps2", OutputFormat::Archive, &["-zip"]))
            .with_rule(FlagRule::new("mvs", OutputFormat::Archive, &["-zip"]))
            .with_rule(FlagRule::new("mvs", OutputFormat::Raw, &["-raw"]))
    }

    /// Add a row, replacing any existing row for the same key.
    pub fn with_rule(mut self, rule: FlagRule) -> Self {
        self.rules
            .retain(|r| !(r.system == rule.system && r.format == rule.format));
        self.rules.push(rule);
        self
    }

    /// Flags for `(system, format)`.
    pub fn flags(&self, system: &SystemKey, format: OutputFormat) -> &[String] {
        self.rules
            .iter()
            .find(|r| r.system == system.as_str() && r.format == format)
            .map(|r| r.flags.as_slice())
            .unwrap_or(&[])
    }

    /// Build `[input, ...format flags, (-slim)]`.
    pub fn argv(&self, input_path: &str, options: &ConversionOptions) -> Vec<String> {
        let mut argv = vec![input_path.to_string()];
        argv.extend(
            self.flags(&options.system, options.output_format)
                .iter()
                .cloned(),
        );
        if options.slim {
            argv.push(SLIM_FLAG.to_string());
        }
        argv
    }
}

impl Default for InvocationTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(system: &str, format: OutputFormat, slim: bool) -> ConversionOptions {
        ConversionOptions::new(SystemKey::new(system).expect("key"), format).with_slim(slim)
    }

    #[test]
    fn test_directory_has_no_flags() {
        let table = InvocationTable::builtin();
        let argv = table.argv("/roms/sf2.zip", &options("cps1", OutputFormat::Directory, false));
        assert_eq!(argv, vec!["/roms/sf2.zip"]);
    }

    #[test]
    fn test_format_flags_then_slim() {
        let table = InvocationTable::builtin();
        let argv = table.argv("/roms/kof98.zip", &options("mvs", OutputFormat::Archive, true));
        assert_eq!(argv, vec!["/roms/kof98.zip", "-zip", "-slim"]);

        let argv = table.argv("/roms/sf2.zip", &options("cps1", OutputFormat::Raw, false));
        assert_eq!(argv, vec!["/roms/sf2.zip", "-raw"]);
    }
}
