//! Artifact resolution.
//!
//! Which artifact a backend leaves behind depends only on the system, the
//! selected output format, and the game name. That mapping is a table:
//! supporting a new system or format means adding a row.

use romcnv_core::types::{ArtifactDescriptor, ArtifactKind, OutputFormat, SystemKey};

/// Placeholder substituted with the game name in path templates.
const GAME_PLACEHOLDER: &str = "{game}";

/// One `(system, format) → (path template, kind)` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRule {
    /// System key the row applies to.
    pub system: String,
    /// Output format the row applies to.
    pub format: OutputFormat,
    /// Sandbox path with a `{game}` placeholder.
    pub template: String,
    /// Shape of the artifact.
    pub kind: ArtifactKind,
}

impl ArtifactRule {
    /// Create a row.
    pub fn new(
        system: impl Into<String>,
        format: OutputFormat,
        template: impl Into<String>,
        kind: ArtifactKind,
    ) -> Self {
        Self {
            system: system.into(),
            format,
            template: template.into(),
            kind,
        }
    }

    /// Expand the template for a game.
    pub fn path_for(&self, game_name: &str) -> String {
        self.template.replace(GAME_PLACEHOLDER, game_name)
    }
}

/// Declarative artifact table.
#[derive(Debug, Clone)]
pub struct ArtifactTable {
    rules: Vec<ArtifactRule>,
}

impl ArtifactTable {
    /// An empty table.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The rows for the bundled converters.
    pub fn builtin() -> Self {
        use ArtifactKind::{Archive, Directory, RawBlob};
        use OutputFormat as F;

        Self::empty()
            .with_rule(ArtifactRule::new("cps1", F::Directory, "/cache/{game}_cache", Directory))
            .with_rule(ArtifactRule::new("cps1", F::Raw, "/cache/{game}.cache", RawBlob))
            .with_rule(ArtifactRule::new("cps2", F::Directory, "/cache/{game}_cache", Directory))
            .with_rule(ArtifactRule::new("cps2", F::Archive, "/cache/{game}_cache.zip", Archive))
            .with_rule(ArtifactRule::new("mvs", F::Directory, "/cache/{game}_cache", Directory))
            .with_rule(ArtifactRule::new("mvs", F::Archive, "/cache/{game}_cache.zip", Archive))
            .with_rule(ArtifactRule::new("mvs", F::Raw, "/cache/{game}.cache", RawBlob))
    }

    /// Add a row, replacing any existing row for the same key.
    pub fn with_rule(mut self, rule: ArtifactRule) -> Self {
        self.rules
            .retain(|r| !(r.system == rule.system && r.format == rule.format));
        self.rules.push(rule);
        self
    }

    /// Every row.
    pub fn rules(&self) -> &[ArtifactRule] {
        &self.rules
    }

    /// Row for `(system, format)`.
    pub fn rule(&self, system: &SystemKey, format: OutputFormat) -> Option<&ArtifactRule> {
        self.rules
            .iter()
            .find(|r| r.system == system.as_str() && r.format == format)
    }

    /// Formats offered for a system, in table order.
    pub fn formats(&self, system: &SystemKey) -> Vec<OutputFormat> {
        self.rules
            .iter()
            .filter(|r| r.system == system.as_str())
            .map(|r| r.format)
            .collect()
    }

    /// Expected artifact for a game.
    pub fn resolve(
        &self,
        system: &SystemKey,
        format: OutputFormat,
        game_name: &str,
    ) -> Option<ArtifactDescriptor> {
        self.rule(system, format).map(|rule| ArtifactDescriptor {
            game_name: game_name.to_string(),
            kind: rule.kind,
            path: rule.path_for(game_name),
        })
    }

    /// Every path a game could own on a system, whatever format produced
    /// it. These are purged before the game is converted again.
    pub fn reserved_paths(&self, system: &SystemKey, game_name: &str) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for rule in self.rules.iter().filter(|r| r.system == system.as_str()) {
            let path = rule.path_for(game_name);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }
}

impl Default for ArtifactTable {
    fn default() -> Self {
        Self::builtin()
    }
}
