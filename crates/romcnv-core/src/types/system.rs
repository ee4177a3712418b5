//! Target system identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Normalised key of a target system (`mvs`, `cps1`, `cps2`, ...).
///
/// Keys are trimmed and lowercased on construction so `"MVS"` and `"mvs"`
/// address the same backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SystemKey(String);

impl SystemKey {
    /// Create a key, rejecting empty or non-alphanumeric names.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, AppError> {
        let normalised = raw.as_ref().trim().to_ascii_lowercase();
        if normalised.is_empty() {
            return Err(AppError::validation("System key must not be empty"));
        }
        if !normalised
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AppError::validation(format!(
                "Invalid system key '{normalised}'"
            )));
        }
        Ok(Self(normalised))
    }

    /// The normalised key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Uppercase label used in log lines (`MVS`).
    pub fn label(&self) -> String {
        self.0.to_ascii_uppercase()
    }
}

impl fmt::Display for SystemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SystemKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SystemKey {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SystemKey> for String {
    fn from(key: SystemKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_normalised() {
        let key = SystemKey::new("  MVS ").expect("valid key");
        assert_eq!(key.as_str(), "mvs");
        assert_eq!(key.label(), "MVS");
    }

    #[test]
    fn test_key_rejects_garbage() {
        assert!(SystemKey::new("").is_err());
        assert!(SystemKey::new("../mvs").is_err());
    }

    #[test]
    fn test_key_deserializes_from_string() {
        let key: SystemKey = serde_json::from_str("\"Cps2\"").expect("deserialize");
        assert_eq!(key.as_str(), "cps2");
        assert!(serde_json::from_str::<SystemKey>("\"\"").is_err());
    }
}
