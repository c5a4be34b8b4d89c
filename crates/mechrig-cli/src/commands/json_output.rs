//! JSON output types for the `--json` flag.
//!
//! Every command prints one [`JsonOutput`] envelope so tools can parse the
//! result without scraping colored text.

use mechrig_core::{Issue, RigError};
use serde::{Deserialize, Serialize};

/// Error codes for failures outside the rig pipeline.
pub mod error_codes {
    /// Document could not be read or parsed
    pub const DOCUMENT_READ: &str = "CLI_001";
    /// Actions file could not be read or parsed
    pub const ACTIONS_READ: &str = "CLI_002";
    /// Export file could not be written
    pub const EXPORT_WRITE: &str = "CLI_003";
}

/// A structured error in JSON output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonError {
    /// Stable code ("RIG_004", "CLI_001", ...)
    pub code: String,
    pub message: String,
}

impl JsonError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&RigError> for JsonError {
    fn from(err: &RigError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

/// Envelope printed by every command in JSON mode.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T> {
    pub success: bool,
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<JsonError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn success(command: &str, result: T) -> Self {
        Self {
            success: true,
            command: command.to_string(),
            errors: Vec::new(),
            issues: Vec::new(),
            result: Some(result),
        }
    }

    pub fn failure(command: &str, errors: Vec<JsonError>) -> Self {
        Self {
            success: false,
            command: command.to_string(),
            errors,
            issues: Vec::new(),
            result: None,
        }
    }

    pub fn with_issues(mut self, issues: Vec<Issue>) -> Self {
        self.issues = issues;
        self
    }

    /// Prints the envelope to stdout.
    pub fn print(&self) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(self)?);
        Ok(())
    }
}

/// Result of `validate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResult {
    pub blocking: usize,
    pub total: usize,
}

/// Result of `build`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BuildResult {
    pub bones: usize,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub duplicates: usize,
    pub hinges: Vec<String>,
    pub piston_links: Vec<String>,
    pub ik_chains: Vec<String>,
    pub failures: Vec<JsonError>,
    pub fingerprint: String,
}

/// Result of `controls`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ControlsResult {
    pub proxies: usize,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Result of `bake`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BakeSummary {
    pub vertices: usize,
    pub triangles: usize,
    pub bones: usize,
    pub actions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_envelope_skips_result() {
        let output: JsonOutput<ValidateResult> =
            JsonOutput::failure("validate", vec![JsonError::new("CLI_001", "missing")]);
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["errors"][0]["code"], "CLI_001");
        assert!(json.get("result").is_none());
        assert!(json.get("issues").is_none());
    }

    #[test]
    fn test_rig_error_keeps_code() {
        let err = RigError::NoSkeleton;
        let json = JsonError::from(&err);
        assert_eq!(json.code, "RIG_010");
    }
}
