//! Allow-list policy model
//!
//! The declarative shape of the filter configuration, as read from a JSON or
//! YAML policy file:
//!
//! ```yaml
//! allowedBrowsers:
//!   - name: Chrome
//!     pattern: "Chrome/12[0-1].*"
//!   - name: Firefox
//!     versionThreshold: ">122"
//! allowedOSTypes:
//!   - Android
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// One allow-list entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserRule {
    /// Browser name as it appears in the User-Agent (e.g. "Firefox")
    pub name: String,
    /// Explicit regex matched unanchored against the raw User-Agent
    #[serde(default, alias = "regex", skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// `">122"` for a strictly-newer check, `"121"` for an exact-prefix match
    #[serde(default, alias = "version", skip_serializing_if = "Option::is_none")]
    pub version_threshold: Option<String>,
}

impl BrowserRule {
    pub fn with_pattern(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: Some(pattern.into()),
            version_threshold: None,
        }
    }

    pub fn with_version(name: impl Into<String>, threshold: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: None,
            version_threshold: Some(threshold.into()),
        }
    }

    /// Explicit pattern, if set and non-empty
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref().filter(|p| !p.is_empty())
    }

    /// Version threshold, if set and non-empty
    pub fn version_threshold(&self) -> Option<&str> {
        self.version_threshold.as_deref().filter(|v| !v.is_empty())
    }
}

/// Complete filter configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    #[serde(default)]
    pub allowed_browsers: Vec<BrowserRule>,
    #[serde(default, rename = "allowedOSTypes")]
    pub allowed_os_types: Vec<String>,
}

impl PolicyConfig {
    pub fn new(allowed_browsers: Vec<BrowserRule>, allowed_os_types: Vec<String>) -> Self {
        Self {
            allowed_browsers,
            allowed_os_types,
        }
    }

    pub fn from_json_str(raw: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn from_yaml_str(raw: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// Load a policy file, picking the format from the extension
    ///
    /// `.yaml` / `.yml` are parsed as YAML, everything else as JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let policy_error = |reason: String| GateError::PolicyFile {
            path: path.to_path_buf(),
            reason,
        };

        let raw = fs::read_to_string(path).map_err(|e| policy_error(e.to_string()))?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        if is_yaml {
            Self::from_yaml_str(&raw).map_err(|e| policy_error(e.to_string()))
        } else {
            Self::from_json_str(&raw).map_err(|e| policy_error(e.to_string()))
        }
    }
}
