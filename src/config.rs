//! Engine and store configuration.
//!
//! Every field has a default, so a partial JSON file (or none at all) is a
//! valid configuration.

use crate::error::{ExpungeError, ExpungeResult};
use crate::search::MatchOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_LABEL: &str = "CONFIDENTIAL";

/// Settings read by the search and redaction engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub matching: MatchOptions,
    /// Margin added around each redaction rectangle, in points.
    pub padding: f64,
    /// Text stamped on the largest rectangle of each match; `None` disables it.
    pub label: Option<String>,
    /// RGB components in `0.0..=1.0`.
    pub fill_color: [f64; 3],
    pub label_color: [f64; 3],
    /// Labels that would render smaller than this are omitted.
    pub min_label_size: f64,
    /// Re-extract the output and fail if the query still occurs.
    pub verify: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            matching: MatchOptions::default(),
            padding: 1.5,
            label: Some(DEFAULT_LABEL.to_string()),
            fill_color: [0.0, 0.0, 0.0],
            label_color: [1.0, 1.0, 1.0],
            min_label_size: 3.0,
            verify: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> ExpungeResult<()> {
        if !self.padding.is_finite() || self.padding < 0.0 {
            return Err(config_error("padding must be a non-negative number"));
        }
        if !self.min_label_size.is_finite() || self.min_label_size <= 0.0 {
            return Err(config_error("minLabelSize must be positive"));
        }
        for (name, color) in [("fillColor", self.fill_color), ("labelColor", self.label_color)] {
            if color.iter().any(|c| !(0.0..=1.0).contains(c)) {
                return Err(config_error(format!("{} components must lie in 0..1", name)));
            }
        }
        if let Some(label) = &self.label {
            // the label is drawn with a WinAnsi Helvetica
            if label.is_empty() || !label.chars().all(|c| (' '..='~').contains(&c)) {
                return Err(config_error("label must be non-empty printable ASCII"));
            }
        }
        Ok(())
    }

    /// Label text, if labels are enabled.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// Settings for the local directory store used by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    pub root: PathBuf,
    /// Prefix for public URLs; without it documents have no public URL.
    pub public_base_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("documents"),
            public_base_url: None,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: &Path) -> ExpungeResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| ExpungeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> ExpungeResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| config_error(format!("invalid JSON: {}", e)))?;
        config.engine.validate()?;
        Ok(config)
    }
}

fn config_error(reason: impl Into<String>) -> ExpungeError {
    ExpungeError::Config {
        reason: reason.into(),
    }
}
