//! Graph configuration
//!
//! Loaded from YAML or JSON; every field is optional and falls back to the
//! default.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("YAML config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON config error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Behavior switches for a `Graph`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Reject nodes whose type is not in the schema
    pub strict_types: bool,
    /// Record applied operations into the chronicle from the start
    pub recording: bool,
    /// Write defaults back into nodes when reading absent values
    pub default_on_read: bool,
    /// Build schema-declared indexes when the graph is constructed
    pub index_on_construct: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            strict_types: true,
            recording: false,
            default_on_read: true,
            index_on_construct: true,
        }
    }
}

impl GraphConfig {
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_strict_types(mut self, strict: bool) -> Self {
        self.strict_types = strict;
        self
    }

    pub fn with_recording(mut self, recording: bool) -> Self {
        self.recording = recording;
        self
    }

    pub fn with_default_on_read(mut self, enabled: bool) -> Self {
        self.default_on_read = enabled;
        self
    }

    pub fn with_index_on_construct(mut self, enabled: bool) -> Self {
        self.index_on_construct = enabled;
        self
    }
}
