//! Engine Configuration
//!
//! Tunables shared by class composition and the validation cascade.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Configuration for the class registry and validation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Abort validation on the first failure (default: true)
    #[serde(default = "default_stop_on_first_error")]
    pub stop_on_first_error: bool,

    /// Deepest nested sub-document the validation cascade will enter (default: 32)
    #[serde(default = "default_max_validation_depth")]
    pub max_validation_depth: usize,

    /// Longest parent chain a class may have (default: 16)
    #[serde(default = "default_max_inheritance_depth")]
    pub max_inheritance_depth: usize,
}

fn default_stop_on_first_error() -> bool {
    true
}

fn default_max_validation_depth() -> usize {
    32
}

fn default_max_inheritance_depth() -> usize {
    16
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stop_on_first_error: default_stop_on_first_error(),
            max_validation_depth: default_max_validation_depth(),
            max_inheritance_depth: default_max_inheritance_depth(),
        }
    }
}

impl EngineConfig {
    /// Create config that collects every failure instead of stopping at the first
    pub fn collecting() -> Self {
        Self {
            stop_on_first_error: false,
            ..Self::default()
        }
    }

    /// Load config from a JSON file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&content).map_err(|e| match e {
            ConfigError::Parse { reason, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    /// Parse config from a JSON string.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse {
                path: "<inline>".into(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_validation_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_validation_depth must be at least 1".into(),
            ));
        }
        if self.max_inheritance_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_inheritance_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config '{path}': {reason}")]
    Read { path: String, reason: String },

    /// Config file is not valid JSON for `EngineConfig`
    #[error("Invalid config '{path}': {reason}")]
    Parse { path: String, reason: String },

    /// Config values out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}
