//! Mapper configuration
//!
//! Loaded from a JSON file or built from defaults. Unknown keys are rejected.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Materialization and mapper settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapperConfig {
    /// Check input values against their column formats (default: true)
    #[serde(default = "default_validate_formats")]
    pub validate_formats: bool,

    /// Maximum entity nesting depth (default: 32)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Log rejected mapper operations (default: true)
    #[serde(default = "default_log_rejections")]
    pub log_rejections: bool,
}

fn default_validate_formats() -> bool {
    true
}

fn default_max_depth() -> usize {
    32
}

fn default_log_rejections() -> bool {
    true
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            validate_formats: default_validate_formats(),
            max_depth: default_max_depth(),
            log_rejections: default_log_rejections(),
        }
    }
}

impl MapperConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&content)?;
        let path = path.display().to_string();
        log_event_with_fields(Event::ConfigLoaded, &[("path", path.as_str())]);
        Ok(config)
    }

    /// Parse configuration from JSON text
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: MapperConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be > 0".into()));
        }
        Ok(())
    }

    /// Config with format validation disabled
    pub fn without_validation() -> Self {
        Self {
            validate_formats: false,
            ..Self::default()
        }
    }

    /// Config with a custom depth limit
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = MapperConfig::default();
        assert!(config.validate_formats);
        assert_eq!(config.max_depth, 32);
        assert!(config.log_rejections);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = MapperConfig::from_json(r#"{"max_depth": 4}"#).unwrap();
        assert_eq!(config.max_depth, 4);
        assert!(config.validate_formats);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let err = MapperConfig::from_json(r#"{"max_depth": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = MapperConfig::from_json(r#"{"strict": true}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"validate_formats": false, "log_rejections": false}}"#).unwrap();

        let config = MapperConfig::load(file.path()).unwrap();
        assert!(!config.validate_formats);
        assert!(!config.log_rejections);
        assert_eq!(config.max_depth, 32);
    }

    #[test]
    fn test_missing_file() {
        let err = MapperConfig::load(Path::new("/nonexistent/aeromap.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/aeromap.json"));
    }
}
