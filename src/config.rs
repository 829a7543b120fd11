//! Configuration for the idlink command-line front end.
//!
//! Configuration is loaded with precedence: CLI args > Env vars > Config file > Defaults
//!
//! # Example config file (idlink.toml)
//! ```toml
//! pretty = true
//!
//! [io]
//! input = "requests.jsonl"
//! seed = "contacts.json"
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Main configuration for the idlink CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Pretty-print consolidated output
    pub pretty: bool,
    /// Input/output locations
    pub io: IoConfig,
}

impl LinkConfig {
    /// Load configuration with precedence: CLI args > Env > File > Defaults
    pub fn load(config_path: Option<&str>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(LinkConfig::default()));

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("IDLINK_").split("_"));
        figment = figment.merge(Serialized::defaults(overrides));

        figment.extract().map_err(ConfigError::from)
    }

    /// Load from environment and optional config file only (no CLI overrides)
    pub fn from_env(config_path: Option<&str>) -> Result<Self, ConfigError> {
        Self::load(config_path, ConfigOverrides::default())
    }
}

/// Input and output locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Path to a JSON-lines file of identify requests (stdin when absent)
    pub input: Option<PathBuf>,
    /// Path to a JSON array of contacts used to seed the store
    pub seed: Option<PathBuf>,
}

/// CLI overrides that take precedence over file and env config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretty: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io: Option<IoOverrides>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IoOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<PathBuf>,
}

/// Configuration error.
#[derive(Debug, Error)]
#[error("configuration error: {message}")]
pub struct ConfigError {
    pub message: String,
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LinkConfig::default();
        assert!(!config.pretty);
        assert!(config.io.input.is_none());
        assert!(config.io.seed.is_none());
    }

    #[test]
    fn test_cli_overrides_win() {
        let overrides = ConfigOverrides {
            pretty: Some(true),
            io: Some(IoOverrides {
                input: Some(PathBuf::from("requests.jsonl")),
                seed: None,
            }),
        };
        let config = LinkConfig::load(None, overrides).unwrap();
        assert!(config.pretty);
        assert_eq!(config.io.input, Some(PathBuf::from("requests.jsonl")));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError {
            message: "missing field".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: missing field");
    }
}
