use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::store::{DB_FILE_NAME, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Changing this wipes the recorded data on the next session start.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            schema_version: default_schema_version(),
        }
    }
}

fn default_path() -> PathBuf {
    PathBuf::from(DB_FILE_NAME)
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Minimum interval requested between position fixes.
    #[serde(default = "default_sampling_interval_ms")]
    pub sampling_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sampling_interval_ms: default_sampling_interval_ms(),
        }
    }
}

fn default_sampling_interval_ms() -> u64 {
    500
}

impl SessionConfig {
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Reads `path` if given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}
