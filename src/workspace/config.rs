//! Settings file parsing (config.toml in the data directory)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STORE_DIR_NAME: &str = "store";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Cannot determine a data directory")]
    NoDataDir,
}

/// Settings from config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub probe: ProbeConfig,
}

/// Source-control probe settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeConfig {
    #[serde(default = "default_git_binary")]
    pub git_binary: String,
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            git_binary: default_git_binary(),
            shell: default_shell(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_git_binary() -> String {
    "git".to_string()
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    /// Default data directory, `<config dir>/workspace-projects`
    pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("workspace-projects"))
            .ok_or(ConfigError::NoDataDir)
    }

    /// Load settings from a data directory; a missing file means defaults
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = data_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Directory holding the key-value records
    pub fn store_dir(data_dir: &Path) -> PathBuf {
        data_dir.join(STORE_DIR_NAME)
    }
}
