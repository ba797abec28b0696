//! Configuration handling for bits
//!
//! Configuration is global only and lives in `config.toml` under the
//! platform config directory (`~/.config/bits/config.toml` on Linux).
//! Every field is optional.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Base directory name under the home directory when `data_dir` is unset
const DEFAULT_DATA_DIR: &str = ".bits";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Output format preference
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Output format used when `--format` is not given
    pub default_format: Option<OutputFormat>,

    /// Priority for `bits add` when `--priority` is not given
    pub default_priority: Option<String>,

    /// Directory holding one store per project (default `~/.bits`)
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "bits", "bits").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads configuration from the global config file, if any
    pub fn load() -> Result<Self> {
        match Self::global_config_dir() {
            Some(dir) => Self::load_from(&dir.join("config.toml")),
            None => Ok(Self::default()),
        }
    }

    /// Loads configuration from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Returns the configured default priority, falling back to `medium`
    pub fn default_priority(&self) -> &str {
        self.default_priority.as_deref().unwrap_or("medium")
    }

    /// Returns the base directory for per-project stores
    ///
    /// `None` only when no `data_dir` is configured and the home directory
    /// cannot be determined.
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| BaseDirs::new().map(|dirs| dirs.home_dir().join(DEFAULT_DATA_DIR)))
    }
}
