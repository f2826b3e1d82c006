//! Application configuration
//!
//! Loaded from, in increasing precedence:
//! 1. Default values
//! 2. Config file (`~/.config/booker/config.yml`, or `BOOKER_CONFIG`)
//! 3. Environment variables (`BOOKER_DATA_DIR`)

use crate::filter::SortSpec;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const ENV_PREFIX: &str = "BOOKER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the collection and credential files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Sort applied when `list` is run without `--sort`
    #[serde(default)]
    pub default_sort: SortSpec,

    /// Log level for stderr output (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_sort: SortSpec::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load from `path`; a missing file means defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content =
                std::fs::read_to_string(path).with_context(|| format!("Failed to read config file: {:?}", path))?;
            Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            debug!(path = ?path, "No config file, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse YAML content; an empty document yields defaults
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("Invalid config YAML")
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            if !val.is_empty() {
                self.data_dir = PathBuf::from(val);
            }
        }
    }

    /// Config file location, overridable with `BOOKER_CONFIG`
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("booker")
            .join("config.yml")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("booker")
}

fn default_log_level() -> String {
    "warn".to_string()
}
