//! Configuration file model and loading
//!
//! The TOML file is the lowest-priority explicit configuration source.
//! Services layer command-line arguments and environment variables on top.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Socket address the HTTP service binds to (e.g. "127.0.0.1:5780")
    #[serde(default)]
    pub bind_address: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub extraction: ExtractionSection,
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing level when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[extraction]` section: image extraction collaborator settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSection {
    /// URL of the inference proxy accepting `{prompt, mimeType, imageBase64}`
    pub endpoint: Option<String>,
    /// Per-request transport timeout
    pub timeout_secs: Option<u64>,
    /// Total attempts including the first one
    pub max_attempts: Option<u32>,
    /// Delay before the first retry; doubles on every further retry
    pub base_delay_ms: Option<u64>,
}

/// Get default configuration file path for the platform
///
/// On Linux the per-user file (`~/.config/storerep/config.toml`) wins over
/// the system-wide one (`/etc/storerep/config.toml`) when both exist.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("storerep").join("config.toml"));

    if cfg!(target_os = "linux") {
        if let Some(path) = &user_config {
            if path.exists() {
                return user_config;
            }
        }
        let system_config = PathBuf::from("/etc/storerep/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    user_config
}

/// Load a TOML config file
///
/// A missing file yields the default configuration; an unreadable or
/// unparsable file is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        debug!("Config file not found, using defaults: {}", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve the config file location and load it
///
/// **Priority:** explicit path (command line / environment) → platform default.
pub fn load_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    match explicit_path {
        Some(path) => load_toml_config(path),
        None => match default_config_path() {
            Some(path) => load_toml_config(&path),
            None => Ok(TomlConfig::default()),
        },
    }
}
