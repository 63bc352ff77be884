//! Configuration type definitions
//!
//! These types represent the process configuration for Cachefront. Runtime
//! tunables (compression thresholds, forbidden rules, ...) are not part of
//! it; they live in the settings store and refresh independently.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for Cachefront
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachefrontConfig {
    /// Debug mode
    #[serde(default)]
    pub debug: bool,

    /// Address the content server listens on
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Directory loaded into the content cache
    #[serde(default = "default_sites_dir")]
    pub sites_dir: PathBuf,

    /// TOML document backing the runtime settings.
    /// Without one every setting keeps its built-in default.
    #[serde(default)]
    pub settings_file: Option<PathBuf>,

    /// How eagerly runtime settings are refreshed
    #[serde(default)]
    pub refresh: RefreshProfile,

    /// Admin API configuration
    #[serde(default)]
    pub admin: Option<AdminConfig>,

    /// Global logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for CachefrontConfig {
    fn default() -> Self {
        Self {
            debug: false,
            listen: default_listen(),
            sites_dir: default_sites_dir(),
            settings_file: None,
            refresh: RefreshProfile::default(),
            admin: None,
            logging: LoggingConfig::default(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_sites_dir() -> PathBuf {
    PathBuf::from("./site")
}

/// Refresh profile for runtime settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefreshProfile {
    /// Per-setting policies tuned for serving
    #[default]
    Standard,
    /// Reload every setting on every access (development)
    Eager,
}

/// Admin API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Listen address
    pub listen: String,

    /// Enable admin API
    #[serde(default = "default_admin_enabled")]
    pub enabled: bool,
}

fn default_admin_enabled() -> bool {
    true
}

/// Global logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}
