//! Configuration loader

use crate::config::{AdminConfig, CachefrontConfig};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Setter applied when an environment variable is present
type EnvSetter = fn(&mut CachefrontConfig, &str) -> Result<()>;

/// Environment overrides, applied in order after the file is parsed
const ENV_OVERRIDES: &[(&str, EnvSetter)] = &[
    ("CACHEFRONT_LISTEN", |c, v| {
        c.listen = v.to_string();
        Ok(())
    }),
    ("CACHEFRONT_SITES_DIR", |c, v| {
        c.sites_dir = PathBuf::from(v);
        Ok(())
    }),
    ("CACHEFRONT_SETTINGS_FILE", |c, v| {
        c.settings_file = Some(PathBuf::from(v));
        Ok(())
    }),
    ("CACHEFRONT_ADMIN_LISTEN", |c, v| {
        c.admin = Some(AdminConfig {
            listen: v.to_string(),
            enabled: true,
        });
        Ok(())
    }),
    ("CACHEFRONT_LOG_LEVEL", |c, v| {
        c.logging.level = v.to_string();
        Ok(())
    }),
    ("CACHEFRONT_LOG_FORMAT", |c, v| {
        c.logging.format = v.parse().map_err(Error::Config)?;
        Ok(())
    }),
];

/// Configuration loader for various formats
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file and overlay the process environment
    pub fn load<P: AsRef<Path>>(path: P) -> Result<CachefrontConfig> {
        let mut config = Self::load_file(path)?;
        Self::apply_env(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a file without looking at the environment
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<CachefrontConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext {
            "json" => Self::from_json(&content),
            "toml" | "" => Self::from_toml(&content),
            _ => Err(Error::Config(format!("Unknown config format: {}", ext))),
        }
    }

    /// Parse JSON configuration
    pub fn from_json(content: &str) -> Result<CachefrontConfig> {
        serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid JSON: {}", e)))
    }

    /// Parse TOML configuration
    pub fn from_toml(content: &str) -> Result<CachefrontConfig> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Apply environment overrides using `lookup` to read variables
    pub fn apply_env<F>(config: &mut CachefrontConfig, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (key, setter) in ENV_OVERRIDES {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                tracing::debug!("Config override from {}", key);
                setter(config, &value)?;
            }
        }
        Ok(())
    }
}
