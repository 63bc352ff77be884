//! Settings stores
//!
//! A store answers the three questions the registry asks: a scalar value by
//! name, the mime table and the forbidden table. Stores are read on every
//! reload, so a store must reflect edits made after construction.

use crate::rules::{ForbiddenRecord, MimeRecord};
use cachefront_core::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Backing store for runtime settings
pub trait SettingsStore: Send + Sync {
    /// Raw text of a scalar setting
    fn value(&self, name: &str) -> Result<String>;

    /// Mime table in match order
    fn mimetypes(&self) -> Result<Vec<MimeRecord>>;

    /// Forbidden table in match order
    fn forbidden(&self) -> Result<Vec<ForbiddenRecord>>;
}

/// Scalar value in a settings document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{}", b),
            SettingValue::Integer(i) => write!(f, "{}", i),
            SettingValue::Float(x) => write!(f, "{}", x),
            SettingValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Integer(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Float(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

/// Whole settings document.
///
/// ```toml
/// [values]
/// server_off = false
/// gzip_min_size = 1400
///
/// [[mime]]
/// pattern = "^html?$"
/// type = "text/html; charset=utf-8"
///
/// [[forbidden]]
/// kind = "extension"
/// data = "php"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsDocument {
    #[serde(default)]
    pub values: BTreeMap<String, SettingValue>,

    #[serde(default)]
    pub mime: Vec<MimeRecord>,

    #[serde(default)]
    pub forbidden: Vec<ForbiddenRecord>,
}

impl SettingsDocument {
    /// Parse a TOML settings document
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Settings(format!("Invalid settings document: {}", e)))
    }

    /// Document with no scalar values and a mime table for common web files
    pub fn starter() -> Self {
        const MIME: &[(&str, &str)] = &[
            ("^html?$", "text/html; charset=utf-8"),
            ("^css$", "text/css; charset=utf-8"),
            ("^m?js$", "text/javascript; charset=utf-8"),
            ("^json$", "application/json"),
            ("^xml$", "application/xml"),
            ("^txt$", "text/plain; charset=utf-8"),
            ("^svg$", "image/svg+xml"),
            ("^png$", "image/png"),
            ("^jpe?g$", "image/jpeg"),
            ("^gif$", "image/gif"),
            ("^webp$", "image/webp"),
            ("^ico$", "image/x-icon"),
            ("^pdf$", "application/pdf"),
            ("^wasm$", "application/wasm"),
            ("^woff2$", "font/woff2"),
        ];

        Self {
            values: BTreeMap::new(),
            mime: MIME
                .iter()
                .map(|(pattern, content_type)| MimeRecord::new(*pattern, *content_type))
                .collect(),
            forbidden: Vec::new(),
        }
    }

    fn value(&self, name: &str) -> Result<String> {
        self.values
            .get(name)
            .map(ToString::to_string)
            .ok_or_else(|| Error::Settings(format!("No value stored for {}", name)))
    }
}

/// Store backed by a TOML file that is re-read on every call
#[derive(Debug, Clone)]
pub struct TomlFileStore {
    path: PathBuf,
}

impl TomlFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read and parse the file
    pub fn document(&self) -> Result<SettingsDocument> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Settings(format!(
                "Failed to read settings file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        SettingsDocument::from_toml(&content)
    }
}

impl SettingsStore for TomlFileStore {
    fn value(&self, name: &str) -> Result<String> {
        self.document()?.value(name)
    }

    fn mimetypes(&self) -> Result<Vec<MimeRecord>> {
        Ok(self.document()?.mime)
    }

    fn forbidden(&self) -> Result<Vec<ForbiddenRecord>> {
        Ok(self.document()?.forbidden)
    }
}

/// In-process store, editable at runtime
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: RwLock<SettingsDocument>,
}

impl MemoryStore {
    pub fn new(document: SettingsDocument) -> Self {
        Self {
            document: RwLock::new(document),
        }
    }

    pub fn set_value(&self, name: &str, value: impl Into<SettingValue>) {
        self.document
            .write()
            .values
            .insert(name.to_string(), value.into());
    }

    pub fn remove_value(&self, name: &str) {
        self.document.write().values.remove(name);
    }

    pub fn set_mimetypes(&self, mime: Vec<MimeRecord>) {
        self.document.write().mime = mime;
    }

    pub fn set_forbidden(&self, forbidden: Vec<ForbiddenRecord>) {
        self.document.write().forbidden = forbidden;
    }
}

impl SettingsStore for MemoryStore {
    fn value(&self, name: &str) -> Result<String> {
        self.document.read().value(name)
    }

    fn mimetypes(&self) -> Result<Vec<MimeRecord>> {
        Ok(self.document.read().mime.clone())
    }

    fn forbidden(&self) -> Result<Vec<ForbiddenRecord>> {
        Ok(self.document.read().forbidden.clone())
    }
}
