//! Access and mime rules

use cachefront_core::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A forbidden rule as stored in the settings document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ForbiddenRecord {
    Extension(String),
    File(String),
    Directory(String),
    Regex(String),
}

/// Compiled forbidden rule, matched against the request path
#[derive(Debug, Clone)]
pub enum ForbiddenRule {
    /// Path ends in `.<ext>`
    FileExtension(String),
    /// Path equals the given absolute path
    AbsoluteFile(String),
    /// Path starts with the given prefix
    AbsoluteDirectoryPrefix(String),
    /// Path matches the expression anywhere
    Regex(Regex),
}

impl ForbiddenRule {
    /// Build a file extension rule, with or without the leading dot
    pub fn extension(ext: &str) -> Self {
        ForbiddenRule::FileExtension(ext.trim_start_matches('.').to_string())
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            ForbiddenRule::FileExtension(ext) => path
                .strip_suffix(ext.as_str())
                .is_some_and(|rest| rest.ends_with('.')),
            ForbiddenRule::AbsoluteFile(file) => path == file,
            ForbiddenRule::AbsoluteDirectoryPrefix(prefix) => path.starts_with(prefix.as_str()),
            ForbiddenRule::Regex(re) => re.is_match(path),
        }
    }
}

impl fmt::Display for ForbiddenRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForbiddenRule::FileExtension(ext) => write!(f, "files ending in .{}", ext),
            ForbiddenRule::AbsoluteFile(file) => write!(f, "the file {}", file),
            ForbiddenRule::AbsoluteDirectoryPrefix(prefix) => {
                write!(f, "everything below {}", prefix)
            }
            ForbiddenRule::Regex(re) => write!(f, "paths matching {}", re.as_str()),
        }
    }
}

impl TryFrom<&ForbiddenRecord> for ForbiddenRule {
    type Error = Error;

    fn try_from(record: &ForbiddenRecord) -> Result<Self> {
        Ok(match record {
            ForbiddenRecord::Extension(ext) => ForbiddenRule::extension(ext),
            ForbiddenRecord::File(file) => ForbiddenRule::AbsoluteFile(file.clone()),
            ForbiddenRecord::Directory(dir) => ForbiddenRule::AbsoluteDirectoryPrefix(dir.clone()),
            ForbiddenRecord::Regex(pattern) => ForbiddenRule::Regex(compile(pattern)?),
        })
    }
}

/// A mime rule as stored in the settings document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MimeRecord {
    /// Expression matched against the file extension
    pub pattern: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

impl MimeRecord {
    pub fn new(pattern: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            content_type: content_type.into(),
        }
    }
}

/// Compiled mime rule
#[derive(Debug, Clone)]
pub struct MimeRule {
    pub pattern: Regex,
    pub content_type: String,
}

impl TryFrom<&MimeRecord> for MimeRule {
    type Error = Error;

    fn try_from(record: &MimeRecord) -> Result<Self> {
        Ok(MimeRule {
            pattern: compile(&record.pattern)?,
            content_type: record.content_type.clone(),
        })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| Error::Settings(format!("invalid pattern {:?}: {}", pattern, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_rule() {
        let rule = ForbiddenRule::extension(".php");
        assert!(rule.matches("/secret/file.php"));
        assert!(rule.matches("/index.php"));
        assert!(!rule.matches("/index.phps"));
        assert!(!rule.matches("/php"));
        assert!(!rule.matches("/notphp"));
    }

    #[test]
    fn test_path_rules() {
        let file = ForbiddenRule::AbsoluteFile("/admin.html".into());
        assert!(file.matches("/admin.html"));
        assert!(!file.matches("/admin.html.bak"));

        let dir = ForbiddenRule::AbsoluteDirectoryPrefix("/secret".into());
        assert!(dir.matches("/secret/file.php"));
        assert!(dir.matches("/secret"));
        assert!(!dir.matches("/public/secret"));
    }

    #[test]
    fn test_records_compile() {
        let rule = ForbiddenRule::try_from(&ForbiddenRecord::Regex(r"\.git/".into())).unwrap();
        assert!(rule.matches("/repo/.git/config"));

        let bad = ForbiddenRule::try_from(&ForbiddenRecord::Regex("(".into()));
        assert!(matches!(bad, Err(Error::Settings(_))));

        let mime = MimeRule::try_from(&MimeRecord::new("^html?$", "text/html")).unwrap();
        assert!(mime.pattern.is_match("htm"));
        assert_eq!(mime.content_type, "text/html");
    }

    #[test]
    fn test_record_serde() {
        let record: ForbiddenRecord =
            toml::from_str("kind = \"directory\"\ndata = \"/private\"").unwrap();
        assert_eq!(record, ForbiddenRecord::Directory("/private".into()));

        let mime: MimeRecord = toml::from_str("pattern = \"css\"\ntype = \"text/css\"").unwrap();
        assert_eq!(mime, MimeRecord::new("css", "text/css"));
    }
}
