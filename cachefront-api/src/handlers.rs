//! API request handlers

use cachefront_core::{Error, Result};
use cachefront_static::{BuildSummary, ContentCache};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    ready: bool,
    files_in_progress: u64,
    last_build: Option<BuildSummary>,
}

/// Handle GET /health
pub fn health(cache: &ContentCache) -> Result<String> {
    let ready = cache.is_ready();
    let health = Health {
        status: if ready { "ready" } else { "loading" },
        ready,
        files_in_progress: cache.files_in_progress(),
        last_build: cache.last_build(),
    };
    serde_json::to_string_pretty(&health).map_err(|e| Error::Internal(e.to_string()))
}

/// Handle POST /reload
pub async fn reload(cache: &ContentCache) -> Result<String> {
    let summary = cache.rebuild().await;
    serde_json::to_string_pretty(&summary).map_err(|e| Error::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachefront_settings::{MemoryStore, SettingsRegistry};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_health_and_reload() {
        let site = tempfile::tempdir().unwrap();
        std::fs::write(site.path().join("index.html"), "hi").unwrap();
        let settings = SettingsRegistry::new(Arc::new(MemoryStore::default()));
        let cache = ContentCache::new(site.path(), Arc::new(settings));

        let before: serde_json::Value = serde_json::from_str(&health(&cache).unwrap()).unwrap();
        assert_eq!(before["status"], "loading");
        assert_eq!(before["ready"], false);
        assert!(before["last_build"].is_null());

        let summary: serde_json::Value = serde_json::from_str(&reload(&cache).await.unwrap()).unwrap();
        assert_eq!(summary["files"], 1);

        let after: serde_json::Value = serde_json::from_str(&health(&cache).unwrap()).unwrap();
        assert_eq!(after["ready"], true);
        assert_eq!(after["last_build"]["bytes"], 2);
    }
}
