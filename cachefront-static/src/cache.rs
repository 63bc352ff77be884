//! Atomically swappable content cache

use crate::build::{self, BuildStats, BuildSummary};
use crate::tree::Dir;
use arc_swap::ArcSwapOption;
use cachefront_settings::SettingsRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// In-memory copy of the site directory.
///
/// The cache is empty until the first build completes. Rebuilds happen off
/// to the side and replace the whole tree in one swap, so readers holding a
/// [`snapshot`](ContentCache::snapshot) keep a consistent view.
pub struct ContentCache {
    sites_dir: PathBuf,
    settings: Arc<SettingsRegistry>,
    root: ArcSwapOption<Dir>,
    last_build: ArcSwapOption<BuildSummary>,
    /// Counters of the build in progress, if any
    progress: ArcSwapOption<BuildStats>,
    rebuild_lock: Mutex<()>,
}

impl ContentCache {
    pub fn new(sites_dir: impl Into<PathBuf>, settings: Arc<SettingsRegistry>) -> Self {
        Self {
            sites_dir: sites_dir.into(),
            settings,
            root: ArcSwapOption::empty(),
            last_build: ArcSwapOption::empty(),
            progress: ArcSwapOption::empty(),
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn sites_dir(&self) -> &Path {
        &self.sites_dir
    }

    pub fn settings(&self) -> &Arc<SettingsRegistry> {
        &self.settings
    }

    /// Whether a build has completed
    pub fn is_ready(&self) -> bool {
        self.root.load().is_some()
    }

    /// Current tree, `None` before the first build completes
    pub fn snapshot(&self) -> Option<Arc<Dir>> {
        self.root.load_full()
    }

    /// Summary of the most recent completed build
    pub fn last_build(&self) -> Option<BuildSummary> {
        self.last_build.load_full().map(|summary| *summary)
    }

    /// Files loaded so far by the running build
    pub fn files_in_progress(&self) -> u64 {
        self.progress.load_full().map_or(0, |stats| stats.files())
    }

    /// Replace the tree with one built elsewhere
    pub fn install(&self, dir: Dir) {
        self.root.store(Some(Arc::new(dir)));
    }

    /// Build a fresh tree from the site directory and swap it in.
    ///
    /// Concurrent calls are serialized; each one performs its own build.
    pub async fn rebuild(&self) -> BuildSummary {
        let _guard = self.rebuild_lock.lock().await;
        let started = Instant::now();
        let stats = Arc::new(BuildStats::default());
        self.progress.store(Some(Arc::clone(&stats)));

        tracing::info!("Loading content from {}", self.sites_dir.display());
        let dir = build::build(&self.sites_dir, Arc::clone(&self.settings), Arc::clone(&stats)).await;

        let summary = stats.summary(started.elapsed());
        self.root.store(Some(Arc::new(dir)));
        self.last_build.store(Some(Arc::new(summary)));
        self.progress.store(None);

        tracing::info!(
            "Content loaded: {} files in {} directories, {} bytes, {} variants, {} failures ({} ms)",
            summary.files,
            summary.directories,
            summary.bytes,
            summary.variants,
            summary.failures,
            summary.duration_ms
        );
        summary
    }
}
