//! Concurrent build of the content tree from the filesystem

use crate::compress;
use crate::mime;
use crate::tree::{Dir, FileEntry};
use async_recursion::async_recursion;
use bytes::Bytes;
use cachefront_core::Encoding;
use cachefront_settings::{CompressionKnobs, SettingsRegistry};
use serde::Serialize;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinSet;

/// Counters updated while a build runs
#[derive(Debug, Default)]
pub struct BuildStats {
    files: AtomicU64,
    directories: AtomicU64,
    bytes: AtomicU64,
    variants: AtomicU64,
    failures: AtomicU64,
}

impl BuildStats {
    pub fn files(&self) -> u64 {
        self.files.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Freeze the counters into a summary
    pub fn summary(&self, elapsed: Duration) -> BuildSummary {
        BuildSummary {
            files: self.files.load(Ordering::Relaxed),
            directories: self.directories.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            variants: self.variants.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Totals of a finished build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub files: u64,
    pub directories: u64,
    /// Raw bytes held in memory
    pub bytes: u64,
    /// Compressed variants retained
    pub variants: u64,
    pub failures: u64,
    pub duration_ms: u64,
}

struct BuildContext {
    settings: Arc<SettingsRegistry>,
    stats: Arc<BuildStats>,
}

enum Child {
    File(FileEntry),
    Dir(Dir),
}

/// Build the tree below `root`.
///
/// Entries that cannot be read are logged and left out; an unreadable root
/// yields an empty tree.
pub async fn build(root: &Path, settings: Arc<SettingsRegistry>, stats: Arc<BuildStats>) -> Dir {
    let ctx = Arc::new(BuildContext { settings, stats });

    match build_dir(Arc::clone(&ctx), root.to_path_buf()).await {
        Ok(dir) => dir,
        Err(e) => {
            tracing::error!("Failed to read site root {}: {}", root.display(), e);
            ctx.stats.record_failure();
            Dir::default()
        }
    }
}

#[async_recursion]
async fn build_dir(ctx: Arc<BuildContext>, path: PathBuf) -> io::Result<Dir> {
    let mut entries = tokio::fs::read_dir(&path).await?;
    let mut tasks = JoinSet::new();

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Failed to list {}: {}", path.display(), e);
                ctx.stats.record_failure();
                break;
            }
        };
        tasks.spawn(build_child(Arc::clone(&ctx), entry.path()));
    }

    let mut dir = Dir::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some((name, Child::File(file)))) => {
                dir.files.insert(name, file);
            }
            Ok(Some((name, Child::Dir(sub)))) => {
                dir.subdirs.insert(name, sub);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Build task failed below {}: {}", path.display(), e);
                ctx.stats.record_failure();
            }
        }
    }

    ctx.stats.directories.fetch_add(1, Ordering::Relaxed);
    Ok(dir)
}

async fn build_child(ctx: Arc<BuildContext>, path: PathBuf) -> Option<(String, Child)> {
    let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
        tracing::warn!("Skipping {}: name is not valid UTF-8", path.display());
        ctx.stats.record_failure();
        return None;
    };

    // Follows symlinks
    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!("Skipping {}: {}", path.display(), e);
            ctx.stats.record_failure();
            return None;
        }
    };

    let child = if metadata.is_dir() {
        build_dir(Arc::clone(&ctx), path.clone()).await.map(Child::Dir)
    } else if metadata.is_file() {
        load_file(&ctx, &name, &path, &metadata).await.map(Child::File)
    } else {
        tracing::debug!("Skipping special file {}", path.display());
        return None;
    };

    match child {
        Ok(child) => Some((name, child)),
        Err(e) => {
            tracing::warn!("Skipping {}: {}", path.display(), e);
            ctx.stats.record_failure();
            None
        }
    }
}

async fn load_file(
    ctx: &BuildContext,
    name: &str,
    path: &Path,
    metadata: &Metadata,
) -> io::Result<FileEntry> {
    let raw = Bytes::from(tokio::fs::read(path).await?);
    let mut entry = FileEntry {
        mime_type: mime::lookup(&ctx.settings.mimetypes(), name).map(str::to_string),
        modified: metadata.modified().ok(),
        ..FileEntry::new(raw)
    };

    let raw_len = entry.raw.len();
    let wanted: Vec<(Encoding, CompressionKnobs)> = Encoding::ALL
        .into_iter()
        .map(|encoding| (encoding, ctx.settings.compression(encoding)))
        .filter(|(_, knobs)| knobs.enabled && raw_len as u64 > knobs.min_size)
        .collect();

    if !wanted.is_empty() {
        let raw = entry.raw.clone();
        let encodings: Vec<Encoding> = wanted.iter().map(|(encoding, _)| *encoding).collect();
        // CPU-bound, kept off the runtime workers
        let results = tokio::task::spawn_blocking(move || {
            encodings
                .into_iter()
                .map(|encoding| compress::compress(encoding, &raw))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(io::Error::other)?;

        for ((encoding, knobs), result) in wanted.into_iter().zip(results) {
            let compressed = match result {
                Ok(compressed) => compressed,
                Err(e) => {
                    tracing::warn!("Failed to {} {}: {}", encoding, path.display(), e);
                    continue;
                }
            };

            if compress::worth_keeping(raw_len, compressed.len(), knobs.min_ratio) {
                entry.set_variant(encoding, Bytes::from(compressed));
                ctx.stats.variants.fetch_add(1, Ordering::Relaxed);
            } else {
                tracing::trace!(
                    "Dropping {} variant of {}: {:.1}% saved",
                    encoding,
                    path.display(),
                    compress::savings_percent(raw_len, compressed.len())
                );
            }
        }
    }

    ctx.stats.files.fetch_add(1, Ordering::Relaxed);
    ctx.stats.bytes.fetch_add(raw_len as u64, Ordering::Relaxed);
    tracing::debug!(
        "Cached {} ({} bytes, mime {:?}, variants: deflate={} gzip={} br={})",
        path.display(),
        raw_len,
        entry.mime_type,
        entry.deflate.is_some(),
        entry.gzip.is_some(),
        entry.brotli.is_some()
    );

    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Lookup;
    use cachefront_core::config::RefreshProfile;
    use cachefront_settings::{MemoryStore, MimeRecord};
    use std::io::Read;

    fn settings(store: MemoryStore) -> Arc<SettingsRegistry> {
        Arc::new(SettingsRegistry::with_profile(Arc::new(store), RefreshProfile::Eager))
    }

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_builds_nested_tree() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.html", b"<h1>home</h1>");
        write(dir.path(), "blog/post.html", b"<p>post</p>");
        write(dir.path(), "blog/2024/old.txt", b"old");

        let store = MemoryStore::default();
        store.set_mimetypes(vec![MimeRecord::new("^html$", "text/html")]);
        let stats = Arc::new(BuildStats::default());
        let tree = build(dir.path(), settings(store), Arc::clone(&stats)).await;

        assert_eq!(tree.file_count(), 3);
        match tree.lookup("/blog/post.html") {
            Lookup::File(file) => {
                assert_eq!(file.raw, "<p>post</p>");
                assert_eq!(file.mime_type.as_deref(), Some("text/html"));
                assert!(file.modified.is_some());
                // Below the minimum size
                assert!(!file.has_variants());
            }
            other => panic!("unexpected lookup result {:?}", other),
        }
        match tree.lookup("/blog/2024/old.txt") {
            Lookup::File(file) => assert_eq!(file.mime_type, None),
            other => panic!("unexpected lookup result {:?}", other),
        }

        let summary = stats.summary(Duration::ZERO);
        assert_eq!(summary.files, 3);
        assert_eq!(summary.directories, 3);
        assert_eq!(summary.bytes, 13 + 11 + 3);
        assert_eq!(summary.failures, 0);
    }

    #[tokio::test]
    async fn test_variant_retention() {
        let dir = tempfile::tempdir().unwrap();
        let text = "cachefront serves precompressed pages\n".repeat(400);
        write(dir.path(), "big.txt", text.as_bytes());
        write(dir.path(), "small.txt", b"tiny");

        let store = MemoryStore::default();
        store.set_value("deflate_enabled", true);
        store.set_value("brotli_enabled", false);
        let stats = Arc::new(BuildStats::default());
        let tree = build(dir.path(), settings(store), Arc::clone(&stats)).await;

        let Lookup::File(big) = tree.lookup("/big.txt") else {
            panic!("big.txt missing");
        };
        assert!(big.brotli.is_none());
        let gzip = big.gzip.as_ref().unwrap();
        let mut decoded = String::new();
        flate2::read::GzDecoder::new(&gzip[..])
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, text);
        assert!(big.deflate.is_some());

        let Lookup::File(small) = tree.lookup("/small.txt") else {
            panic!("small.txt missing");
        };
        assert!(!small.has_variants());
        assert_eq!(stats.summary(Duration::ZERO).variants, 2);
    }

    #[tokio::test]
    async fn test_ratio_threshold_drops_variants() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "page.html", "abc".repeat(2000).as_bytes());

        let store = MemoryStore::default();
        store.set_value("gzip_min_ratio", 100.0);
        store.set_value("brotli_min_ratio", 100.0);
        let tree = build(dir.path(), settings(store), Arc::new(BuildStats::default())).await;

        let Lookup::File(page) = tree.lookup("/page.html") else {
            panic!("page.html missing");
        };
        assert!(!page.has_variants());
    }

    #[tokio::test]
    async fn test_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let stats = Arc::new(BuildStats::default());
        let tree = build(
            &dir.path().join("absent"),
            settings(MemoryStore::default()),
            Arc::clone(&stats),
        )
        .await;

        assert_eq!(tree.file_count(), 0);
        assert_eq!(stats.failures(), 1);
    }
}
