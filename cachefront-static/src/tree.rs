//! Immutable content tree produced by a build

use bytes::Bytes;
use cachefront_core::Encoding;
use std::collections::HashMap;
use std::time::SystemTime;

/// One cached file with its retained compressed variants
#[derive(Debug, Clone, Default)]
pub struct FileEntry {
    pub raw: Bytes,
    pub deflate: Option<Bytes>,
    pub gzip: Option<Bytes>,
    pub brotli: Option<Bytes>,
    pub mime_type: Option<String>,
    pub modified: Option<SystemTime>,
}

impl FileEntry {
    pub fn new(raw: impl Into<Bytes>) -> Self {
        Self {
            raw: raw.into(),
            ..Default::default()
        }
    }

    pub fn variant(&self, encoding: Encoding) -> Option<&Bytes> {
        match encoding {
            Encoding::Deflate => self.deflate.as_ref(),
            Encoding::Gzip => self.gzip.as_ref(),
            Encoding::Brotli => self.brotli.as_ref(),
        }
    }

    pub fn set_variant(&mut self, encoding: Encoding, data: Bytes) {
        let slot = match encoding {
            Encoding::Deflate => &mut self.deflate,
            Encoding::Gzip => &mut self.gzip,
            Encoding::Brotli => &mut self.brotli,
        };
        *slot = Some(data);
    }

    pub fn has_variants(&self) -> bool {
        Encoding::ALL.iter().any(|e| self.variant(*e).is_some())
    }
}

/// Directory level of the content tree
#[derive(Debug, Clone, Default)]
pub struct Dir {
    pub files: HashMap<String, FileEntry>,
    pub subdirs: HashMap<String, Dir>,
}

/// Result of looking up a request path in the tree
#[derive(Debug)]
pub enum Lookup<'a> {
    File(&'a FileEntry),
    Directory,
    Missing,
}

impl Dir {
    /// Walk `path` (`/a/b/c.html`) down the tree.
    ///
    /// Every segment but the last must name a subdirectory.
    pub fn lookup(&self, path: &str) -> Lookup<'_> {
        let mut segments: Vec<&str> = path.split('/').collect();
        if segments.first() == Some(&"") {
            segments.remove(0);
        }
        let Some((last, parents)) = segments.split_last() else {
            return Lookup::Missing;
        };

        let mut dir = self;
        for segment in parents {
            match dir.subdirs.get(*segment) {
                Some(sub) => dir = sub,
                None => return Lookup::Missing,
            }
        }

        if let Some(file) = dir.files.get(*last) {
            Lookup::File(file)
        } else if dir.subdirs.contains_key(*last) {
            Lookup::Directory
        } else {
            Lookup::Missing
        }
    }

    /// Number of files in this directory and below
    pub fn file_count(&self) -> usize {
        self.files.len() + self.subdirs.values().map(Dir::file_count).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> Dir {
        let mut blog = Dir::default();
        blog.files.insert("post.html".into(), FileEntry::new("post"));
        let mut root = Dir::default();
        root.files.insert("index.html".into(), FileEntry::new("home"));
        root.subdirs.insert("blog".into(), blog);
        root
    }

    #[test]
    fn test_lookup() {
        let root = site();
        assert!(matches!(root.lookup("/index.html"), Lookup::File(f) if f.raw == "home"));
        assert!(matches!(root.lookup("/blog/post.html"), Lookup::File(f) if f.raw == "post"));
        assert!(matches!(root.lookup("/blog"), Lookup::Directory));
        assert!(matches!(root.lookup("/blog/missing.html"), Lookup::Missing));
        assert!(matches!(root.lookup("/nope/post.html"), Lookup::Missing));
        assert!(matches!(root.lookup("/blog/"), Lookup::Missing));
        assert!(matches!(root.lookup("/index.html/x"), Lookup::Missing));
        assert_eq!(root.file_count(), 2);
    }

    #[test]
    fn test_variants() {
        let mut entry = FileEntry::new("raw");
        assert!(!entry.has_variants());
        entry.set_variant(Encoding::Brotli, Bytes::from_static(b"br"));
        assert!(entry.has_variants());
        assert_eq!(entry.variant(Encoding::Brotli).unwrap(), "br");
        assert!(entry.variant(Encoding::Gzip).is_none());
    }
}
