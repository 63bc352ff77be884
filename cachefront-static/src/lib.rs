//! Cachefront content cache
//!
//! Loads a site directory into memory once, with precompressed variants
//! next to every file, and answers requests from that copy:
//! - Concurrent tree build with per-algorithm compression thresholds
//! - MIME assignment from the settings' mime table
//! - Access rules, default document and encoding negotiation
//! - Atomic swap of the whole tree on rebuild

mod accept;
mod build;
mod cache;
mod compress;
mod mime;
mod pages;
mod resolve;
mod tree;

pub use accept::AcceptedEncodings;
pub use build::{BuildStats, BuildSummary};
pub use cache::ContentCache;
pub use resolve::{RequestResolver, ResolveError, Resolved, request_host};
pub use tree::{Dir, FileEntry, Lookup};
