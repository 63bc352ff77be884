//! Cachefront Core Library
//!
//! This crate provides the pieces shared by every Cachefront crate:
//! process configuration, the content encodings the server precomputes,
//! and error handling.

pub mod config;
pub mod encoding;
pub mod error;

pub use encoding::Encoding;
pub use error::{Error, Result};

/// Cachefront version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
