//! Error types for Cachefront

use thiserror::Error;

/// Result type for Cachefront operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Cachefront
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),

    /// A runtime setting could not be loaded from its store
    #[error("Settings error: {0}")]
    Settings(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
