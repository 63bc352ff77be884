//! Cachefront HTTP front end
//!
//! This crate serves the content cache over HTTP:
//! - Request handling on hyper's HTTP/1.1 connection
//! - Response headers from the resolved entry
//! - Access log records emitted when a response body is released
//! - Prometheus metrics

pub mod access_log;
pub mod body;
pub mod metrics;
pub mod server;

pub use access_log::{AccessLog, AccessLogSink, AccessRecord, TracingSink};
pub use body::TrackedBody;
pub use server::ContentServer;
