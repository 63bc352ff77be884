//! Cachefront Admin API
//!
//! Health, metrics and rebuild endpoints on a separate listener.

mod handlers;
pub mod server;

pub use server::run_admin_server;
