//! Cachefront runtime settings
//!
//! Every tunable the content server consults per request or per build lives
//! here as a [`Setting`] that refreshes itself from a [`SettingsStore`]
//! according to its own [`RefreshPolicy`].

pub mod registry;
pub mod rules;
pub mod setting;
pub mod store;

pub use registry::{CompressionKnobs, SettingsRegistry, validate_document};
pub use rules::{ForbiddenRecord, ForbiddenRule, MimeRecord, MimeRule};
pub use setting::{RefreshPolicy, Setting};
pub use store::{MemoryStore, SettingValue, SettingsDocument, SettingsStore, TomlFileStore};
