//! Registry of every runtime setting

use crate::rules::{ForbiddenRule, MimeRule};
use crate::setting::{RefreshPolicy, Setting};
use crate::store::{SettingsDocument, SettingsStore};
use cachefront_core::config::RefreshProfile;
use cachefront_core::{Encoding, Error, Result};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Store keys of the scalar settings
pub mod keys {
    pub const DEFAULT_DOCUMENT: &str = "default_document";
    pub const SERVER_OFF: &str = "server_off";
    pub const MAX_URI_LENGTH: &str = "max_uri_length";
}

const MINUTE: Duration = Duration::from_secs(60);

/// Compression thresholds for one algorithm, read together
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionKnobs {
    pub enabled: bool,
    /// Files must be strictly larger than this to be compressed
    pub min_size: u64,
    /// Percent saved a variant must strictly exceed to be kept
    pub min_ratio: f32,
}

struct CompressionSettings {
    enabled: Setting<bool>,
    min_size: Setting<u64>,
    min_ratio: Setting<f32>,
}

/// All runtime settings, each refreshing on its own policy
pub struct SettingsRegistry {
    default_document: Setting<String>,
    mimetypes: Setting<Arc<[MimeRule]>>,
    server_off: Setting<bool>,
    deflate: CompressionSettings,
    gzip: CompressionSettings,
    brotli: CompressionSettings,
    forbidden: Setting<Arc<[ForbiddenRule]>>,
    max_uri_length: Setting<u16>,
}

impl SettingsRegistry {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self::with_profile(store, RefreshProfile::Standard)
    }

    pub fn with_profile(store: Arc<dyn SettingsStore>, profile: RefreshProfile) -> Self {
        let policy = |standard: RefreshPolicy| match profile {
            RefreshProfile::Standard => standard,
            RefreshProfile::Eager => RefreshPolicy::Always,
        };

        let compression = |encoding: Encoding| {
            let (enabled_key, size_key, ratio_key) = compression_keys(encoding);
            CompressionSettings {
                enabled: Setting::new(
                    enabled_key,
                    encoding != Encoding::Deflate,
                    policy(RefreshPolicy::AfterElapsed(MINUTE)),
                    scalar(&store, enabled_key),
                ),
                min_size: Setting::new(
                    size_key,
                    1400,
                    policy(RefreshPolicy::AfterElapsed(MINUTE)),
                    scalar(&store, size_key),
                ),
                min_ratio: Setting::new(
                    ratio_key,
                    20.0,
                    policy(RefreshPolicy::AfterElapsed(MINUTE)),
                    scalar(&store, ratio_key),
                ),
            }
        };

        let mime_store = Arc::clone(&store);
        let forbidden_store = Arc::clone(&store);

        Self {
            default_document: Setting::new(
                keys::DEFAULT_DOCUMENT,
                "/index.html".to_string(),
                policy(RefreshPolicy::AsyncAfterAccess),
                scalar(&store, keys::DEFAULT_DOCUMENT),
            ),
            mimetypes: Setting::new(
                "mimetypes",
                Arc::from(Vec::new()),
                policy(RefreshPolicy::AfterElapsed(MINUTE)),
                move || {
                    let rules = mime_store
                        .mimetypes()?
                        .iter()
                        .map(MimeRule::try_from)
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Arc::from(rules))
                },
            ),
            server_off: Setting::new(
                keys::SERVER_OFF,
                false,
                policy(RefreshPolicy::AsyncAfterAccess),
                scalar(&store, keys::SERVER_OFF),
            ),
            deflate: compression(Encoding::Deflate),
            gzip: compression(Encoding::Gzip),
            brotli: compression(Encoding::Brotli),
            forbidden: Setting::new(
                "forbidden",
                Arc::from(Vec::new()),
                policy(RefreshPolicy::AsyncAfterElapsedSinceAccess(Duration::from_secs(30))),
                move || {
                    let rules = forbidden_store
                        .forbidden()?
                        .iter()
                        .map(ForbiddenRule::try_from)
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Arc::from(rules))
                },
            ),
            max_uri_length: Setting::new(
                keys::MAX_URI_LENGTH,
                1000,
                policy(RefreshPolicy::AsyncAfterNAccesses(100)),
                scalar(&store, keys::MAX_URI_LENGTH),
            ),
        }
    }

    /// Path served for a request to `/`
    pub fn default_document(&self) -> String {
        self.default_document.get()
    }

    pub fn mimetypes(&self) -> Arc<[MimeRule]> {
        self.mimetypes.get()
    }

    pub fn server_off(&self) -> bool {
        self.server_off.get()
    }

    pub fn compression_enabled(&self, encoding: Encoding) -> bool {
        self.compression_settings(encoding).enabled.get()
    }

    pub fn compression_min_size(&self, encoding: Encoding) -> u64 {
        self.compression_settings(encoding).min_size.get()
    }

    pub fn compression_min_ratio(&self, encoding: Encoding) -> f32 {
        self.compression_settings(encoding).min_ratio.get()
    }

    /// All three thresholds of one algorithm
    pub fn compression(&self, encoding: Encoding) -> CompressionKnobs {
        let settings = self.compression_settings(encoding);
        CompressionKnobs {
            enabled: settings.enabled.get(),
            min_size: settings.min_size.get(),
            min_ratio: settings.min_ratio.get(),
        }
    }

    pub fn forbidden(&self) -> Arc<[ForbiddenRule]> {
        self.forbidden.get()
    }

    pub fn max_uri_length(&self) -> u16 {
        self.max_uri_length.get()
    }

    fn compression_settings(&self, encoding: Encoding) -> &CompressionSettings {
        match encoding {
            Encoding::Deflate => &self.deflate,
            Encoding::Gzip => &self.gzip,
            Encoding::Brotli => &self.brotli,
        }
    }
}

fn compression_keys(encoding: Encoding) -> (&'static str, &'static str, &'static str) {
    match encoding {
        Encoding::Deflate => ("deflate_enabled", "deflate_min_size", "deflate_min_ratio"),
        Encoding::Gzip => ("gzip_enabled", "gzip_min_size", "gzip_min_ratio"),
        Encoding::Brotli => ("brotli_enabled", "brotli_min_size", "brotli_min_ratio"),
    }
}

/// Check a settings document the way the registry would load it.
///
/// Unlike loading, which falls back silently, this reports the first unknown
/// key, unparsable value or invalid pattern.
pub fn validate_document(document: &SettingsDocument) -> Result<()> {
    for (name, value) in &document.values {
        let text = value.to_string();
        let text = text.trim();
        let parsed = match name.as_str() {
            keys::DEFAULT_DOCUMENT => Ok(()),
            keys::SERVER_OFF => check::<bool>(text),
            keys::MAX_URI_LENGTH => check::<u16>(text),
            other => match Encoding::ALL
                .into_iter()
                .map(compression_keys)
                .find_map(|(enabled, size, ratio)| {
                    (other == enabled)
                        .then(|| check::<bool>(text))
                        .or_else(|| (other == size).then(|| check::<u64>(text)))
                        .or_else(|| (other == ratio).then(|| check::<f32>(text)))
                }) {
                Some(parsed) => parsed,
                None => Err("unknown setting".to_string()),
            },
        };
        parsed.map_err(|e| Error::Settings(format!("{} = {}: {}", name, value, e)))?;
    }

    for record in &document.mime {
        MimeRule::try_from(record)?;
    }
    for record in &document.forbidden {
        ForbiddenRule::try_from(record)?;
    }
    Ok(())
}

fn check<T>(text: &str) -> std::result::Result<(), String>
where
    T: FromStr,
    T::Err: Display,
{
    text.parse::<T>().map(drop).map_err(|e| e.to_string())
}

/// Loader for a scalar setting parsed from its stored text
fn scalar<T>(
    store: &Arc<dyn SettingsStore>,
    name: &'static str,
) -> impl Fn() -> Result<T> + Send + Sync + 'static
where
    T: FromStr,
    T::Err: Display,
{
    let store = Arc::clone(store);
    move || {
        let raw = store.value(name)?;
        raw.trim()
            .parse::<T>()
            .map_err(|e| Error::Settings(format!("Invalid value {:?} for {}: {}", raw, name, e)))
    }
}
