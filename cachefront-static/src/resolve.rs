//! Request resolution against the content cache

use crate::accept::AcceptedEncodings;
use crate::cache::ContentCache;
use crate::pages;
use crate::tree::{FileEntry, Lookup};
use bytes::Bytes;
use cachefront_core::Encoding;
use http::header::HOST;
use http::{HeaderMap, Method, StatusCode, Uri};
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;

/// Why a request did not resolve to content
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("content is still loading")]
    Loading,

    #[error("server is switched off")]
    ServerOff,

    #[error("method {0} is not allowed")]
    MethodNotAllowed(Method),

    #[error("request target is {length} bytes long, the limit is {limit}")]
    UriTooLong { length: usize, limit: u16 },

    #[error("{path} is forbidden: it matches {rule}")]
    Forbidden { path: String, rule: String },

    #[error("{path} is no file, but a directory")]
    IsDirectory { path: String },

    #[error("{path} was not found")]
    NotFound { path: String },
}

impl ResolveError {
    pub fn status(&self) -> StatusCode {
        match self {
            ResolveError::Loading => StatusCode::IM_A_TEAPOT,
            ResolveError::ServerOff => StatusCode::GONE,
            ResolveError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ResolveError::UriTooLong { .. } => StatusCode::URI_TOO_LONG,
            ResolveError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ResolveError::IsDirectory { .. } | ResolveError::NotFound { .. } => {
                StatusCode::NOT_FOUND
            }
        }
    }

    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::Loading => "loading",
            ResolveError::ServerOff => "server_off",
            ResolveError::MethodNotAllowed(_) => "method_not_allowed",
            ResolveError::UriTooLong { .. } => "uri_too_long",
            ResolveError::Forbidden { .. } => "forbidden",
            ResolveError::IsDirectory { .. } => "is_directory",
            ResolveError::NotFound { .. } => "not_found",
        }
    }

    /// Path the error refers to, after default document substitution
    pub fn path(&self) -> Option<&str> {
        match self {
            ResolveError::Forbidden { path, .. }
            | ResolveError::IsDirectory { path }
            | ResolveError::NotFound { path } => Some(path),
            _ => None,
        }
    }
}

/// Content chosen for a request
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Served path, with `/` replaced by the default document
    pub path: String,
    pub body: Bytes,
    /// `None` when the raw bytes were chosen
    pub encoding: Option<Encoding>,
    pub mime_type: Option<String>,
    pub modified: Option<SystemTime>,
    /// The entry has compressed variants, so the choice depended on `Accept-Encoding`
    pub vary: bool,
}

/// Maps requests to cached content
#[derive(Clone)]
pub struct RequestResolver {
    cache: Arc<ContentCache>,
}

impl RequestResolver {
    pub fn new(cache: Arc<ContentCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn resolve(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> Result<Resolved, ResolveError> {
        let Some(root) = self.cache.snapshot() else {
            return Err(ResolveError::Loading);
        };
        let settings = self.cache.settings();

        if settings.server_off() {
            return Err(ResolveError::ServerOff);
        }

        if method != Method::GET {
            return Err(ResolveError::MethodNotAllowed(method.clone()));
        }

        let length = request_target(uri).len();
        let limit = settings.max_uri_length();
        if length > usize::from(limit) {
            return Err(ResolveError::UriTooLong { length, limit });
        }

        let decoded = percent_decode_str(uri.path()).decode_utf8_lossy();
        if let Some(rule) = settings.forbidden().iter().find(|rule| rule.matches(&decoded)) {
            return Err(ResolveError::Forbidden {
                path: decoded.into_owned(),
                rule: rule.to_string(),
            });
        }

        let path = if decoded == "/" {
            settings.default_document()
        } else {
            decoded.into_owned()
        };

        let entry = match root.lookup(&path) {
            Lookup::File(entry) => entry,
            Lookup::Directory => return Err(ResolveError::IsDirectory { path }),
            Lookup::Missing => return Err(ResolveError::NotFound { path }),
        };

        let (encoding, body) = negotiate(entry, AcceptedEncodings::from_headers(headers));
        Ok(Resolved {
            body: body.clone(),
            path,
            encoding,
            mime_type: entry.mime_type.clone(),
            modified: entry.modified,
            vary: entry.has_variants(),
        })
    }

    /// Response body for a failed resolution
    pub fn error_body(&self, error: &ResolveError, uri: &Uri, host: &str) -> Bytes {
        let path = percent_decode_str(uri.path()).decode_utf8_lossy();
        match error {
            ResolveError::ServerOff => Bytes::new(),
            ResolveError::Loading => {
                pages::loading_page(&path, host, self.cache.files_in_progress()).into()
            }
            other => pages::error_page(other.status(), &path, host, &other.to_string()).into(),
        }
    }
}

/// Smallest accepted representation; ties go to the earlier of raw, deflate, gzip, brotli
fn negotiate(entry: &FileEntry, accepted: AcceptedEncodings) -> (Option<Encoding>, &Bytes) {
    let mut best = (None, &entry.raw);
    for encoding in Encoding::ALL {
        if !accepted.accepts(encoding) {
            continue;
        }
        if let Some(variant) = entry.variant(encoding) {
            if variant.len() < best.1.len() {
                best = (Some(encoding), variant);
            }
        }
    }
    best
}

fn request_target(uri: &Uri) -> &str {
    uri.path_and_query().map_or(uri.path(), |pq| pq.as_str())
}

/// Host the request was addressed to, empty when unknown
pub fn request_host<'a>(uri: &'a Uri, headers: &'a HeaderMap) -> &'a str {
    headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.host())
        .unwrap_or("")
}
