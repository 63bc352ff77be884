//! Content server

use crate::access_log::{AccessLog, AccessRecord};
use crate::body::TrackedBody;
use crate::metrics;
use cachefront_core::{Error, Result};
use cachefront_static::{RequestResolver, ResolveError, Resolved, request_host};
use http::header::{CONTENT_ENCODING, CONTENT_TYPE, LAST_MODIFIED, VARY};
use http::{HeaderValue, Request, Response, StatusCode};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;

const HTML: &str = "text/html; charset=utf-8";

/// Serves the content cache over HTTP/1.1
pub struct ContentServer {
    resolver: RequestResolver,
    access_log: AccessLog,
}

impl ContentServer {
    pub fn new(resolver: RequestResolver, access_log: AccessLog) -> Self {
        Self {
            resolver,
            access_log,
        }
    }

    /// Bind a listener for [`run`](Self::run)
    pub async fn bind(addr: &str) -> Result<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Server(format!("Failed to bind {}: {}", addr, e)))
    }

    /// Accept connections until the task is cancelled
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("🌐 Serving content on http://{}", addr);
        }

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("Accept error: {}", e);
                    continue;
                }
            };

            let io = TokioIo::new(stream);
            let server = Arc::clone(&self);

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let response = server.handle(&req);
                    async move { Ok::<_, Infallible>(response) }
                });
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::debug!("Connection from {} ended with error: {:?}", peer, err);
                }
            });
        }
    }

    /// Answer one request from the cache
    pub fn handle<B>(&self, req: &Request<B>) -> Response<TrackedBody> {
        let started = Instant::now();
        let outcome = self.resolver.resolve(req.method(), req.uri(), req.headers());
        let resolve = started.elapsed();

        let (status, body, encoding) = match &outcome {
            Ok(resolved) => (StatusCode::OK, resolved.body.clone(), resolved.encoding),
            Err(err) => {
                let host = request_host(req.uri(), req.headers());
                (err.status(), self.resolver.error_body(err, req.uri(), host), None)
            }
        };

        metrics::RESOLVE_DURATION_SECONDS
            .with_label_values(&[outcome.as_ref().map_or_else(ResolveError::kind, |_| "ok")])
            .observe(resolve.as_secs_f64());
        metrics::RESPONSES_TOTAL
            .with_label_values(&[status.as_str(), encoding.map_or("identity", |e| e.token())])
            .inc();

        let record = AccessRecord {
            status: status.as_u16(),
            total: resolve,
            resolve,
            resolve_error: outcome.as_ref().err().map(ToString::to_string),
            write_error: None,
            method: req.method().clone(),
            path: match &outcome {
                Ok(resolved) => resolved.path.clone(),
                Err(err) => err
                    .path()
                    .map_or_else(|| req.uri().path().to_string(), str::to_string),
            },
            encoding,
            bytes: body.len(),
        };

        let mut response = Response::new(TrackedBody::new(
            body,
            record,
            started,
            self.access_log.clone(),
        ));
        *response.status_mut() = status;

        match &outcome {
            Ok(resolved) => apply_content_headers(&mut response, resolved),
            Err(ResolveError::ServerOff) => {}
            Err(_) => {
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(HTML));
            }
        }
        response
    }
}

fn apply_content_headers(response: &mut Response<TrackedBody>, resolved: &Resolved) {
    let headers = response.headers_mut();

    if let Some(mime) = &resolved.mime_type {
        match HeaderValue::from_str(mime) {
            Ok(value) => {
                headers.insert(CONTENT_TYPE, value);
            }
            Err(_) => tracing::warn!("Ignoring invalid content type {:?}", mime),
        }
    }
    if let Some(encoding) = resolved.encoding {
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding.token()));
    }
    if let Some(modified) = resolved.modified {
        if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(modified)) {
            headers.insert(LAST_MODIFIED, value);
        }
    }
    if resolved.vary {
        headers.insert(VARY, HeaderValue::from_static("Accept-Encoding"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_log::AccessLogSink;
    use bytes::Bytes;
    use cachefront_core::Encoding;
    use cachefront_core::config::RefreshProfile;
    use cachefront_settings::{MemoryStore, SettingsRegistry};
    use cachefront_static::{ContentCache, Dir, FileEntry};
    use http::header::ACCEPT_ENCODING;
    use http_body::Body;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::task::{Context, Poll, Waker};

    /// Sink collecting records for inspection
    #[derive(Default)]
    struct Captured(Mutex<Vec<AccessRecord>>);

    impl AccessLogSink for Captured {
        fn record(&self, record: AccessRecord) {
            self.0.lock().unwrap().push(record);
        }
    }

    fn make_server(store: MemoryStore, ready: bool) -> (ContentServer, Arc<Captured>) {
        let settings = SettingsRegistry::with_profile(Arc::new(store), RefreshProfile::Eager);
        let cache = Arc::new(ContentCache::new("/nonexistent", Arc::new(settings)));
        if ready {
            let mut root = Dir::default();
            root.files.insert(
                "index.html".into(),
                FileEntry {
                    gzip: Some(Bytes::from_static(b"gz")),
                    mime_type: Some("text/html".into()),
                    modified: Some(std::time::UNIX_EPOCH),
                    ..FileEntry::new("<h1>home</h1>")
                },
            );
            cache.install(root);
        }
        let captured = Arc::new(Captured::default());
        let log = AccessLog::new(captured.clone());
        (ContentServer::new(RequestResolver::new(cache), log), captured)
    }

    fn request(method: &str, path: &str, accept: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().method(method).uri(path).header("host", "example.org");
        if let Some(accept) = accept {
            builder = builder.header(ACCEPT_ENCODING, accept);
        }
        builder.body(()).unwrap()
    }

    fn drain(body: &mut TrackedBody) -> Vec<u8> {
        let mut cx = Context::from_waker(Waker::noop());
        let mut out = Vec::new();
        while let Poll::Ready(Some(Ok(frame))) = Pin::new(&mut *body).poll_frame(&mut cx) {
            out.extend_from_slice(frame.data_ref().unwrap());
        }
        out
    }

    #[test]
    fn test_ok_response_headers_and_record() {
        let (server, captured) = make_server(MemoryStore::default(), true);
        let response = server.handle(&request("GET", "/", Some("gzip")));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html");
        assert_eq!(response.headers()[CONTENT_ENCODING], "gzip");
        assert_eq!(response.headers()[VARY], "Accept-Encoding");
        assert_eq!(response.headers()[LAST_MODIFIED], "Thu, 01 Jan 1970 00:00:00 GMT");

        let mut body = response.into_body();
        assert_eq!(drain(&mut body), b"gz");
        drop(body);

        let records = captured.0.lock().unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.status, 200);
        // Logged with the default document substituted
        assert_eq!(record.path, "/index.html");
        assert_eq!(record.encoding, Some(Encoding::Gzip));
        assert!(record.resolve_error.is_none());
        assert!(record.write_error.is_none());
        assert!(record.total >= record.resolve);
    }

    #[test]
    fn test_unsent_body_records_write_error() {
        let (server, captured) = make_server(MemoryStore::default(), true);
        let response = server.handle(&request("GET", "/index.html", None));
        assert!(response.headers().get(CONTENT_ENCODING).is_none());
        drop(response);

        let records = captured.0.lock().unwrap();
        assert!(records[0].write_error.as_deref().unwrap().contains("13 body bytes"));
    }

    #[test]
    fn test_error_responses() {
        let (server, captured) = make_server(MemoryStore::default(), true);

        let response = server.handle(&request("DELETE", "/index.html", None));
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[CONTENT_TYPE], HTML);
        let mut body = response.into_body();
        let page = String::from_utf8(drain(&mut body)).unwrap();
        assert!(page.contains("example.org"));
        drop(body);

        let response = server.handle(&request("GET", "/missing.html", None));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        drop(response);

        let records = captured.0.lock().unwrap();
        assert!(records[0].resolve_error.as_deref().unwrap().contains("DELETE"));
        assert!(records[1].resolve_error.as_deref().unwrap().contains("/missing.html"));
    }

    #[test]
    fn test_loading_and_server_off() {
        let (server, _) = make_server(MemoryStore::default(), false);
        let response = server.handle(&request("PUT", "/x", None));
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);

        let store = MemoryStore::default();
        store.set_value("server_off", true);
        let (server, _) = make_server(store, true);
        let response = server.handle(&request("GET", "/index.html", None));
        assert_eq!(response.status(), StatusCode::GONE);
        assert!(response.headers().get(CONTENT_TYPE).is_none());
        assert!(response.body().is_end_stream());
    }
}
