//! Admin API Server

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use cachefront_static::ContentCache;

use crate::handlers;

/// Run the admin server
pub async fn run_admin_server(addr: SocketAddr, cache: Arc<ContentCache>) -> cachefront_core::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| cachefront_core::Error::Server(format!("Failed to bind admin API: {}", e)))?;

    tracing::info!("🔧 Admin API listening on http://{}", addr);

    loop {
        let (stream, _) = match listener.accept().await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Admin accept error: {}", e);
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let cache = cache.clone();

        tokio::task::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .serve_connection(io, service_fn(move |req| handle_request(req, cache.clone())))
                .await
            {
                tracing::error!("Error serving admin connection: {:?}", err);
            }
        });
    }
}

async fn handle_request<B>(
    req: Request<B>,
    cache: Arc<ContentCache>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    drop(req);

    let result = match (&method, path.as_str()) {
        (&Method::GET, "/health") => handlers::health(&cache).map(|body| (StatusCode::OK, "application/json", body)),
        (&Method::GET, "/metrics") => Ok((
            StatusCode::OK,
            "text/plain; version=0.0.4",
            cachefront_server::metrics::gather(),
        )),
        (&Method::POST, "/reload") => {
            tracing::info!("Rebuild requested through the admin API");
            handlers::reload(&cache)
                .await
                .map(|body| (StatusCode::OK, "application/json", body))
        }
        (_, "/health" | "/metrics" | "/reload") => {
            Ok((StatusCode::METHOD_NOT_ALLOWED, "text/plain", "Method Not Allowed".to_string()))
        }
        _ => Ok((StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string())),
    };

    let (status, content_type, body) = result.unwrap_or_else(|e| {
        tracing::error!("Admin request failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "Internal Server Error".to_string())
    });
    Ok(response(status, content_type, body))
}

fn response(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static(content_type),
    );
    response
}
