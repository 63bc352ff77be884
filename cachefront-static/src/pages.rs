//! HTML pages for errors and the loading state

use http::StatusCode;

const STYLE: &str = "body{margin:0;min-height:100vh;display:flex;align-items:center;\
justify-content:center;background:#07090c;color:#e8e8e8;font-family:system-ui,sans-serif}\
main{max-width:40em;padding:2em}h1{margin:0 0 .4em}address{color:#888;font-size:.85em}\
button{padding:8px 16px;color:inherit;border:1px solid currentColor;background:none;\
border-radius:1em;cursor:pointer}";

/// Short explanation shown for a status
fn describe(status: StatusCode) -> &'static str {
    match status {
        StatusCode::FORBIDDEN => "You are not allowed to access this URL.",
        StatusCode::NOT_FOUND => "URL not found on server.",
        StatusCode::METHOD_NOT_ALLOWED => "Method not allowed.",
        StatusCode::URI_TOO_LONG => "The requested URL is too long.",
        StatusCode::INTERNAL_SERVER_ERROR => "An error happened while processing your request.",
        _ => "The request could not be served.",
    }
}

fn escape(text: &str) -> String {
    html_escape::encode_safe(text).into_owned()
}

fn footer(host: &str) -> String {
    format!(
        "<address>Cachefront/{} at {}</address>",
        cachefront_core::VERSION,
        escape(host)
    )
}

/// Error page naming the status, the path, the host and a short cause
pub fn error_page(status: StatusCode, path: &str, host: &str, cause: &str) -> String {
    let reason = status.canonical_reason().unwrap_or("Error");
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"/>\
<meta name=\"viewport\" content=\"width=device-width\"/>\
<title>{code} | {reason}</title><style>{STYLE}</style></head>\
<body><main><h1>{reason}</h1><p>Error accessing {path}</p>\
<p>{message}</p><p>{cause}</p>\
<button onclick=\"location.reload()\">Reload</button><hr>{footer}</main></body></html>\n",
        code = status.as_u16(),
        reason = reason,
        path = escape(path),
        message = describe(status),
        cause = escape(cause),
        footer = footer(host),
    )
}

/// Page served while the first build is still running
pub fn loading_page(path: &str, host: &str, files_loaded: u64) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"/>\
<meta name=\"viewport\" content=\"width=device-width\"/>\
<meta http-equiv=\"refresh\" content=\"2\"/>\
<title>Server Loading</title><style>{STYLE}</style></head>\
<body><main><h1>Server is still starting</h1><p>Error accessing {path}</p>\
<p>{files_loaded} files loaded so far.</p>\
<button onclick=\"location.reload()\">Reload</button><hr>{footer}</main></body></html>\n",
        path = escape(path),
        files_loaded = files_loaded,
        footer = footer(host),
    )
}
