//! Access log records and sinks

use cachefront_core::Encoding;
use http::Method;
use std::sync::Arc;
use std::time::Duration;

/// One served request
#[derive(Debug, Clone)]
pub struct AccessRecord {
    pub status: u16,
    /// From request arrival until the body was released
    pub total: Duration,
    pub resolve: Duration,
    pub resolve_error: Option<String>,
    pub write_error: Option<String>,
    pub method: Method,
    pub path: String,
    pub encoding: Option<Encoding>,
    pub bytes: usize,
}

/// Destination of access records
pub trait AccessLogSink: Send + Sync + 'static {
    fn record(&self, record: AccessRecord);
}

/// Emits every record as a `tracing` event on the `access` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AccessLogSink for TracingSink {
    fn record(&self, record: AccessRecord) {
        tracing::info!(
            target: "access",
            status = record.status,
            total_us = record.total.as_micros() as u64,
            resolve_us = record.resolve.as_micros() as u64,
            resolve_error = record.resolve_error.as_deref(),
            write_error = record.write_error.as_deref(),
            method = %record.method,
            path = %record.path,
            encoding = record.encoding.map(|e| e.token()),
            bytes = record.bytes,
        );
    }
}

/// Handle used by responses to submit their record
#[derive(Clone)]
pub struct AccessLog {
    sink: Arc<dyn AccessLogSink>,
}

impl AccessLog {
    pub fn new(sink: Arc<dyn AccessLogSink>) -> Self {
        Self { sink }
    }

    /// Hand the record to the sink without blocking the caller.
    ///
    /// Outside a tokio runtime the sink is called inline.
    pub fn submit(&self, record: AccessRecord) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let sink = Arc::clone(&self.sink);
                handle.spawn(async move { sink.record(record) });
            }
            Err(_) => self.sink.record(record),
        }
    }
}

impl Default for AccessLog {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}
