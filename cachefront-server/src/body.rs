//! Response body that reports to the access log when released

use crate::access_log::{AccessLog, AccessRecord};
use crate::metrics;
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

/// Single-chunk body carrying the pending access record.
///
/// The record is submitted when the body is dropped. A body dropped before
/// its bytes were handed to the connection records a write error.
pub struct TrackedBody {
    data: Option<Bytes>,
    record: Option<AccessRecord>,
    started: Instant,
    log: AccessLog,
}

impl TrackedBody {
    pub fn new(data: Bytes, record: AccessRecord, started: Instant, log: AccessLog) -> Self {
        Self {
            data: (!data.is_empty()).then_some(data),
            record: Some(record),
            started,
            log,
        }
    }
}

impl Body for TrackedBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Ready(self.get_mut().data.take().map(|data| Ok(Frame::data(data))))
    }

    fn is_end_stream(&self) -> bool {
        self.data.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.data.as_ref().map_or(0, |d| d.len() as u64))
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        let Some(mut record) = self.record.take() else {
            return;
        };
        if let Some(unsent) = &self.data {
            record.write_error = Some(format!(
                "connection closed with {} body bytes unsent",
                unsent.len()
            ));
            metrics::WRITE_ERRORS_TOTAL.inc();
        }
        record.total = self.started.elapsed();
        self.log.submit(record);
    }
}
