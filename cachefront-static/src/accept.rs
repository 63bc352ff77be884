//! Accept-Encoding parsing

use cachefront_core::Encoding;
use http::HeaderMap;
use http::header::ACCEPT_ENCODING;

/// Encodings a client accepts, q-values reduced to yes/no
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptedEncodings {
    mask: u8,
}

impl AcceptedEncodings {
    /// Parse one header value (`gzip, br;q=0.8, deflate;q=0`).
    ///
    /// Unknown tokens are ignored, `q=0` rejects a token and later mentions
    /// of a token override earlier ones.
    pub fn parse(header: &str) -> Self {
        let mut accepted = Self::default();
        accepted.merge(header);
        accepted
    }

    /// Combine every `Accept-Encoding` header of a request
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut accepted = Self::default();
        for value in headers.get_all(ACCEPT_ENCODING) {
            match value.to_str() {
                Ok(value) => accepted.merge(value),
                Err(_) => tracing::debug!("Ignoring non-ASCII Accept-Encoding value"),
            }
        }
        accepted
    }

    pub fn accepts(&self, encoding: Encoding) -> bool {
        self.mask & bit(encoding) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    fn merge(&mut self, header: &str) {
        for part in header.split(',') {
            let token = part.split(';').next().unwrap_or("").trim();
            let Some(encoding) = Encoding::from_token(token) else {
                continue;
            };
            if parse_quality(part) > 0.0 {
                self.mask |= bit(encoding);
            } else {
                self.mask &= !bit(encoding);
            }
        }
    }
}

fn bit(encoding: Encoding) -> u8 {
    match encoding {
        Encoding::Deflate => 1,
        Encoding::Gzip => 1 << 1,
        Encoding::Brotli => 1 << 2,
    }
}

/// Quality of one list element, 1.0 when absent or unparsable
fn parse_quality(part: &str) -> f32 {
    part.split(';')
        .skip(1)
        .find_map(|param| param.trim().strip_prefix("q="))
        .and_then(|q| q.trim().parse::<f32>().ok())
        .unwrap_or(1.0)
}
