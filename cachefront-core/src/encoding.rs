//! Content encodings precomputed for every cached file

use serde::{Deserialize, Serialize};
use std::fmt;

/// Compressed representations the content cache can hold.
///
/// The declaration order is the negotiation order: when two variants have
/// the same length, the one listed first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    Deflate,
    Gzip,
    Brotli,
}

impl Encoding {
    /// All encodings in negotiation order
    pub const ALL: [Encoding; 3] = [Encoding::Deflate, Encoding::Gzip, Encoding::Brotli];

    /// Get the content-encoding header value
    pub fn token(&self) -> &'static str {
        match self {
            Encoding::Deflate => "deflate",
            Encoding::Gzip => "gzip",
            Encoding::Brotli => "br",
        }
    }

    /// Parse an `Accept-Encoding` token (case-insensitive)
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.token().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens() {
        assert_eq!(Encoding::Brotli.token(), "br");
        assert_eq!(Encoding::from_token("GZIP"), Some(Encoding::Gzip));
        assert_eq!(Encoding::from_token("brotli"), None);
        assert_eq!(Encoding::from_token("identity"), None);
    }
}
