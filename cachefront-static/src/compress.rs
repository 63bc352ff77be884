//! Precompression of cached files

use cachefront_core::Encoding;
use flate2::Compression;
use flate2::write::{GzEncoder, ZlibEncoder};
use std::io::{self, Cursor, Write};

/// Brotli window size (log2) used for precompression
const BROTLI_WINDOW: i32 = 22;

/// Compress `input` with `encoding` at the best available level.
///
/// CPU-bound; run it on the blocking pool when called from async code.
/// `deflate` produces the zlib-wrapped stream HTTP clients expect.
pub fn compress(encoding: Encoding, input: &[u8]) -> io::Result<Vec<u8>> {
    match encoding {
        Encoding::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
            encoder.write_all(input)?;
            encoder.finish()
        }
        Encoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
            encoder.write_all(input)?;
            encoder.finish()
        }
        Encoding::Brotli => {
            let mut output = Vec::new();
            brotli::BrotliCompress(
                &mut Cursor::new(input),
                &mut output,
                &brotli::enc::BrotliEncoderParams {
                    quality: 11,
                    lgwin: BROTLI_WINDOW,
                    ..Default::default()
                },
            )?;
            Ok(output)
        }
    }
}

/// Percentage of the raw size saved by the compressed form
pub fn savings_percent(raw_len: usize, compressed_len: usize) -> f64 {
    if raw_len == 0 {
        return 0.0;
    }
    (raw_len as f64 - compressed_len as f64) / raw_len as f64 * 100.0
}

/// Whether a variant is strictly smaller and saves strictly more than `min_percent`
pub fn worth_keeping(raw_len: usize, compressed_len: usize, min_percent: f32) -> bool {
    compressed_len < raw_len && savings_percent(raw_len, compressed_len) > f64::from(min_percent)
}
