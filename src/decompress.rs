//! Upstream body decompression
//!
//! Upstreams frequently hand the proxy pre-compressed HTML. The filter
//! buffers the compressed bytes as received (they double as the fail-open
//! replay copy) and inflates them in one step before parsing. Output is
//! capped: a stream that inflates past the configured size limit is treated
//! as corrupt rather than truncated.
//!
//! Supported codings mirror what real upstreams send: gzip, deflate (zlib
//! wrapper), and brotli. Anything else fails eligibility upstream of this
//! module, so the body passes through unconverted.

use std::io::Read;

use crate::error::ConversionError;

/// Content coding of an upstream body, from its `Content-Encoding` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    Identity,
    Gzip,
    Deflate,
    Brotli,
}

impl ContentCoding {
    /// Parse a `Content-Encoding` header value. Returns `None` for unknown
    /// codings and for multi-coding chains (`gzip, br`), which the filter
    /// does not undo.
    pub fn from_header(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.contains(',') {
            return None;
        }
        if value.is_empty() || value.eq_ignore_ascii_case("identity") {
            Some(ContentCoding::Identity)
        } else if value.eq_ignore_ascii_case("gzip") || value.eq_ignore_ascii_case("x-gzip") {
            Some(ContentCoding::Gzip)
        } else if value.eq_ignore_ascii_case("deflate") {
            Some(ContentCoding::Deflate)
        } else if value.eq_ignore_ascii_case("br") {
            Some(ContentCoding::Brotli)
        } else {
            None
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, ContentCoding::Identity)
    }

    /// Label used in log records.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCoding::Identity => "identity",
            ContentCoding::Gzip => "gzip",
            ContentCoding::Deflate => "deflate",
            ContentCoding::Brotli => "br",
        }
    }
}

/// Inflate a complete compressed body, capping the output at `limit` bytes.
///
/// Corrupt streams and streams that inflate past the cap both yield
/// `ConversionError::Decompress`.
pub fn decompress(
    coding: ContentCoding,
    input: &[u8],
    limit: usize,
) -> Result<Vec<u8>, ConversionError> {
    match coding {
        ContentCoding::Identity => Ok(input.to_vec()),
        ContentCoding::Gzip => {
            read_capped(flate2::read::GzDecoder::new(input), limit, "gzip")
        }
        ContentCoding::Deflate => {
            read_capped(flate2::read::ZlibDecoder::new(input), limit, "deflate")
        }
        ContentCoding::Brotli => {
            read_capped(brotli::Decompressor::new(input, 4096), limit, "br")
        }
    }
}

/// Drain a decoder into a Vec, enforcing the output cap without ever
/// holding more than `limit` decoded bytes.
fn read_capped<R: Read>(
    mut decoder: R,
    limit: usize,
    coding: &str,
) -> Result<Vec<u8>, ConversionError> {
    let mut output = Vec::new();
    let mut chunk = [0u8; 16 * 1024];

    loop {
        let n = decoder.read(&mut chunk).map_err(|e| {
            ConversionError::Decompress(format!("corrupt {} stream: {}", coding, e))
        })?;
        if n == 0 {
            return Ok(output);
        }
        if output.len() + n > limit {
            return Err(ConversionError::Decompress(format!(
                "{} stream inflates past {} bytes",
                coding, limit
            )));
        }
        output.extend_from_slice(&chunk[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn br(data: &[u8]) -> Vec<u8> {
        let mut output = Vec::new();
        let params = brotli::enc::BrotliEncoderParams::default();
        brotli::BrotliCompress(&mut &data[..], &mut output, &params).unwrap();
        output
    }

    #[test]
    fn test_coding_parse() {
        assert_eq!(ContentCoding::from_header("gzip"), Some(ContentCoding::Gzip));
        assert_eq!(
            ContentCoding::from_header("GZIP"),
            Some(ContentCoding::Gzip)
        );
        assert_eq!(
            ContentCoding::from_header("x-gzip"),
            Some(ContentCoding::Gzip)
        );
        assert_eq!(
            ContentCoding::from_header("deflate"),
            Some(ContentCoding::Deflate)
        );
        assert_eq!(ContentCoding::from_header("br"), Some(ContentCoding::Brotli));
        assert_eq!(
            ContentCoding::from_header("identity"),
            Some(ContentCoding::Identity)
        );
        assert_eq!(ContentCoding::from_header(""), Some(ContentCoding::Identity));
        assert_eq!(ContentCoding::from_header("zstd"), None);
        assert_eq!(ContentCoding::from_header("gzip, br"), None);
    }

    #[test]
    fn test_gzip_round_trip() {
        let html = b"<html><body><h1>Hello</h1></body></html>";
        let inflated = decompress(ContentCoding::Gzip, &gzip(html), 1024).unwrap();
        assert_eq!(inflated, html);
    }

    #[test]
    fn test_deflate_round_trip() {
        let html = b"<p>deflated</p>";
        let inflated = decompress(ContentCoding::Deflate, &zlib(html), 1024).unwrap();
        assert_eq!(inflated, html);
    }

    #[test]
    fn test_brotli_round_trip() {
        let html = b"<p>brotli</p>";
        let inflated = decompress(ContentCoding::Brotli, &br(html), 1024).unwrap();
        assert_eq!(inflated, html);
    }

    #[test]
    fn test_identity_copies_input() {
        let body = b"plain bytes";
        assert_eq!(
            decompress(ContentCoding::Identity, body, 1024).unwrap(),
            body
        );
    }

    #[test]
    fn test_corrupt_stream() {
        let err = decompress(ContentCoding::Gzip, b"\x1f\x8bnot really gzip", 1024).unwrap_err();
        assert_eq!(err.category(), "decompress");
    }

    #[test]
    fn test_output_cap() {
        // 64 KiB of zeros compresses tiny but must not inflate past the cap.
        let compressed = gzip(&vec![0u8; 64 * 1024]);
        assert!(compressed.len() < 1024);
        let err = decompress(ContentCoding::Gzip, &compressed, 1024).unwrap_err();
        assert_eq!(err.category(), "decompress");
        assert!(err.to_string().contains("inflates past"));
    }

    #[test]
    fn test_cap_is_inclusive() {
        let body = vec![7u8; 512];
        let inflated = decompress(ContentCoding::Gzip, &gzip(&body), 512).unwrap();
        assert_eq!(inflated, body);
    }
}
