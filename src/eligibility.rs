//! Conversion eligibility gate
//!
//! Two checkpoints: the request phase (method, negotiation outcome, Range,
//! auth policy) and the response phase (status, content type, encoding,
//! declared length). A single failed check yields a [`BypassReason`] and the
//! upstream response is forwarded untouched. Reasons are log labels, never
//! client-visible.

use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use http::{HeaderMap, Method, StatusCode};

use crate::config::FilterConfig;
use crate::decompress::ContentCoding;

/// Why a response was left unconverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassReason {
    /// Filter disabled in the effective configuration
    Disabled,
    /// Client did not negotiate `text/markdown`
    NotRequested,
    /// Request method outside GET/HEAD
    Method,
    /// Request carried a `Range` header
    RangeRequest,
    /// Authenticated request under `auth_policy deny`
    AuthDenied,
    /// Upstream status was not 200
    Status,
    /// Upstream already answered with a partial (`Content-Range`) body
    ContentRange,
    /// Upstream content type is not `text/html`
    ContentType,
    /// Content type is configured as a streaming type
    StreamType,
    /// Content encoding the decompressor cannot (or may not) handle
    ContentEncoding,
    /// Declared upstream length exceeds the size limit
    DeclaredTooLarge,
    /// Unframed body while chunked buffering is disabled
    Unbuffered,
    /// Accumulated body crossed the size limit mid-stream
    ResourceLimit,
}

impl BypassReason {
    /// Stable label for log records.
    pub fn as_str(&self) -> &'static str {
        match self {
            BypassReason::Disabled => "disabled",
            BypassReason::NotRequested => "not_requested",
            BypassReason::Method => "method",
            BypassReason::RangeRequest => "range_request",
            BypassReason::AuthDenied => "auth_denied",
            BypassReason::Status => "status",
            BypassReason::ContentRange => "content_range",
            BypassReason::ContentType => "content_type",
            BypassReason::StreamType => "stream_type",
            BypassReason::ContentEncoding => "content_encoding",
            BypassReason::DeclaredTooLarge => "declared_too_large",
            BypassReason::Unbuffered => "unbuffered",
            BypassReason::ResourceLimit => "resource_limit",
        }
    }
}

/// Request-phase gate. `markdown_requested` and `authenticated` come from
/// the negotiator and the auth classifier.
pub fn check_request(
    config: &FilterConfig,
    method: &Method,
    headers: &HeaderMap,
    markdown_requested: bool,
    authenticated: bool,
) -> Option<BypassReason> {
    if !config.enabled {
        return Some(BypassReason::Disabled);
    }
    if !markdown_requested {
        return Some(BypassReason::NotRequested);
    }
    if method != Method::GET && method != Method::HEAD {
        return Some(BypassReason::Method);
    }
    if headers.contains_key(RANGE) {
        return Some(BypassReason::RangeRequest);
    }
    if authenticated && config.auth_policy == crate::config::AuthPolicy::Deny {
        return Some(BypassReason::AuthDenied);
    }
    None
}

/// Response-phase gate, run once upstream headers are available.
pub fn check_response(
    config: &FilterConfig,
    status: StatusCode,
    headers: &HeaderMap,
) -> Option<BypassReason> {
    if status != StatusCode::OK {
        return Some(BypassReason::Status);
    }
    if headers.contains_key(CONTENT_RANGE) {
        return Some(BypassReason::ContentRange);
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !media_essence(content_type).eq_ignore_ascii_case("text/html") {
        return Some(BypassReason::ContentType);
    }
    if config
        .stream_types
        .iter()
        .any(|mt| mt.matches_content_type(content_type))
    {
        return Some(BypassReason::StreamType);
    }

    match headers.get(CONTENT_ENCODING) {
        None => {}
        Some(value) => {
            let value = value.to_str().unwrap_or("");
            match ContentCoding::from_header(value) {
                Some(ContentCoding::Identity) => {}
                Some(_) if config.auto_decompress => {}
                _ => return Some(BypassReason::ContentEncoding),
            }
        }
    }

    match declared_length(headers) {
        Some(length) if length > config.max_size => {
            return Some(BypassReason::DeclaredTooLarge);
        }
        Some(_) => {}
        None if !config.buffer_chunked => return Some(BypassReason::Unbuffered),
        None => {}
    }

    None
}

/// Strip parameters from a `Content-Type` value, leaving `type/subtype`.
pub fn media_essence(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or("").trim()
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthPolicy, MediaType};
    use http::HeaderValue;

    fn enabled_config() -> FilterConfig {
        FilterConfig {
            enabled: true,
            ..FilterConfig::default()
        }
    }

    fn html_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        headers
    }

    #[test]
    fn test_request_gate_accepts_get_and_head() {
        let config = enabled_config();
        let headers = HeaderMap::new();
        assert_eq!(
            check_request(&config, &Method::GET, &headers, true, false),
            None
        );
        assert_eq!(
            check_request(&config, &Method::HEAD, &headers, true, false),
            None
        );
        assert_eq!(
            check_request(&config, &Method::POST, &headers, true, false),
            Some(BypassReason::Method)
        );
    }

    #[test]
    fn test_request_gate_disabled() {
        let config = FilterConfig::default();
        assert_eq!(
            check_request(&config, &Method::GET, &HeaderMap::new(), true, false),
            Some(BypassReason::Disabled)
        );
    }

    #[test]
    fn test_request_gate_not_requested() {
        let config = enabled_config();
        assert_eq!(
            check_request(&config, &Method::GET, &HeaderMap::new(), false, false),
            Some(BypassReason::NotRequested)
        );
    }

    #[test]
    fn test_request_gate_range() {
        let config = enabled_config();
        let mut headers = HeaderMap::new();
        headers.insert(RANGE, HeaderValue::from_static("bytes=0-100"));
        assert_eq!(
            check_request(&config, &Method::GET, &headers, true, false),
            Some(BypassReason::RangeRequest)
        );
    }

    #[test]
    fn test_request_gate_auth_policy() {
        let mut config = enabled_config();
        assert_eq!(
            check_request(&config, &Method::GET, &HeaderMap::new(), true, true),
            None
        );
        config.auth_policy = AuthPolicy::Deny;
        assert_eq!(
            check_request(&config, &Method::GET, &HeaderMap::new(), true, true),
            Some(BypassReason::AuthDenied)
        );
    }

    #[test]
    fn test_response_gate_status() {
        let config = enabled_config();
        assert_eq!(
            check_response(&config, StatusCode::NOT_FOUND, &html_headers()),
            Some(BypassReason::Status)
        );
        assert_eq!(
            check_response(&config, StatusCode::PARTIAL_CONTENT, &html_headers()),
            Some(BypassReason::Status)
        );
        assert_eq!(check_response(&config, StatusCode::OK, &html_headers()), None);
    }

    #[test]
    fn test_response_gate_content_range() {
        let config = enabled_config();
        let mut headers = html_headers();
        headers.insert(
            CONTENT_RANGE,
            HeaderValue::from_static("bytes 0-99/1000"),
        );
        assert_eq!(
            check_response(&config, StatusCode::OK, &headers),
            Some(BypassReason::ContentRange)
        );
    }

    #[test]
    fn test_response_gate_content_type() {
        let config = enabled_config();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert_eq!(
            check_response(&config, StatusCode::OK, &headers),
            Some(BypassReason::ContentType)
        );

        // Parameters and case do not matter.
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("Text/HTML; charset=ISO-8859-1"),
        );
        assert_eq!(check_response(&config, StatusCode::OK, &headers), None);

        // Missing content type is not HTML.
        assert_eq!(
            check_response(&config, StatusCode::OK, &HeaderMap::new()),
            Some(BypassReason::ContentType)
        );
    }

    #[test]
    fn test_response_gate_stream_types() {
        let mut config = enabled_config();
        config.stream_types = vec![MediaType::parse("text/html").unwrap()];
        assert_eq!(
            check_response(&config, StatusCode::OK, &html_headers()),
            Some(BypassReason::StreamType)
        );
    }

    #[test]
    fn test_response_gate_content_encoding() {
        let mut config = enabled_config();
        let mut headers = html_headers();

        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        assert_eq!(check_response(&config, StatusCode::OK, &headers), None);

        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("zstd"));
        assert_eq!(
            check_response(&config, StatusCode::OK, &headers),
            Some(BypassReason::ContentEncoding)
        );

        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("identity"));
        assert_eq!(check_response(&config, StatusCode::OK, &headers), None);

        config.auto_decompress = false;
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        assert_eq!(
            check_response(&config, StatusCode::OK, &headers),
            Some(BypassReason::ContentEncoding)
        );
        // Identity still passes with auto_decompress off.
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("identity"));
        assert_eq!(check_response(&config, StatusCode::OK, &headers), None);
    }

    #[test]
    fn test_response_gate_declared_length() {
        let mut config = enabled_config();
        config.max_size = 1024;
        let mut headers = html_headers();

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1024"));
        assert_eq!(check_response(&config, StatusCode::OK, &headers), None);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1025"));
        assert_eq!(
            check_response(&config, StatusCode::OK, &headers),
            Some(BypassReason::DeclaredTooLarge)
        );
    }

    #[test]
    fn test_response_gate_unframed_body() {
        let mut config = enabled_config();
        // Default: chunked upstream bodies are buffered.
        assert_eq!(check_response(&config, StatusCode::OK, &html_headers()), None);

        config.buffer_chunked = false;
        assert_eq!(
            check_response(&config, StatusCode::OK, &html_headers()),
            Some(BypassReason::Unbuffered)
        );
    }

    #[test]
    fn test_media_essence() {
        assert_eq!(media_essence("text/html; charset=utf-8"), "text/html");
        assert_eq!(media_essence(" text/html "), "text/html");
        assert_eq!(media_essence(""), "");
    }
}
