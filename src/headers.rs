//! Response header rewriting
//!
//! A converted response is a different representation of the resource, and
//! every header describing the old representation has to be replaced or
//! removed before the body starts. The full contract for a converted 200:
//!
//! 1. `Content-Type: text/markdown; charset=utf-8`
//! 2. `Vary` contains `Accept` (the response now varies by negotiation)
//! 3. `Content-Length` matches the Markdown byte length; any chunked
//!    `Transfer-Encoding` is dropped and framing is left to the transport
//! 4. the upstream `ETag` is replaced by the variant ETag (or removed)
//! 5. no `Content-Encoding` (output is plain UTF-8)
//! 6. no `Accept-Ranges` (range replies on converted variants are off)
//! 7. `X-Markdown-Tokens` when token estimation is enabled
//! 8. `Cache-Control`, `Last-Modified`, and `Set-Cookie` pass through,
//!    except that authenticated responses are forced into private cache
//!    scope (never downgrading an existing `no-store`)

use http::header::{
    ACCEPT_RANGES, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, ETAG,
    HeaderName, TRANSFER_ENCODING, VARY,
};
use http::{HeaderMap, HeaderValue};

/// Token-estimate response header.
pub const X_MARKDOWN_TOKENS: HeaderName = HeaderName::from_static("x-markdown-tokens");

/// Content type of every converted response.
pub const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

/// Apply the converted-200 header contract in place.
pub fn rewrite_converted(
    headers: &mut HeaderMap,
    markdown_len: usize,
    etag: Option<&str>,
    token_estimate: Option<u32>,
    authenticated: bool,
) {
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(MARKDOWN_CONTENT_TYPE));

    ensure_vary_accept(headers);

    headers.insert(CONTENT_LENGTH, HeaderValue::from(markdown_len as u64));
    headers.remove(TRANSFER_ENCODING);

    headers.remove(ETAG);
    if let Some(etag) = etag
        && let Ok(value) = HeaderValue::from_str(etag)
    {
        headers.insert(ETAG, value);
    }

    headers.remove(CONTENT_ENCODING);
    headers.remove(ACCEPT_RANGES);

    if let Some(count) = token_estimate {
        headers.insert(X_MARKDOWN_TOKENS, HeaderValue::from(count));
    }

    if authenticated {
        apply_private_cache_scope(headers);
    }
}

/// Make sure `Vary` lists `Accept` (case-insensitive whole-token match;
/// appended to the existing list when absent).
pub fn ensure_vary_accept(headers: &mut HeaderMap) {
    let mut tokens: Vec<String> = Vec::new();
    for value in headers.get_all(VARY) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for token in value.split(',') {
            let token = token.trim();
            if !token.is_empty() {
                tokens.push(token.to_string());
            }
        }
    }

    // `Vary: *` already covers every request header.
    if tokens
        .iter()
        .any(|t| t.eq_ignore_ascii_case("accept") || t == "*")
    {
        return;
    }

    tokens.push("Accept".to_string());
    if let Ok(value) = HeaderValue::from_str(&tokens.join(", ")) {
        headers.insert(VARY, value);
    }
}

/// Force private cache scope for an authenticated response.
///
/// - no `Cache-Control`: add `Cache-Control: private`
/// - `no-store` present: leave untouched (never downgrade)
/// - `private` present: already scoped
/// - otherwise: drop any `public` directive and append `private`
pub fn apply_private_cache_scope(headers: &mut HeaderMap) {
    let mut directives: Vec<String> = Vec::new();
    for value in headers.get_all(CACHE_CONTROL) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for directive in value.split(',') {
            let directive = directive.trim();
            if !directive.is_empty() {
                directives.push(directive.to_string());
            }
        }
    }

    if directives.is_empty() {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("private"));
        return;
    }

    let has = |name: &str| {
        directives.iter().any(|d| {
            d.eq_ignore_ascii_case(name)
                || d.len() > name.len()
                    && d[..name.len()].eq_ignore_ascii_case(name)
                    && d.as_bytes()[name.len()] == b'='
        })
    };

    if has("no-store") || has("private") {
        return;
    }

    directives.retain(|d| !d.eq_ignore_ascii_case("public"));
    directives.push("private".to_string());

    if let Ok(value) = HeaderValue::from_str(&directives.join(", ")) {
        headers.insert(CACHE_CONTROL, value);
    }
}

/// Clear entity headers for a 304, keeping the validator (`ETag`,
/// `Last-Modified`), `Vary`, and cache directives.
pub fn strip_entity_headers_for_304(headers: &mut HeaderMap) {
    headers.remove(CONTENT_TYPE);
    headers.remove(CONTENT_LENGTH);
    headers.remove(CONTENT_ENCODING);
    headers.remove(TRANSFER_ENCODING);
    headers.remove(ACCEPT_RANGES);
}
