//! Filter orchestrator
//!
//! Per-request state machine tying negotiation, eligibility, buffering,
//! decompression, conversion, conditional evaluation, and header rewriting
//! together. The filter is sans-io: the host server feeds it the request
//! head, the upstream response head, and body chunks, and acts on the
//! returned decisions. It performs no I/O and holds no state beyond the
//! single request it was created for.
//!
//! ```text
//! HeadersPending --response headers--> Buffering | Bypassed
//! Buffering --chunk--> Buffering | Bypassed (size overrun)
//! Buffering --finish--> Converting --> Emitting | Failed
//! ```
//!
//! Buffering is the commitment point: nothing is sent downstream until the
//! conversion outcome is known, so a failure can always fall back to the
//! byte-identical original (fail-open) or a clean 502 (fail-closed). Once
//! a converted 200 is emitted there is no path back to the original bytes.
//!
//! # Host contract
//!
//! - Call [`ResponseFilter::on_response_headers`] once; on
//!   [`Disposition::Bypass`] forward the upstream response untouched and
//!   drop the filter.
//! - On [`Disposition::Buffer`], withhold the response head and feed every
//!   body chunk to [`ResponseFilter::on_chunk`]. Each chunk is consumed
//!   synchronously; the host may recycle its buffer as soon as the call
//!   returns.
//! - [`ChunkOutcome::Overflowed`] means the size budget was crossed:
//!   replay [`ResponseFilter::take_original`] downstream with the original
//!   head, then forward the overflowing chunk and the rest of the stream.
//! - After the last chunk, call [`ResponseFilter::finish`] and send the
//!   returned response.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{
    CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED,
};
use http::{HeaderMap, HeaderValue, Method, Response, StatusCode};

use crate::accept;
use crate::auth;
use crate::buffer::BodyAccumulator;
use crate::conditional::{self, ConditionalDecision};
use crate::config::{ConditionalMode, ErrorStrategy, FilterConfig};
use crate::decompress::{self, ContentCoding};
use crate::eligibility::{self, BypassReason};
use crate::engine::ConversionEngine;
use crate::error::ConversionError;
use crate::headers;

/// Lifecycle of one filtered request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// Waiting for the upstream response head
    HeadersPending,
    /// Accumulating upstream body chunks
    Buffering,
    /// Conversion in progress (transient within `finish`)
    Converting,
    /// A converted or 304 response has been produced
    Emitting,
    /// Forwarding the upstream response unchanged
    Bypassed,
    /// Conversion failed; fail-open or fail-closed response produced
    Failed,
}

/// Header-phase decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Buffer the body through the filter
    Buffer,
    /// Forward the upstream response untouched
    Bypass(BypassReason),
}

/// Body-phase decision for one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Chunk fully consumed into the buffer
    Buffered,
    /// Size budget crossed; the offending chunk was not consumed. Replay
    /// the buffered original and stream the remainder.
    Overflowed,
}

/// Final response produced by [`ResponseFilter::finish`].
#[derive(Debug)]
pub enum Completion {
    /// Converted representation (200; body empty for HEAD)
    Converted(Response<Bytes>),
    /// Client cache is current (304)
    NotModified(Response<Bytes>),
    /// Fail-open replay of the original upstream response
    Passthrough(Response<Bytes>),
    /// Fail-closed error reply (502)
    Rejected(Response<Bytes>),
}

impl Completion {
    /// Label for log records.
    pub fn kind(&self) -> &'static str {
        match self {
            Completion::Converted(_) => "converted",
            Completion::NotModified(_) => "not_modified",
            Completion::Passthrough(_) => "passthrough",
            Completion::Rejected(_) => "rejected",
        }
    }

    /// Unwrap into the response to send, whichever variant was produced.
    pub fn into_response(self) -> Response<Bytes> {
        match self {
            Completion::Converted(r)
            | Completion::NotModified(r)
            | Completion::Passthrough(r)
            | Completion::Rejected(r) => r,
        }
    }
}

/// Snapshot of the upstream response head, taken before any mutation.
#[derive(Debug)]
struct UpstreamHead {
    headers: HeaderMap,
}

/// Per-request response filter.
///
/// Created at request-header time, consumed by [`ResponseFilter::finish`]
/// (or dropped on bypass). No state survives the request.
pub struct ResponseFilter {
    config: Arc<FilterConfig>,
    method: Method,
    markdown_requested: bool,
    authenticated: bool,
    /// If-None-Match / If-Modified-Since, copied from the request
    conditional_headers: HeaderMap,
    base_url: Option<String>,
    state: FilterState,
    request_bypass: Option<BypassReason>,
    coding: ContentCoding,
    original: Option<BodyAccumulator>,
    upstream: Option<UpstreamHead>,
}

impl ResponseFilter {
    /// Run the request phase: Accept negotiation, auth classification, and
    /// the request-side eligibility gate.
    pub fn new(config: Arc<FilterConfig>, method: &Method, request_headers: &HeaderMap) -> Self {
        let markdown_requested =
            config.enabled && accept::markdown_requested(request_headers, config.on_wildcard);
        let authenticated = auth::is_authenticated(request_headers, &config.auth_cookies);
        let request_bypass = eligibility::check_request(
            &config,
            method,
            request_headers,
            markdown_requested,
            authenticated,
        );

        let mut conditional_headers = HeaderMap::new();
        for name in [IF_NONE_MATCH, IF_MODIFIED_SINCE] {
            for value in request_headers.get_all(&name) {
                conditional_headers.append(name.clone(), value.clone());
            }
        }

        Self {
            config,
            method: method.clone(),
            markdown_requested,
            authenticated,
            conditional_headers,
            base_url: None,
            state: FilterState::HeadersPending,
            request_bypass,
            coding: ContentCoding::Identity,
            original: None,
            upstream: None,
        }
    }

    /// Absolute URL of the requested page, used for relative-URL
    /// resolution in front matter metadata.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    /// Whether the client negotiated the Markdown variant. Hosts can use
    /// this to skip filter installation entirely.
    pub fn markdown_requested(&self) -> bool {
        self.markdown_requested
    }

    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    /// Response-header phase: re-evaluate eligibility against the upstream
    /// head and decide between buffering and bypass.
    pub fn on_response_headers(&mut self, status: StatusCode, headers: &HeaderMap) -> Disposition {
        if let Some(reason) = self.request_bypass {
            self.state = FilterState::Bypassed;
            if reason != BypassReason::Disabled && reason != BypassReason::NotRequested {
                log::debug!("markdown filter bypass: {}", reason.as_str());
            }
            return Disposition::Bypass(reason);
        }

        if let Some(reason) = eligibility::check_response(&self.config, status, headers) {
            self.state = FilterState::Bypassed;
            log::debug!("markdown filter bypass: {}", reason.as_str());
            return Disposition::Bypass(reason);
        }

        self.coding = headers
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .and_then(ContentCoding::from_header)
            .unwrap_or(ContentCoding::Identity);

        self.upstream = Some(UpstreamHead {
            headers: headers.clone(),
        });
        self.original = Some(BodyAccumulator::new(self.config.max_size as usize));
        self.state = FilterState::Buffering;
        log::debug!(
            "markdown filter engaged (coding={}, declared_length={:?})",
            self.coding.as_str(),
            headers.get(CONTENT_LENGTH).and_then(|v| v.to_str().ok())
        );

        Disposition::Buffer
    }

    /// Body phase: consume one upstream chunk.
    pub fn on_chunk(&mut self, chunk: &[u8]) -> ChunkOutcome {
        if self.state != FilterState::Buffering {
            return ChunkOutcome::Overflowed;
        }
        let Some(accumulator) = self.original.as_mut() else {
            return ChunkOutcome::Overflowed;
        };

        match accumulator.push(chunk) {
            Ok(()) => ChunkOutcome::Buffered,
            Err(err) => {
                self.state = FilterState::Bypassed;
                log::warn!(
                    "markdown filter bypass (category={}): {}",
                    err.category(),
                    err
                );
                ChunkOutcome::Overflowed
            }
        }
    }

    /// Exact upstream bytes buffered so far, for replay after a bypass or
    /// overflow. Leaves the filter empty.
    pub fn take_original(&mut self) -> Bytes {
        self.original
            .take()
            .map(BodyAccumulator::into_bytes)
            .unwrap_or_default()
    }

    /// End of the upstream body: convert and produce the final response.
    pub fn finish(mut self) -> Completion {
        let Some(upstream) = self.upstream.take() else {
            return self.fail(
                ConversionError::Internal("finish called before response headers".to_string()),
                HeaderMap::new(),
                Bytes::new(),
            );
        };
        let original = self
            .original
            .take()
            .map(BodyAccumulator::into_bytes)
            .unwrap_or_default();
        self.state = FilterState::Converting;

        let last_modified = upstream
            .headers
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        // The if_modified_since_only escape hatch: when the date check
        // already says 304, skip conversion entirely.
        if self.config.conditional_requests == ConditionalMode::IfModifiedSinceOnly
            && conditional::evaluate_if_modified_since(
                &self.conditional_headers,
                last_modified.as_deref(),
            ) == ConditionalDecision::NotModified
        {
            return self.not_modified(upstream.headers, None);
        }

        let content_type = upstream
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = if self.coding.is_identity() {
            original.clone()
        } else {
            match decompress::decompress(self.coding, &original, self.config.max_size as usize) {
                Ok(inflated) => {
                    log::debug!(
                        "decompressed {} body: {} -> {} bytes",
                        self.coding.as_str(),
                        original.len(),
                        inflated.len()
                    );
                    Bytes::from(inflated)
                }
                Err(err) => return self.fail(err, upstream.headers, original),
            }
        };

        let engine = ConversionEngine::from_config(&self.config, self.base_url.clone());
        let outcome = match engine.convert(&body, content_type.as_deref()) {
            Ok(outcome) => outcome,
            Err(err) => return self.fail(err, upstream.headers, original),
        };

        let decision = conditional::evaluate(
            self.config.conditional_requests,
            &self.conditional_headers,
            outcome.etag.as_deref(),
            last_modified.as_deref(),
        );
        if decision == ConditionalDecision::NotModified {
            let etag = if self.config.generate_etag {
                outcome.etag
            } else {
                None
            };
            return self.not_modified(upstream.headers, etag.as_deref());
        }

        // Commitment point: from here on the converted representation is
        // the response.
        self.state = FilterState::Emitting;
        let mut response_headers = upstream.headers;
        let etag = if self.config.generate_etag {
            outcome.etag.as_deref()
        } else {
            None
        };
        headers::rewrite_converted(
            &mut response_headers,
            outcome.markdown.len(),
            etag,
            outcome.token_estimate,
            self.authenticated,
        );

        let body = if self.method == Method::HEAD {
            Bytes::new()
        } else {
            Bytes::from(outcome.markdown)
        };

        Completion::Converted(build_response(StatusCode::OK, response_headers, body))
    }

    /// Produce a 304 for the Markdown variant: entity headers cleared,
    /// validator and `Vary` retained.
    fn not_modified(mut self, mut response_headers: HeaderMap, etag: Option<&str>) -> Completion {
        self.state = FilterState::Emitting;

        headers::strip_entity_headers_for_304(&mut response_headers);
        response_headers.remove(ETAG);
        if let Some(etag) = etag
            && let Ok(value) = HeaderValue::from_str(etag)
        {
            response_headers.insert(ETAG, value);
        }
        headers::ensure_vary_accept(&mut response_headers);

        Completion::NotModified(build_response(
            StatusCode::NOT_MODIFIED,
            response_headers,
            Bytes::new(),
        ))
    }

    /// Route a failure through the configured error strategy.
    fn fail(
        &mut self,
        error: ConversionError,
        original_headers: HeaderMap,
        original_body: Bytes,
    ) -> Completion {
        self.state = FilterState::Failed;
        log::warn!(
            "markdown conversion failed (category={}): {}",
            error.category(),
            error
        );

        match self.config.on_error {
            ErrorStrategy::Pass => Completion::Passthrough(build_response(
                StatusCode::OK,
                original_headers,
                original_body,
            )),
            ErrorStrategy::Reject => {
                let body = Bytes::from_static(b"Bad Gateway\n");
                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
                headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len() as u64));
                Completion::Rejected(build_response(StatusCode::BAD_GATEWAY, headers, body))
            }
        }
    }
}

fn build_response(status: StatusCode, headers: HeaderMap, body: Bytes) -> Response<Bytes> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
