//! Markdown content-negotiation response filter
//!
//! This library turns eligible upstream HTML responses into deterministic
//! Markdown for LLM agent consumption, driven by HTTP content negotiation:
//! clients opt in with `Accept: text/markdown`, everyone else receives the
//! unmodified upstream response. It is designed to be embedded in a
//! reverse proxy's response pipeline and performs no I/O of its own.
//!
//! # Architecture
//!
//! Two subsystems:
//!
//! - the **filter state machine** ([`filter`]): eligibility, bounded
//!   buffering, transparent decompression, conditional requests, header
//!   rewriting, and fail-open replay of the original bytes
//! - the **conversion engine** ([`engine`]): charset detection, HTML5
//!   parsing, sanitized Markdown emission, content-hash ETags, and token
//!   estimation, under a cooperative deadline
//!
//! Module map:
//!
//! - `accept`: Accept-header negotiation
//! - `auth`: authenticated-request detection
//! - `buffer`: bounded body accumulation
//! - `charset`: encoding detection cascade
//! - `conditional`: If-None-Match / If-Modified-Since evaluation
//! - `config`: directive surface with scope inheritance
//! - `converter`: DOM-to-Markdown emission
//! - `decompress`: gzip/deflate/brotli handling
//! - `eligibility`: request/response conversion gates
//! - `engine`: conversion pipeline facade
//! - `error`: failure taxonomy
//! - `etag_generator`: variant ETags via BLAKE3
//! - `filter`: per-request orchestrator
//! - `headers`: response header rewriting
//! - `metadata`: page metadata for YAML front matter
//! - `parser`: HTML5 parsing via html5ever
//! - `security`: sanitization of untrusted HTML
//! - `token_estimator`: LLM token count heuristic
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
//! use markdown_filter::config::FilterConfig;
//! use markdown_filter::filter::{Completion, Disposition, ResponseFilter};
//!
//! let config = Arc::new(FilterConfig { enabled: true, ..FilterConfig::default() });
//!
//! let mut request = HeaderMap::new();
//! request.insert(header::ACCEPT, HeaderValue::from_static("text/markdown"));
//! let mut filter = ResponseFilter::new(config, &Method::GET, &request);
//!
//! let mut response = HeaderMap::new();
//! response.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
//! assert_eq!(filter.on_response_headers(StatusCode::OK, &response), Disposition::Buffer);
//!
//! filter.on_chunk(b"<h1>Hello</h1><p>World</p>");
//! match filter.finish() {
//!     Completion::Converted(response) => {
//!         assert!(response.body().starts_with(b"# Hello"));
//!     }
//!     other => panic!("unexpected completion: {}", other.kind()),
//! }
//! ```

pub mod accept;
pub mod auth;
pub mod buffer;
pub mod charset;
pub mod conditional;
pub mod config;
pub mod converter;
pub mod decompress;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod etag_generator;
pub mod filter;
pub mod headers;
pub mod metadata;
pub mod parser;
pub mod security;
pub mod token_estimator;

// Re-export the host-facing surface for convenience
pub use config::{ConfigOverlay, FilterConfig, MarkdownFlavor};
pub use engine::{ConversionEngine, ConversionOutcome};
pub use error::ConversionError;
pub use filter::{ChunkOutcome, Completion, Disposition, FilterState, ResponseFilter};
