//! Conversion engine facade
//!
//! One call takes upstream HTML bytes through the full pipeline: charset
//! detection, parsing, sanitized Markdown emission, and the optional ETag
//! and token-count derivations. The filter orchestrator drives it per
//! request, but it is equally usable standalone (batch conversion, corpus
//! tooling) since it has no HTTP dependencies.
//!
//! The predecessor of this module was a C-compatible FFI surface; with the
//! filter in the same language the result is a plain record.

use std::time::Duration;

use crate::config::{ConditionalMode, FilterConfig, MarkdownFlavor};
use crate::converter::{ConversionContext, ConversionOptions, MarkdownConverter};
use crate::error::ConversionError;
use crate::etag_generator::ETagGenerator;
use crate::parser::parse_html_with_charset;
use crate::token_estimator::TokenEstimator;

/// Result of one successful conversion: a plain record.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOutcome {
    /// Normalized Markdown, UTF-8, ending with exactly one LF
    pub markdown: String,
    /// Strong ETag over the Markdown bytes, when requested
    pub etag: Option<String>,
    /// Heuristic LLM token count of the output, when requested
    pub token_estimate: Option<u32>,
}

/// Pipeline settings for one conversion.
#[derive(Debug, Clone)]
pub struct ConversionEngine {
    flavor: MarkdownFlavor,
    front_matter: bool,
    base_url: Option<String>,
    timeout: Duration,
    generate_etag: bool,
    estimate_tokens: bool,
}

impl ConversionEngine {
    /// Build an engine from scratch with defaults (CommonMark, 5 s
    /// deadline, ETag on, tokens off).
    pub fn new() -> Self {
        Self {
            flavor: MarkdownFlavor::CommonMark,
            front_matter: false,
            base_url: None,
            timeout: crate::config::DEFAULT_TIMEOUT,
            generate_etag: true,
            estimate_tokens: false,
        }
    }

    /// Build an engine matching a filter configuration.
    ///
    /// The ETag is also computed when `conditional_requests` is
    /// `full_support`, since the conditional evaluator compares against it
    /// even if the header itself is suppressed.
    pub fn from_config(config: &FilterConfig, base_url: Option<String>) -> Self {
        Self {
            flavor: config.flavor,
            front_matter: config.front_matter,
            base_url,
            timeout: config.timeout,
            generate_etag: config.generate_etag
                || config.conditional_requests == ConditionalMode::FullSupport,
            estimate_tokens: config.token_estimate,
        }
    }

    pub fn flavor(mut self, flavor: MarkdownFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    pub fn front_matter(mut self, enabled: bool) -> Self {
        self.front_matter = enabled;
        self
    }

    pub fn base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    /// `Duration::ZERO` disables the deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn generate_etag(mut self, enabled: bool) -> Self {
        self.generate_etag = enabled;
        self
    }

    pub fn estimate_tokens(mut self, enabled: bool) -> Self {
        self.estimate_tokens = enabled;
        self
    }

    /// Convert HTML bytes to Markdown.
    ///
    /// `content_type` is the upstream `Content-Type` header value, used for
    /// charset detection; pass `None` when unavailable.
    pub fn convert(
        &self,
        html: &[u8],
        content_type: Option<&str>,
    ) -> Result<ConversionOutcome, ConversionError> {
        let mut ctx = ConversionContext::new(self.timeout);

        let dom = parse_html_with_charset(html, content_type)?;
        ctx.check_deadline()?;

        let converter = MarkdownConverter::with_options(ConversionOptions {
            flavor: self.flavor,
            front_matter: self.front_matter,
            base_url: self.base_url.clone(),
            resolve_relative_urls: true,
        });
        let markdown = converter.convert_with_context(&dom, &mut ctx)?;

        let etag = self
            .generate_etag
            .then(|| ETagGenerator::new().generate(markdown.as_bytes()));
        let token_estimate = self
            .estimate_tokens
            .then(|| TokenEstimator::new().estimate(&markdown));

        log::debug!(
            "conversion ok: {} bytes html -> {} bytes markdown, {} nodes, {:?} elapsed",
            html.len(),
            markdown.len(),
            ctx.node_count(),
            ctx.elapsed()
        );

        Ok(ConversionOutcome {
            markdown,
            etag,
            token_estimate,
        })
    }
}

impl Default for ConversionEngine {
    fn default() -> Self {
        Self::new()
    }
}
