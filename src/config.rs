//! Per-request filter configuration
//!
//! The host server parses its own directive syntax and hands the filter an
//! effective [`FilterConfig`]. Directives are scoped (server / location /
//! nested location in NGINX terms); the scope chain is modeled here as a
//! stack of [`ConfigOverlay`] values folded over the defaults. Scalar
//! settings inherit when unset in a child scope; list-valued settings
//! replace the inherited list wholesale when set.
//!
//! A `FilterConfig` is immutable once built. Reconfiguration produces a new
//! value used by subsequent requests; in-flight requests keep the snapshot
//! they started with.

use std::time::Duration;

/// Markdown flavor selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkdownFlavor {
    /// CommonMark baseline
    CommonMark,
    /// GitHub Flavored Markdown (adds tables and strikethrough)
    GitHubFlavoredMarkdown,
}

/// What to do when conversion fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStrategy {
    /// Replay the original upstream response (fail-open)
    Pass,
    /// Emit a 502 Bad Gateway (fail-closed)
    Reject,
}

/// Whether authenticated requests are eligible for conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    Allow,
    Deny,
}

/// Conditional-request handling level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalMode {
    /// Honor both `If-None-Match` and `If-Modified-Since`
    FullSupport,
    /// Only honor `If-Modified-Since`; skips ETag work and can decide 304
    /// before converting
    IfModifiedSinceOnly,
    /// Always answer 200
    Disabled,
}

/// Cookie name pattern: exact match or literal prefix followed by `*`
///
/// Matching is case-sensitive, mirroring cookie-name semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePattern {
    prefix: String,
    glob: bool,
}

impl CookiePattern {
    /// Parse a pattern string. A trailing `*` makes it a prefix glob;
    /// anywhere else `*` is literal.
    pub fn parse(pattern: &str) -> Self {
        if let Some(prefix) = pattern.strip_suffix('*') {
            Self {
                prefix: prefix.to_string(),
                glob: true,
            }
        } else {
            Self {
                prefix: pattern.to_string(),
                glob: false,
            }
        }
    }

    /// Check whether a cookie name matches this pattern.
    pub fn matches(&self, name: &str) -> bool {
        if self.glob {
            name.starts_with(self.prefix.as_str())
        } else {
            name == self.prefix
        }
    }
}

/// A `type/subtype` media type with parameters stripped, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    essence: String,
}

impl MediaType {
    /// Parse a media type. Returns `None` when the value has no `/`.
    pub fn parse(value: &str) -> Option<Self> {
        let essence = value.split(';').next().unwrap_or("").trim();
        if !essence.contains('/') || essence.starts_with('/') || essence.ends_with('/') {
            return None;
        }
        Some(Self {
            essence: essence.to_ascii_lowercase(),
        })
    }

    /// Compare against a raw `Content-Type` header value (parameters are
    /// stripped from the header value before comparison).
    pub fn matches_content_type(&self, content_type: &str) -> bool {
        let essence = content_type.split(';').next().unwrap_or("").trim();
        essence.eq_ignore_ascii_case(&self.essence)
    }

    /// The normalized `type/subtype` string.
    pub fn essence(&self) -> &str {
        &self.essence
    }
}

/// Effective per-request configuration
///
/// All fields have defaults matching an unconfigured scope; the filter is
/// off unless `enabled` is set somewhere along the scope chain.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Master switch
    pub enabled: bool,
    /// Maximum (decompressed) body size eligible for conversion, in bytes
    pub max_size: u64,
    /// Cooperative conversion deadline; `Duration::ZERO` disables it
    pub timeout: Duration,
    /// Fail-open vs fail-closed on conversion failure
    pub on_error: ErrorStrategy,
    /// Markdown output flavor
    pub flavor: MarkdownFlavor,
    /// Emit `X-Markdown-Tokens` on converted responses
    pub token_estimate: bool,
    /// Prepend YAML front matter with extracted page metadata
    pub front_matter: bool,
    /// Let `*/*` and `text/*` count as a request for Markdown
    pub on_wildcard: bool,
    /// Whether authenticated requests may be converted
    pub auth_policy: AuthPolicy,
    /// Cookie names (exact or `prefix*`) that mark a request authenticated
    pub auth_cookies: Vec<CookiePattern>,
    /// Set the Markdown variant's ETag on converted responses
    pub generate_etag: bool,
    /// Conditional-request handling level
    pub conditional_requests: ConditionalMode,
    /// Buffer responses that arrive without a declared length
    pub buffer_chunked: bool,
    /// Content types that always bypass conversion (exact `type/subtype`)
    pub stream_types: Vec<MediaType>,
    /// Transparently decompress gzip/deflate/br upstream bodies
    pub auto_decompress: bool,
}

/// Default eligible body size: 10 MiB.
pub const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;

/// Default cooperative conversion deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size: DEFAULT_MAX_SIZE,
            timeout: DEFAULT_TIMEOUT,
            on_error: ErrorStrategy::Pass,
            flavor: MarkdownFlavor::CommonMark,
            token_estimate: false,
            front_matter: false,
            on_wildcard: false,
            auth_policy: AuthPolicy::Allow,
            auth_cookies: Vec::new(),
            generate_etag: true,
            conditional_requests: ConditionalMode::FullSupport,
            buffer_chunked: true,
            stream_types: Vec::new(),
            auto_decompress: true,
        }
    }
}

impl FilterConfig {
    /// Fold a scope chain (outermost first) over the defaults.
    pub fn effective(overlays: &[ConfigOverlay]) -> Self {
        let mut config = Self::default();
        for overlay in overlays {
            overlay.apply(&mut config);
        }
        config
    }
}

/// A partially-specified scope: unset fields inherit from the parent.
///
/// List-valued fields (`auth_cookies`, `stream_types`) are all-or-nothing:
/// when set, the child list replaces the inherited one completely.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverlay {
    pub enabled: Option<bool>,
    pub max_size: Option<u64>,
    pub timeout: Option<Duration>,
    pub on_error: Option<ErrorStrategy>,
    pub flavor: Option<MarkdownFlavor>,
    pub token_estimate: Option<bool>,
    pub front_matter: Option<bool>,
    pub on_wildcard: Option<bool>,
    pub auth_policy: Option<AuthPolicy>,
    pub auth_cookies: Option<Vec<CookiePattern>>,
    pub generate_etag: Option<bool>,
    pub conditional_requests: Option<ConditionalMode>,
    pub buffer_chunked: Option<bool>,
    pub stream_types: Option<Vec<MediaType>>,
    pub auto_decompress: Option<bool>,
}

impl ConfigOverlay {
    /// Apply this overlay on top of an inherited configuration.
    pub fn apply(&self, config: &mut FilterConfig) {
        if let Some(v) = self.enabled {
            config.enabled = v;
        }
        if let Some(v) = self.max_size {
            config.max_size = v;
        }
        if let Some(v) = self.timeout {
            config.timeout = v;
        }
        if let Some(v) = self.on_error {
            config.on_error = v;
        }
        if let Some(v) = self.flavor {
            config.flavor = v;
        }
        if let Some(v) = self.token_estimate {
            config.token_estimate = v;
        }
        if let Some(v) = self.front_matter {
            config.front_matter = v;
        }
        if let Some(v) = self.on_wildcard {
            config.on_wildcard = v;
        }
        if let Some(v) = self.auth_policy {
            config.auth_policy = v;
        }
        if let Some(ref v) = self.auth_cookies {
            config.auth_cookies = v.clone();
        }
        if let Some(v) = self.generate_etag {
            config.generate_etag = v;
        }
        if let Some(v) = self.conditional_requests {
            config.conditional_requests = v;
        }
        if let Some(v) = self.buffer_chunked {
            config.buffer_chunked = v;
        }
        if let Some(ref v) = self.stream_types {
            config.stream_types = v.clone();
        }
        if let Some(v) = self.auto_decompress {
            config.auto_decompress = v;
        }
    }
}
