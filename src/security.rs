//! Sanitization of untrusted upstream HTML
//!
//! Upstream HTML is untrusted input: it may carry scripts, event handlers,
//! and URLs that execute code when pasted into another context. The emitter
//! consults this module for every element and URL it is about to render, so
//! sanitization happens during traversal rather than as a separate DOM
//! mutation pass.
//!
//! Layers:
//!
//! 1. Element removal: script/style/iframe-class elements and all their
//!    descendants never contribute output
//! 2. Attribute removal: any attribute whose name starts with `on`
//! 3. URL scheme filtering: `javascript:`, `data:`, `vbscript:`, `file:`,
//!    `about:` are dropped from links and images
//! 4. Nesting-depth cap against stack exhaustion
//!
//! html5ever prevents XXE by construction: HTML5 has no external entities,
//! and DOCTYPE declarations are parsed but never processed for entity
//! definitions.

use crate::error::ConversionError;

/// Maximum allowed nesting depth for HTML elements
const MAX_NESTING_DEPTH: usize = 1000;

/// Elements removed together with all of their descendants
const DANGEROUS_ELEMENTS: &[&str] = &[
    "script",   // JavaScript execution
    "style",    // CSS injection (can contain expressions)
    "noscript", // Alternative content, not needed for Markdown
    "iframe",   // Can load external content
    "object",   // Can execute plugins
    "embed",    // Can execute plugins
    "applet",   // Legacy Java applets
    "link",     // Can load external stylesheets with expressions
    "base",     // Can change base URL for all relative URLs
];

/// URL schemes blocked in href/src values
const DANGEROUS_URL_SCHEMES: &[&str] = &[
    "javascript:", // JavaScript execution
    "data:",       // Can contain executable content
    "vbscript:",   // VBScript execution (legacy IE)
    "file:",       // Local file access (SSRF)
    "about:",      // Browser internal URLs
];

/// Action to take for an element under sanitization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeAction {
    /// Render the element normally
    Allow,
    /// Skip the element and all its children
    Remove,
}

/// Sanitization policy consulted by the Markdown emitter.
pub struct SecurityValidator {
    max_depth: usize,
}

impl SecurityValidator {
    pub fn new() -> Self {
        Self {
            max_depth: MAX_NESTING_DEPTH,
        }
    }

    /// Override the maximum nesting depth (tests use small values).
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Decide what to do with an element.
    ///
    /// # Examples
    ///
    /// ```
    /// use markdown_filter::security::{SecurityValidator, SanitizeAction};
    ///
    /// let validator = SecurityValidator::new();
    /// assert_eq!(validator.check_element("script"), SanitizeAction::Remove);
    /// assert_eq!(validator.check_element("div"), SanitizeAction::Allow);
    /// ```
    pub fn check_element(&self, tag_name: &str) -> SanitizeAction {
        if DANGEROUS_ELEMENTS.contains(&tag_name) {
            SanitizeAction::Remove
        } else {
            SanitizeAction::Allow
        }
    }

    /// Whether an attribute is an event handler. Matches any name starting
    /// with `on`, case-insensitively, which covers the full (and growing)
    /// set of DOM event attributes.
    pub fn is_event_handler(&self, attr_name: &str) -> bool {
        attr_name.len() >= 2 && attr_name[..2].eq_ignore_ascii_case("on")
    }

    /// Whether a URL uses a blocked scheme. Leading whitespace and case are
    /// ignored, matching how browsers tolerate `  JavaScript:`.
    pub fn is_dangerous_url(&self, url: &str) -> bool {
        let url_lower = url.trim().to_lowercase();
        DANGEROUS_URL_SCHEMES
            .iter()
            .any(|scheme| url_lower.starts_with(scheme))
    }

    /// Enforce the nesting-depth cap.
    pub fn validate_depth(&self, depth: usize) -> Result<(), ConversionError> {
        if depth > self.max_depth {
            Err(ConversionError::Structure(format!(
                "HTML nesting depth {} exceeds maximum allowed depth {}",
                depth, self.max_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Pass a URL through the scheme filter.
    ///
    /// Returns `None` if the URL is dangerous, `Some(url)` if safe.
    ///
    /// # Examples
    ///
    /// ```
    /// use markdown_filter::security::SecurityValidator;
    ///
    /// let validator = SecurityValidator::new();
    /// assert_eq!(validator.sanitize_url("javascript:alert('xss')"), None);
    /// assert_eq!(validator.sanitize_url("https://example.com"), Some("https://example.com"));
    /// ```
    pub fn sanitize_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        if self.is_dangerous_url(url) { None } else { Some(url) }
    }
}

impl Default for SecurityValidator {
    fn default() -> Self {
        Self::new()
    }
}
