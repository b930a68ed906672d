//! Character encoding detection
//!
//! Upstream HTML declares its encoding in up to two places, neither of
//! which is guaranteed to be present or truthful. Detection is a cascade
//! that stops at the first hit:
//!
//! 1. `charset` parameter of the upstream `Content-Type` header
//! 2. `<meta charset>` / `<meta http-equiv="Content-Type">` within the
//!    first 1024 bytes of the body
//! 3. UTF-8
//!
//! The detected name is normalized to uppercase. Whether the charset is
//! actually decodable is the parser's problem, not this module's.

use regex::Regex;
use std::sync::OnceLock;

/// Default charset when detection fails
const DEFAULT_CHARSET: &str = "UTF-8";

/// Maximum bytes to scan for meta charset tags
const META_SCAN_LIMIT: usize = 1024;

/// Detect the character encoding of an HTML body.
///
/// # Examples
///
/// ```rust
/// use markdown_filter::charset::detect_charset;
///
/// let charset = detect_charset(Some("text/html; charset=ISO-8859-1"), b"<html></html>");
/// assert_eq!(charset, "ISO-8859-1");
///
/// let html = b"<html><head><meta charset=\"utf-8\"></head></html>";
/// assert_eq!(detect_charset(None, html), "UTF-8");
///
/// assert_eq!(detect_charset(None, b"<html><body>nothing declared</body></html>"), "UTF-8");
/// ```
pub fn detect_charset(content_type: Option<&str>, html: &[u8]) -> String {
    if let Some(ct) = content_type
        && let Some(charset) = extract_charset_from_content_type(ct)
    {
        return normalize_charset(&charset);
    }

    if let Some(charset) = extract_charset_from_html(html) {
        return normalize_charset(&charset);
    }

    DEFAULT_CHARSET.to_string()
}

/// Extract the `charset` parameter from a `Content-Type` header value.
///
/// Accepts quoted and unquoted values, with or without whitespace around
/// the `=`, and ignores trailing parameters.
pub fn extract_charset_from_content_type(content_type: &str) -> Option<String> {
    static CHARSET_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let regex =
        CHARSET_REGEX.get_or_init(|| Regex::new(r#"(?i)charset\s*=\s*"?([^";,\s]+)"?"#).ok());
    let regex = regex.as_ref()?;

    regex
        .captures(content_type)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Scan the start of an HTML document for a meta charset declaration.
///
/// Handles both the HTML5 form (`<meta charset="...">`) and the HTML4 form
/// (`<meta http-equiv="Content-Type" content="...; charset=...">`). Only
/// the first 1024 bytes are examined; conforming documents declare their
/// encoding within that window.
pub fn extract_charset_from_html(html: &[u8]) -> Option<String> {
    let scan_limit = std::cmp::min(html.len(), META_SCAN_LIMIT);
    // Lossy conversion is fine here: charset names are ASCII, and bytes we
    // cannot decode cannot be part of a declaration we would honor.
    let html_str = String::from_utf8_lossy(&html[..scan_limit]);

    static HTML5_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let html5_regex =
        HTML5_REGEX.get_or_init(|| Regex::new(r#"(?i)<meta\s+charset\s*=\s*"?([^";>\s]+)"?"#).ok());
    let html5_regex = html5_regex.as_ref()?;

    if let Some(caps) = html5_regex.captures(&html_str)
        && let Some(m) = caps.get(1)
    {
        return Some(m.as_str().to_string());
    }

    static HTML4_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let html4_regex = HTML4_REGEX.get_or_init(|| {
        Regex::new(
            r#"(?i)<meta\s+http-equiv\s*=\s*"?Content-Type"?\s+content\s*=\s*"?[^">]*charset\s*=\s*([^";>\s]+)"?"#,
        )
        .ok()
    });
    let html4_regex = html4_regex.as_ref()?;

    if let Some(caps) = html4_regex.captures(&html_str)
        && let Some(m) = caps.get(1)
    {
        return Some(m.as_str().to_string());
    }

    None
}

/// Normalize a charset name to uppercase.
pub fn normalize_charset(charset: &str) -> String {
    charset.to_uppercase()
}
