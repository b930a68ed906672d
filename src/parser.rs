//! HTML5 parsing
//!
//! Parsing uses html5ever, which implements the WHATWG HTML5 algorithm:
//! malformed markup is recovered the same way browsers recover it, entities
//! (named, decimal, hex) are decoded during tokenization, and there is no
//! external entity resolution or DTD fetching by construction.
//!
//! Input bytes are decoded to UTF-8 before parsing. The charset comes from
//! the detection cascade in [`crate::charset`]; a supported non-UTF-8
//! charset is transcoded with encoding_rs, an unsupported one or an invalid
//! byte sequence is an [`ConversionError::Encoding`] for the caller to
//! route through the error strategy.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::RcDom;
use std::borrow::Cow;

use crate::charset::detect_charset;
use crate::error::ConversionError;

/// Parse HTML bytes into a DOM tree, using the upstream `Content-Type`
/// header (when available) for charset detection.
///
/// # Errors
///
/// - [`ConversionError::Encoding`]: input invalid for the detected
///   charset, or the charset is unsupported
/// - [`ConversionError::Structure`]: empty input
///
/// # Examples
///
/// ```rust
/// use markdown_filter::parser::parse_html_with_charset;
///
/// let html = b"<html><body><h1>Hello</h1></body></html>";
/// let dom = parse_html_with_charset(html, Some("text/html; charset=UTF-8"))
///     .expect("Failed to parse HTML");
/// # let _ = dom;
/// ```
pub fn parse_html_with_charset(
    html: &[u8],
    content_type: Option<&str>,
) -> Result<RcDom, ConversionError> {
    if html.is_empty() {
        return Err(ConversionError::Structure("HTML input is empty".to_string()));
    }

    let detected_charset = detect_charset(content_type, html);

    // html5ever consumes UTF-8; anything else must be transcoded first.
    let utf8_str = decode_html_to_utf8(html, &detected_charset)?;

    // Feed the UTF-8 string sink directly, avoiding Read/Cursor overhead in
    // the hot path.
    let dom = parse_document(RcDom::default(), Default::default()).one(utf8_str.as_ref());

    Ok(dom)
}

fn decode_html_to_utf8<'a>(
    html: &'a [u8],
    detected_charset: &str,
) -> Result<Cow<'a, str>, ConversionError> {
    if detected_charset.eq_ignore_ascii_case("UTF-8") {
        return std::str::from_utf8(html).map(Cow::Borrowed).map_err(|e| {
            ConversionError::Encoding(format!(
                "invalid UTF-8 at byte position {}: {}",
                e.valid_up_to(),
                e
            ))
        });
    }

    let encoding =
        encoding_rs::Encoding::for_label(detected_charset.as_bytes()).ok_or_else(|| {
            ConversionError::Encoding(format!(
                "unsupported charset '{}' for HTML parsing",
                detected_charset
            ))
        })?;

    encoding
        .decode_without_bom_handling_and_without_replacement(html)
        .ok_or_else(|| {
            ConversionError::Encoding(format!(
                "invalid byte sequence for charset '{}'",
                detected_charset
            ))
        })
}

/// Parse HTML bytes with no `Content-Type` hint, relying on meta tags or
/// the UTF-8 default.
pub fn parse_html(html: &[u8]) -> Result<RcDom, ConversionError> {
    parse_html_with_charset(html, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::MarkdownConverter;
    use proptest::prelude::*;

    #[test]
    fn test_parse_simple_html() {
        let html = b"<html><body><h1>Hello</h1></body></html>";
        assert!(parse_html(html).is_ok());
    }

    #[test]
    fn test_parse_malformed_html() {
        // Missing closing tags are recovered per the HTML5 algorithm.
        let html = b"<html><body><h1>Hello";
        assert!(parse_html(html).is_ok());
    }

    #[test]
    fn test_parse_empty_input() {
        match parse_html(b"") {
            Err(ConversionError::Structure(_)) => (),
            other => panic!("expected Structure error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_parse_invalid_utf8() {
        let html = b"\xFF\xFE<html><body>Invalid</body></html>";
        match parse_html(html) {
            Err(ConversionError::Encoding(_)) => (),
            other => panic!("expected Encoding error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_parse_utf8_content() {
        let html = b"<html><body><p>\xE2\x9C\x93 Check mark</p></body></html>";
        assert!(parse_html(html).is_ok());
    }

    #[test]
    fn test_parse_html_entities() {
        let html = b"<html><body><p>&lt;tag&gt; &amp; &quot;quotes&quot;</p></body></html>";
        assert!(parse_html(html).is_ok());
    }

    #[test]
    fn test_parse_misnested_tags() {
        let html = b"<html><body><b><i>text</b></i></body></html>";
        assert!(parse_html(html).is_ok());
    }

    #[test]
    fn test_parse_fragment() {
        let html = b"<div><p>Content</p></div>";
        assert!(parse_html(html).is_ok());
    }

    #[test]
    fn test_charset_priority_header_over_meta() {
        let html =
            b"<html><head><meta charset=\"ISO-8859-1\"></head><body><h1>Hello</h1></body></html>";
        assert!(parse_html_with_charset(html, Some("text/html; charset=UTF-8")).is_ok());
    }

    #[test]
    fn test_iso_8859_1_content_type_transcodes() {
        // "Café" encoded as ISO-8859-1 (0xE9 is invalid UTF-8)
        let html = b"<html><body><p>Caf\xE9</p></body></html>";
        let dom = parse_html_with_charset(html, Some("text/html; charset=ISO-8859-1"))
            .expect("Should transcode ISO-8859-1 input");

        let markdown = MarkdownConverter::new()
            .convert(&dom)
            .expect("Converted Markdown should be produced");
        assert!(markdown.contains("Café"), "got: {markdown:?}");
    }

    #[test]
    fn test_windows_1252_content_type_transcodes() {
        // "€" is 0x80 in windows-1252 and invalid UTF-8
        let html = b"<html><body><p>Price \x80 10</p></body></html>";
        let dom = parse_html_with_charset(html, Some("text/html; charset=windows-1252"))
            .expect("Should transcode windows-1252 input");

        let markdown = MarkdownConverter::new()
            .convert(&dom)
            .expect("Converted Markdown should be produced");
        assert!(markdown.contains("€"), "got: {markdown:?}");
    }

    #[test]
    fn test_meta_charset_transcodes() {
        let html =
            b"<html><head><meta charset=\"ISO-8859-1\"></head><body><p>Caf\xE9</p></body></html>";
        let dom =
            parse_html_with_charset(html, None).expect("Should use meta charset and transcode");

        let markdown = MarkdownConverter::new()
            .convert(&dom)
            .expect("Converted Markdown should be produced");
        assert!(markdown.contains("Café"), "got: {markdown:?}");
    }

    #[test]
    fn test_unknown_charset_is_encoding_error() {
        let html = b"<html><body><p>Hello</p></body></html>";
        match parse_html_with_charset(html, Some("text/html; charset=x-unknown-test")) {
            Err(ConversionError::Encoding(message)) => {
                assert!(message.contains("unsupported charset"));
            }
            other => panic!("expected Encoding error, got {:?}", other.map(|_| ())),
        }
    }

    proptest! {
        // The parser must never panic on malformed markup: it either builds
        // a tree or reports a proper error kind.
        #[test]
        fn prop_malformed_html_no_crash(
            tag in prop::sample::select(vec!["div", "p", "span", "h1", "ul", "li", "table", "tr", "td"]),
            content in "[a-zA-Z0-9 ]{0,100}",
            close_tag in prop::bool::ANY,
            add_invalid_nesting in prop::bool::ANY,
        ) {
            let mut html = String::new();
            html.push_str(&format!("<{}>", tag));
            html.push_str(&content);
            if close_tag {
                html.push_str(&format!("</{}>", tag));
            }
            if add_invalid_nesting {
                html.push_str("<p><div>Invalid nesting</div></p>");
            }

            match parse_html(html.as_bytes()) {
                Ok(_) => {}
                Err(ConversionError::Encoding(_)) => {}
                Err(ConversionError::Structure(_)) => {}
                Err(e) => panic!("unexpected error kind for malformed HTML: {:?}", e),
            }
        }

        #[test]
        fn prop_unclosed_tags_handled(
            tag in prop::sample::select(vec!["div", "p", "span", "h1", "h2", "ul", "ol", "li"]),
            content in "[a-zA-Z0-9 ]{1,50}",
        ) {
            let html = format!("<html><body><{0}>{1}", tag, content);
            prop_assert!(parse_html(html.as_bytes()).is_ok());
        }

        #[test]
        fn prop_deeply_nested_handled(
            depth in 1usize..20usize,
            content in "[a-zA-Z]{1,10}",
        ) {
            let mut html = String::from("<html><body>");
            for _ in 0..depth {
                html.push_str("<div>");
            }
            html.push_str(&content);
            for _ in 0..depth {
                html.push_str("</div>");
            }
            html.push_str("</body></html>");

            prop_assert!(parse_html(html.as_bytes()).is_ok());
        }
    }
}
