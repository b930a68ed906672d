//! Security validation tests
//!
//! Validates that the converter neutralizes malicious HTML input: script
//! and style payloads, event handlers, and dangerous URL schemes never
//! reach the Markdown output.

use markdown_filter::converter::MarkdownConverter;
use markdown_filter::parser::parse_html;
use markdown_filter::security::SecurityValidator;

fn convert(html: &str) -> String {
    let dom = parse_html(html.as_bytes()).expect("Failed to parse HTML");
    MarkdownConverter::new()
        .convert(&dom)
        .expect("Failed to convert")
}

/// Script tags and their content are completely removed
#[test]
fn test_xss_script_tag_removal() {
    let markdown = convert(
        r#"<html><body>
        <p>Before dangerous element</p>
        <script>alert('xss')</script>
        <p>After dangerous element</p>
    </body></html>"#,
    );

    assert!(!markdown.contains("<script"));
    assert!(!markdown.contains("</script"));
    assert!(!markdown.contains("alert"));
    assert!(!markdown.contains("xss"));

    assert!(markdown.contains("Before dangerous element"));
    assert!(markdown.contains("After dangerous element"));
}

/// Inline script tags inside flow content are removed
#[test]
fn test_xss_inline_script_removal() {
    let markdown = convert(r#"<p>Text <script>malicious()</script> more text</p>"#);

    assert!(!markdown.contains("script"));
    assert!(!markdown.contains("malicious"));
    assert!(markdown.contains("Text"));
    assert!(markdown.contains("more text"));
}

/// Event handler attributes never influence output
#[test]
fn test_xss_event_handler_removal() {
    let markdown = convert(
        r#"<html><body>
        <p onclick="alert('xss')">Click me</p>
        <div onload="malicious()">Content</div>
        <a href="test.html" onmouseover="attack()">Link</a>
    </body></html>"#,
    );

    assert!(!markdown.contains("onclick"));
    assert!(!markdown.contains("onload"));
    assert!(!markdown.contains("onmouseover"));
    assert!(!markdown.contains("alert"));
    assert!(!markdown.contains("malicious"));
    assert!(!markdown.contains("attack"));

    assert!(markdown.contains("Click me"));
    assert!(markdown.contains("Content"));
    assert!(markdown.contains("Link"));
}

/// javascript: URLs are blocked in links; the visible text survives
#[test]
fn test_xss_javascript_url_in_link() {
    let markdown = convert(r#"<a href="javascript:alert('xss')">Click</a>"#);

    assert!(!markdown.contains("javascript:"));
    assert!(!markdown.contains("alert"));
    assert!(markdown.contains("Click"));
    assert!(!markdown.contains("[Click]"));
}

/// Scheme blocking is case-insensitive
#[test]
fn test_xss_javascript_url_case_insensitive() {
    let test_cases = vec![
        r#"<a href="javascript:alert('xss')">Test1</a>"#,
        r#"<a href="JavaScript:alert('xss')">Test2</a>"#,
        r#"<a href="JAVASCRIPT:alert('xss')">Test3</a>"#,
        r#"<a href="JaVaScRiPt:alert('xss')">Test4</a>"#,
    ];

    for html in test_cases {
        let markdown = convert(html);
        assert!(!markdown.to_lowercase().contains("javascript:"));
        assert!(!markdown.contains("alert"));
    }
}

/// data: URLs are blocked in links
#[test]
fn test_xss_data_url_in_link() {
    let markdown = convert(r#"<a href="data:text/html,<script>alert('xss')</script>">Click</a>"#);

    assert!(!markdown.contains("data:"));
    assert!(!markdown.contains("script"));
    assert!(markdown.contains("Click"));
}

/// Images with dangerous URLs are dropped entirely
#[test]
fn test_xss_javascript_url_in_image() {
    let markdown = convert(r#"<img src="javascript:alert('xss')" alt="Image">"#);

    assert!(!markdown.contains("javascript:"));
    assert!(!markdown.contains("alert"));
    assert!(!markdown.contains("![Image]"));
}

#[test]
fn test_xss_data_url_in_image() {
    let markdown = convert(r#"<img src="data:image/svg+xml,<svg onload='alert(1)'>" alt="SVG">"#);

    assert!(!markdown.contains("data:"));
    assert!(!markdown.contains("onload"));
    assert!(!markdown.contains("![SVG]"));
}

/// vbscript:, file:, and about: schemes are blocked too
#[test]
fn test_other_dangerous_schemes_blocked() {
    for html in [
        r#"<a href="vbscript:msgbox('x')">V</a>"#,
        r#"<a href="file:///etc/passwd">F</a>"#,
        r#"<a href="about:blank">A</a>"#,
    ] {
        let markdown = convert(html);
        assert!(!markdown.contains("vbscript"));
        assert!(!markdown.contains("file:"));
        assert!(!markdown.contains("about:"));
        assert!(!markdown.contains("]("));
    }
}

/// Safe URLs are preserved
#[test]
fn test_safe_urls_preserved() {
    let markdown = convert(
        r##"<html><body>
        <a href="https://example.com">HTTPS Link</a>
        <a href="http://example.com">HTTP Link</a>
        <a href="/relative/path">Relative Link</a>
        <a href="../parent">Parent Link</a>
        <a href="#anchor">Anchor Link</a>
        <img src="https://example.com/image.png" alt="Image">
    </body></html>"##,
    );

    assert!(markdown.contains("https://example.com"));
    assert!(markdown.contains("http://example.com"));
    assert!(markdown.contains("/relative/path"));
    assert!(markdown.contains("../parent"));
    assert!(markdown.contains("#anchor"));
    assert!(markdown.contains("![Image](https://example.com/image.png)"));
}

/// Every dangerous element is removed with all of its descendants
#[test]
fn test_all_dangerous_elements_removed() {
    let markdown = convert(
        r#"<html><body>
        <p>Start</p>
        <style>body { display: none; }</style>
        <noscript>Enable JS</noscript>
        <iframe src="https://evil.example">frame fallback</iframe>
        <object data="payload.swf">object fallback</object>
        <embed src="payload.swf">
        <applet code="Evil.class">applet fallback</applet>
        <p>End</p>
    </body></html>"#,
    );

    assert!(markdown.contains("Start"));
    assert!(markdown.contains("End"));
    assert!(!markdown.contains("display"));
    assert!(!markdown.contains("Enable JS"));
    assert!(!markdown.contains("frame fallback"));
    assert!(!markdown.contains("object fallback"));
    assert!(!markdown.contains("applet fallback"));
    assert!(!markdown.contains("evil.example"));
    assert!(!markdown.contains("payload.swf"));
}

/// link and base elements in head contribute nothing to the body output
#[test]
fn test_link_and_base_removed() {
    let markdown = convert(
        r#"<html><head>
        <base href="https://attacker.example/">
        <link rel="stylesheet" href="https://attacker.example/style.css">
    </head><body><p>Content</p></body></html>"#,
    );

    assert!(markdown.contains("Content"));
    assert!(!markdown.contains("attacker.example"));
}

/// Nested dangerous elements inside safe containers are removed
#[test]
fn test_nested_dangerous_elements() {
    let markdown = convert(
        r#"<div><p>Visible</p><div><script>nested();</script><style>.x{}</style></div></div>"#,
    );

    assert!(markdown.contains("Visible"));
    assert!(!markdown.contains("nested"));
    assert!(!markdown.contains(".x"));
}

/// Entity-encoded scheme tricks do not bypass the filter: html5ever
/// decodes entities before the URL check runs
#[test]
fn test_entity_encoded_scheme_is_still_blocked() {
    let markdown = convert(r#"<a href="&#106;avascript:alert(1)">Click</a>"#);

    assert!(markdown.contains("Click"));
    assert!(!markdown.to_lowercase().contains("javascript"));
    assert!(!markdown.contains("]("));
}

/// Whitespace-padded schemes are blocked
#[test]
fn test_whitespace_padded_scheme_blocked() {
    let markdown = convert(r#"<a href="   javascript:alert(1)">Click</a>"#);

    assert!(markdown.contains("Click"));
    assert!(!markdown.contains("javascript"));
}

/// The standalone validator agrees with the emitter
#[test]
fn test_validator_and_emitter_agree() {
    let validator = SecurityValidator::new();

    for url in [
        "javascript:alert(1)",
        "data:text/plain,x",
        "vbscript:x",
        "file:///x",
        "about:blank",
    ] {
        assert!(validator.is_dangerous_url(url), "{url}");
        let markdown = convert(&format!(r#"<a href="{url}">T</a>"#));
        assert!(!markdown.contains("]("), "{url} leaked into output");
    }
}

/// Deep nesting fails with a structure error instead of exhausting the
/// stack
#[test]
fn test_nesting_depth_overrun_is_structure_error() {
    let mut html = String::from("<html><body>");
    for _ in 0..1200 {
        html.push_str("<div>");
    }
    html.push_str("deep");

    let dom = parse_html(html.as_bytes()).expect("Failed to parse HTML");
    let err = MarkdownConverter::new().convert(&dom).unwrap_err();
    assert_eq!(err.category(), "structure");
}
