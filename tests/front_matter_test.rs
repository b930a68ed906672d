//! YAML front matter integration tests

use markdown_filter::ConversionEngine;

const FULL_METADATA_HTML: &[u8] = br#"<!DOCTYPE html>
<html>
<head>
    <title>Test Page</title>
    <meta name="description" content="Test description">
    <meta property="og:image" content="https://example.com/image.png">
    <meta name="author" content="Jane Doe">
    <meta property="article:published_time" content="2024-01-15T10:30:00Z">
</head>
<body>
    <h1>Main Heading</h1>
    <p>Body content.</p>
</body>
</html>"#;

fn convert(html: &[u8], front_matter: bool) -> String {
    ConversionEngine::new()
        .front_matter(front_matter)
        .base_url(Some("https://example.com/page".to_string()))
        .convert(html, None)
        .expect("conversion failed")
        .markdown
}

#[test]
fn test_front_matter_block_structure() {
    let markdown = convert(FULL_METADATA_HTML, true);

    assert!(markdown.starts_with("---\n"), "got: {markdown:?}");
    // Delimiter, fields, delimiter, blank line, then the body.
    let end = markdown.find("\n---\n\n").expect("closing delimiter");
    let body = &markdown[end + 6..];
    assert!(body.starts_with("# Main Heading"));
}

#[test]
fn test_field_order_is_fixed() {
    let markdown = convert(FULL_METADATA_HTML, true);

    let positions: Vec<usize> = ["title:", "url:", "description:", "image:", "author:", "published:"]
        .iter()
        .map(|field| markdown.find(field).unwrap_or_else(|| panic!("missing {field}")))
        .collect();

    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted, "fields out of order: {markdown:?}");
}

#[test]
fn test_all_values_are_double_quoted() {
    let markdown = convert(FULL_METADATA_HTML, true);

    assert!(markdown.contains("title: \"Test Page\""));
    assert!(markdown.contains("description: \"Test description\""));
    assert!(markdown.contains("image: \"https://example.com/image.png\""));
    assert!(markdown.contains("author: \"Jane Doe\""));
    assert!(markdown.contains("published: \"2024-01-15T10:30:00Z\""));
}

#[test]
fn test_url_falls_back_to_base_url() {
    let markdown = convert(FULL_METADATA_HTML, true);
    assert!(markdown.contains("url: \"https://example.com/page\""));
}

#[test]
fn test_canonical_overrides_base_url() {
    let html = br#"<html><head>
        <title>T</title>
        <link rel="canonical" href="https://example.com/canonical">
    </head><body><p>x</p></body></html>"#;
    let markdown = convert(html, true);
    assert!(markdown.contains("url: \"https://example.com/canonical\""));
}

#[test]
fn test_empty_fields_are_omitted() {
    let html = b"<html><head><title>Only Title</title></head><body><p>x</p></body></html>";
    let markdown = ConversionEngine::new()
        .front_matter(true)
        .convert(html, None)
        .expect("conversion failed")
        .markdown;

    assert!(markdown.contains("title: \"Only Title\""));
    assert!(!markdown.contains("description:"));
    assert!(!markdown.contains("image:"));
    assert!(!markdown.contains("author:"));
    assert!(!markdown.contains("published:"));
}

#[test]
fn test_no_metadata_no_block() {
    let html = b"<html><body><p>No head metadata at all</p></body></html>";
    let markdown = ConversionEngine::new()
        .front_matter(true)
        .convert(html, None)
        .expect("conversion failed")
        .markdown;

    assert!(!markdown.starts_with("---"));
    assert!(markdown.contains("No head metadata at all"));
}

#[test]
fn test_special_characters_are_escaped() {
    let html = br#"<html><head>
        <title>Quote " Backslash \ End</title>
    </head><body><p>x</p></body></html>"#;
    let markdown = convert(html, true);

    assert!(
        markdown.contains(r#"title: "Quote \" Backslash \\ End""#),
        "got: {markdown:?}"
    );
}

#[test]
fn test_unicode_passes_through() {
    let html = "<html><head><title>日本語のタイトル — Ünïcødé</title></head><body><p>x</p></body></html>";
    let markdown = convert(html.as_bytes(), true);
    assert!(markdown.contains("title: \"日本語のタイトル — Ünïcødé\""));
}

#[test]
fn test_body_identical_with_and_without_front_matter() {
    let with = convert(FULL_METADATA_HTML, true);
    let without = convert(FULL_METADATA_HTML, false);

    let end = with.find("\n---\n\n").expect("closing delimiter");
    let body = &with[end + 6..];
    assert_eq!(body, without, "front matter must not change the body");
}

#[test]
fn test_front_matter_affects_etag() {
    let engine_plain = ConversionEngine::new();
    let engine_fm = ConversionEngine::new().front_matter(true);

    let plain = engine_plain.convert(FULL_METADATA_HTML, None).unwrap();
    let fm = engine_fm.convert(FULL_METADATA_HTML, None).unwrap();

    // Different bytes, different variant ETags.
    assert_ne!(plain.markdown, fm.markdown);
    assert_ne!(plain.etag, fm.etag);
}
