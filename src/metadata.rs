//! Page metadata extraction for YAML front matter
//!
//! Walks the document head collecting title, description, canonical URL,
//! social-card image, author, and publication date. Each field has a fixed
//! source priority, resolved after the walk so document order of the meta
//! tags cannot change the outcome:
//!
//! - title: `<title>`, then `og:title`, then `twitter:title`
//! - description: `meta[name=description]`, then `og:description`
//! - url: `link[rel=canonical]`, then `og:url`, then the request base URL
//! - image: `og:image`, then `twitter:image` (resolved against the base URL)
//! - author: `meta[name=author]`, then `article:author`
//! - published: `article:published_time`
//!
//! Relative URLs in `image` and `url` are resolved to absolute form when a
//! base URL is available and resolution is enabled.

use crate::error::ConversionError;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::cell::Ref;

/// Page metadata extracted from HTML
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub author: Option<String>,
    pub published: Option<String>,
}

impl PageMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no field carries a non-empty value.
    pub fn is_empty(&self) -> bool {
        [
            &self.title,
            &self.description,
            &self.url,
            &self.image,
            &self.author,
            &self.published,
        ]
        .iter()
        .all(|field| field.as_deref().is_none_or(str::is_empty))
    }
}

/// Raw candidates gathered during the DOM walk, one slot per source.
#[derive(Debug, Default)]
struct MetaCandidates {
    title_tag: Option<String>,
    og_title: Option<String>,
    twitter_title: Option<String>,
    meta_description: Option<String>,
    og_description: Option<String>,
    canonical: Option<String>,
    og_url: Option<String>,
    og_image: Option<String>,
    twitter_image: Option<String>,
    meta_author: Option<String>,
    article_author: Option<String>,
    published: Option<String>,
}

/// Metadata extractor with relative-URL resolution
pub struct MetadataExtractor {
    base_url: Option<String>,
    resolve_urls: bool,
}

impl MetadataExtractor {
    /// `base_url` is the absolute URL of the page being converted
    /// (`scheme://host/path`); `resolve_urls` controls whether relative
    /// metadata URLs are resolved against it.
    pub fn new(base_url: Option<String>, resolve_urls: bool) -> Self {
        Self {
            base_url,
            resolve_urls,
        }
    }

    /// Extract metadata from a parsed document.
    pub fn extract(&self, dom: &RcDom) -> Result<PageMetadata, ConversionError> {
        let mut candidates = MetaCandidates::default();
        self.collect(&dom.document, &mut candidates);

        let mut metadata = PageMetadata::new();
        metadata.title = candidates
            .title_tag
            .or(candidates.og_title)
            .or(candidates.twitter_title);
        metadata.description = candidates.meta_description.or(candidates.og_description);
        metadata.url = candidates
            .canonical
            .map(|url| self.resolve_url(&url))
            .or(candidates.og_url)
            .or_else(|| self.base_url.clone());
        metadata.image = candidates
            .og_image
            .or(candidates.twitter_image)
            .map(|url| self.resolve_url(&url));
        metadata.author = candidates.meta_author.or(candidates.article_author);
        metadata.published = candidates.published;

        Ok(metadata)
    }

    /// Depth-first walk filling the candidate slots. First occurrence of a
    /// source wins within that source.
    fn collect(&self, node: &Handle, candidates: &mut MetaCandidates) {
        match node.data {
            NodeData::Element {
                ref name,
                ref attrs,
                ..
            } => {
                match name.local.as_ref() {
                    "title" => {
                        if candidates.title_tag.is_none() {
                            let mut text = String::new();
                            self.extract_text_content(node, &mut text);
                            let text = text.trim();
                            if !text.is_empty() {
                                candidates.title_tag = Some(text.to_string());
                            }
                        }
                    }
                    "meta" => self.collect_meta_tag(&attrs.borrow(), candidates),
                    "link" => {
                        let attrs_ref = attrs.borrow();
                        let is_canonical = attrs_ref.iter().any(|attr| {
                            attr.name.local.as_ref() == "rel"
                                && attr.value.as_ref() == "canonical"
                        });
                        if is_canonical && candidates.canonical.is_none() {
                            candidates.canonical = get_attr(&attrs_ref, "href");
                        }
                    }
                    _ => {}
                }

                for child in node.children.borrow().iter() {
                    self.collect(child, candidates);
                }
            }
            NodeData::Document => {
                for child in node.children.borrow().iter() {
                    self.collect(child, candidates);
                }
            }
            _ => {}
        }
    }

    /// Inspect one meta tag. Open Graph tags use `property`, classic tags
    /// use `name`; both are accepted wherever real-world markup mixes them.
    fn collect_meta_tag(
        &self,
        attrs: &Ref<Vec<html5ever::Attribute>>,
        candidates: &mut MetaCandidates,
    ) {
        let Some(content) = get_attr(attrs, "content") else {
            return;
        };
        let key = get_attr(attrs, "property").or_else(|| get_attr(attrs, "name"));

        let slot = match key.as_deref() {
            Some("og:title") => &mut candidates.og_title,
            Some("twitter:title") => &mut candidates.twitter_title,
            Some("description") => &mut candidates.meta_description,
            Some("og:description") => &mut candidates.og_description,
            Some("og:url") => &mut candidates.og_url,
            Some("og:image") => &mut candidates.og_image,
            Some("twitter:image") => &mut candidates.twitter_image,
            Some("author") => &mut candidates.meta_author,
            Some("article:author") => &mut candidates.article_author,
            Some("article:published_time") => &mut candidates.published,
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(content);
        }
    }

    /// Extract text content from a node and its children.
    fn extract_text_content(&self, node: &Handle, output: &mut String) {
        match node.data {
            NodeData::Text { ref contents } => {
                output.push_str(&contents.borrow());
            }
            NodeData::Element { .. } | NodeData::Document => {
                for child in node.children.borrow().iter() {
                    self.extract_text_content(child, output);
                }
            }
            _ => {}
        }
    }

    /// Resolve a possibly-relative URL against the base URL.
    ///
    /// - absolute (`http://`, `https://`) and protocol-relative (`//…`)
    ///   URLs pass through unchanged
    /// - absolute paths resolve against the base origin
    /// - relative paths resolve against the base directory
    /// - with no (or malformed) base URL the input passes through
    pub fn resolve_url(&self, url: &str) -> String {
        if !self.resolve_urls || url.is_empty() {
            return url.to_string();
        }

        if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("//") {
            return url.to_string();
        }

        let Some(ref base) = self.base_url else {
            return url.to_string();
        };
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return url.to_string();
        }

        if url.starts_with('/') {
            return format!("{}{}", origin_of(base), url);
        }

        let base_dir = base_directory_of(base);
        format!("{}/{}", base_dir.trim_end_matches('/'), url)
    }
}

fn get_attr(attrs: &Ref<Vec<html5ever::Attribute>>, name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|attr| attr.name.local.as_ref() == name)
        .map(|attr| attr.value.to_string())
}

/// `https://example.com:8080/a/b` → `https://example.com:8080`
fn origin_of(url: &str) -> String {
    let (scheme_len, after_scheme) = if let Some(stripped) = url.strip_prefix("https://") {
        (8, stripped)
    } else if let Some(stripped) = url.strip_prefix("http://") {
        (7, stripped)
    } else {
        return url.to_string();
    };

    match after_scheme.find('/') {
        Some(pos) => url[..scheme_len + pos].to_string(),
        None => url.to_string(),
    }
}

/// `https://example.com/page/sub` → `https://example.com/page`
fn base_directory_of(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if let Some(pos) = trimmed.rfind('/') {
        // Do not cut into the scheme's `//`.
        if pos > 0 && trimmed.as_bytes()[pos - 1] == b'/' {
            return trimmed.to_string();
        }
        trimmed[..pos].to_string()
    } else {
        trimmed.to_string()
    }
}
