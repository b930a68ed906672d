//! Markdown emission from the DOM tree
//!
//! The converter walks the parsed DOM depth-first, left-to-right, emitting
//! Markdown as it goes. Three principles shape every handler:
//!
//! 1. **Determinism**: identical HTML bytes and identical options produce
//!    byte-identical Markdown, across runs, processes, and hosts. Attributes
//!    are read in DOM insertion order and never sorted; normalization rules
//!    are applied the same way on every path.
//! 2. **Content extraction**: non-content elements (scripts, styles, frames)
//!    contribute nothing; the sanitizer is consulted for every element and
//!    every URL before it can reach the output.
//! 3. **Bounded work**: the traversal increments a node counter and polls
//!    the conversion deadline at fixed checkpoints, so a hostile document
//!    cannot pin a worker.
//!
//! # Normalization rules
//!
//! Applied during emission and in a final pass, so that emission is
//! idempotent under re-normalization:
//!
//! - LF line endings only
//! - runs of blank lines collapse to one
//! - trailing whitespace stripped from every line
//! - intra-line space runs collapse to one, except inside fenced code
//!   blocks and inline code spans, and except leading indentation
//! - output ends with exactly one LF
//!
//! # Flavors
//!
//! CommonMark is the baseline. GitHub Flavored Markdown additionally
//! renders tables and strikethrough; output differs between flavors only
//! for those constructs.

use crate::config::MarkdownFlavor;
use crate::error::ConversionError;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::cell::Ref;
use std::time::{Duration, Instant};

/// Node-count interval between deadline polls.
const CHECKPOINT_INTERVAL: u32 = 100;

/// Table column alignment (GFM)
#[derive(Debug, Clone, Copy)]
enum TableAlignment {
    Left,
    Center,
    Right,
}

/// Conversion options
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Markdown flavor to generate
    pub flavor: MarkdownFlavor,
    /// Prepend YAML front matter with extracted page metadata
    pub front_matter: bool,
    /// Base URL for resolving relative URLs (scheme://host/path)
    pub base_url: Option<String>,
    /// Resolve relative URLs in metadata to absolute URLs
    pub resolve_relative_urls: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            flavor: MarkdownFlavor::CommonMark,
            front_matter: false,
            base_url: None,
            resolve_relative_urls: true,
        }
    }
}

/// Cooperative deadline and work counter for one conversion
///
/// The deadline is cooperative, not preemptive: the traversal calls
/// [`ConversionContext::tick`] for every node it visits, and the elapsed
/// time is compared against the deadline every hundred nodes. No threads
/// are spawned; worst-case detection latency is bounded by the checkpoint
/// cadence, which is milliseconds on typical documents.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use markdown_filter::converter::ConversionContext;
///
/// let ctx = ConversionContext::new(Duration::from_secs(5));
/// assert!(ctx.check_deadline().is_ok());
/// ```
#[derive(Debug)]
pub struct ConversionContext {
    start_time: Instant,
    /// Zero means no deadline
    timeout: Duration,
    node_count: u32,
}

impl ConversionContext {
    /// Create a context with the given deadline. `Duration::ZERO` disables
    /// deadline enforcement.
    pub fn new(timeout: Duration) -> Self {
        Self {
            start_time: Instant::now(),
            timeout,
            node_count: 0,
        }
    }

    /// Compare elapsed time against the deadline.
    pub fn check_deadline(&self) -> Result<(), ConversionError> {
        if self.timeout.is_zero() {
            return Ok(());
        }
        if self.start_time.elapsed() > self.timeout {
            return Err(ConversionError::Timeout);
        }
        Ok(())
    }

    /// Count one visited node; polls the deadline at every checkpoint
    /// (each [`CHECKPOINT_INTERVAL`] nodes).
    pub fn tick(&mut self) -> Result<(), ConversionError> {
        self.node_count += 1;
        if self.node_count.is_multiple_of(CHECKPOINT_INTERVAL) {
            self.check_deadline()?;
        }
        Ok(())
    }

    /// Elapsed time since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Number of DOM nodes visited so far.
    pub fn node_count(&self) -> u32 {
        self.node_count
    }
}

/// DOM-to-Markdown converter
///
/// Stateless between conversions; one converter value can serve any number
/// of documents with the same options.
///
/// ```rust
/// use markdown_filter::converter::MarkdownConverter;
/// use markdown_filter::parser::parse_html;
///
/// let dom = parse_html(b"<h1>Title</h1><p>Content</p>").expect("parse failed");
/// let markdown = MarkdownConverter::new().convert(&dom).expect("conversion failed");
/// assert!(markdown.starts_with("# Title"));
/// ```
pub struct MarkdownConverter {
    options: ConversionOptions,
    security_validator: crate::security::SecurityValidator,
}

impl MarkdownConverter {
    /// Create a converter with default options (CommonMark, no front
    /// matter).
    pub fn new() -> Self {
        Self::with_options(ConversionOptions::default())
    }

    /// Create a converter with custom options.
    pub fn with_options(options: ConversionOptions) -> Self {
        Self {
            options,
            security_validator: crate::security::SecurityValidator::new(),
        }
    }

    /// Convert a DOM tree with no deadline. Convenience wrapper around
    /// [`MarkdownConverter::convert_with_context`].
    pub fn convert(&self, dom: &RcDom) -> Result<String, ConversionError> {
        let mut ctx = ConversionContext::new(Duration::ZERO);
        self.convert_with_context(dom, &mut ctx)
    }

    /// Convert a DOM tree to normalized Markdown.
    ///
    /// The deadline in `ctx` is polled throughout traversal and after
    /// metadata extraction and normalization. On success the returned
    /// string obeys every normalization rule, ending with exactly one LF.
    pub fn convert_with_context(
        &self,
        dom: &RcDom,
        ctx: &mut ConversionContext,
    ) -> Result<String, ConversionError> {
        let mut output = String::with_capacity(1024);

        if self.options.front_matter {
            use crate::metadata::MetadataExtractor;

            let extractor = MetadataExtractor::new(
                self.options.base_url.clone(),
                self.options.resolve_relative_urls,
            );
            let metadata = extractor.extract(dom)?;
            if !metadata.is_empty() {
                self.write_front_matter(&mut output, &metadata);
            }

            ctx.check_deadline()?;
        }

        // Depth 0 is the document level.
        self.traverse_node(&dom.document, &mut output, 0, ctx)?;

        ctx.check_deadline()?;
        let markdown = self.normalize_output(output);
        ctx.check_deadline()?;

        Ok(markdown)
    }

    /// Serialize extracted metadata as a YAML front matter block.
    ///
    /// Field order is fixed (title, url, description, image, author,
    /// published); only non-empty fields appear. Every value is
    /// double-quoted with `"`, `\`, LF, CR, and TAB escaped, other
    /// characters pass through unchanged.
    fn write_front_matter(&self, output: &mut String, metadata: &crate::metadata::PageMetadata) {
        let fields = [
            ("title", &metadata.title),
            ("url", &metadata.url),
            ("description", &metadata.description),
            ("image", &metadata.image),
            ("author", &metadata.author),
            ("published", &metadata.published),
        ];

        output.push_str("---\n");
        for (name, value) in fields {
            if let Some(value) = value
                && !value.is_empty()
            {
                output.push_str(name);
                output.push_str(": ");
                self.write_yaml_string(output, value);
                output.push('\n');
            }
        }
        output.push_str("---\n\n");
    }

    /// Write a double-quoted YAML scalar with escaping.
    fn write_yaml_string(&self, output: &mut String, value: &str) {
        output.push('"');
        for ch in value.chars() {
            match ch {
                '"' => output.push_str("\\\""),
                '\\' => output.push_str("\\\\"),
                '\n' => output.push_str("\\n"),
                '\r' => output.push_str("\\r"),
                '\t' => output.push_str("\\t"),
                _ => output.push(ch),
            }
        }
        output.push('"');
    }

    /// Returns true if the output buffer already contains Markdown body
    /// content.
    ///
    /// When front matter is enabled the buffer is pre-populated before DOM
    /// traversal starts. Text-node whitespace handling must not treat that
    /// prefix as body content, otherwise leading whitespace in the first
    /// body text node would be emitted inconsistently depending on the
    /// front matter toggle.
    fn has_body_content(&self, output: &str) -> bool {
        if output.is_empty() {
            return false;
        }

        if self.options.front_matter
            && output.starts_with("---\n")
            && let Some(rest) = output.strip_prefix("---\n")
            && let Some(end_offset) = rest.find("\n---\n")
        {
            let body = &rest[end_offset + 5..];
            return body.chars().any(|ch| !ch.is_whitespace());
        }

        true
    }

    /// Core recursive traversal: emit the node, then its children, in
    /// document order. Counts every node against the conversion deadline.
    fn traverse_node(
        &self,
        node: &Handle,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        ctx.tick()?;

        match node.data {
            NodeData::Document => {
                for child in node.children.borrow().iter() {
                    self.traverse_node(child, output, depth, ctx)?;
                }
            }
            NodeData::Element { ref name, .. } => {
                let tag_name = name.local.as_ref();
                self.handle_element(node, tag_name, output, depth, ctx)?;
            }
            NodeData::Text { ref contents } => {
                let text = contents.borrow();
                let normalized = self.normalize_text(&text);
                if !normalized.is_empty() {
                    // Word boundaries around the node survive as single
                    // spaces.
                    if text.starts_with(|c: char| c.is_whitespace())
                        && self.has_body_content(output)
                        && !output.ends_with(' ')
                    {
                        output.push(' ');
                    }
                    output.push_str(&normalized);
                    if text.ends_with(|c: char| c.is_whitespace()) {
                        output.push(' ');
                    }
                }
            }
            // Comments, doctypes, and processing instructions carry no
            // content.
            _ => {}
        }

        Ok(())
    }

    /// Dispatch an element to its handler.
    fn handle_element(
        &self,
        node: &Handle,
        tag_name: &str,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        use crate::security::SanitizeAction;

        // Sanitizer first: removed elements contribute nothing, including
        // their descendants.
        if self.security_validator.check_element(tag_name) == SanitizeAction::Remove {
            return Ok(());
        }

        self.security_validator.validate_depth(depth)?;

        match tag_name {
            "h1" => self.handle_heading(node, 1, output, depth, ctx)?,
            "h2" => self.handle_heading(node, 2, output, depth, ctx)?,
            "h3" => self.handle_heading(node, 3, output, depth, ctx)?,
            "h4" => self.handle_heading(node, 4, output, depth, ctx)?,
            "h5" => self.handle_heading(node, 5, output, depth, ctx)?,
            "h6" => self.handle_heading(node, 6, output, depth, ctx)?,

            "p" => self.handle_paragraph(node, output, depth, ctx)?,

            "a" => self.handle_link(node, output, ctx)?,
            "img" => self.handle_image(node, output)?,

            "ul" => self.handle_list(node, output, 0, false, ctx)?,
            "ol" => self.handle_list(node, output, 0, true, ctx)?,
            // A stray li outside any list renders as an unordered item.
            "li" => self.handle_list_item(node, output, 0, false, ctx)?,

            "pre" => self.handle_code_block(node, output)?,
            "code" => self.handle_inline_code(node, output)?,

            "strong" | "b" => self.handle_span(node, output, "**", depth, ctx)?,
            "em" | "i" => self.handle_span(node, output, "*", depth, ctx)?,
            "del" | "s" | "strike" => self.handle_strikethrough(node, output, depth, ctx)?,

            "blockquote" => self.handle_blockquote(node, output, depth, ctx)?,
            "hr" => self.handle_horizontal_rule(output)?,
            "br" => output.push('\n'),

            "table" => self.handle_table(node, output, depth, ctx)?,

            // Everything else is a container: traverse children.
            _ => {
                for child in node.children.borrow().iter() {
                    self.traverse_node(child, output, depth + 1, ctx)?;
                }
            }
        }

        Ok(())
    }

    /// ATX-style headings: `h1`..`h6` map to `#`..`######`.
    fn handle_heading(
        &self,
        node: &Handle,
        level: usize,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        self.ensure_blank_line(output);

        for _ in 0..level {
            output.push('#');
        }
        output.push(' ');

        // Render heading content (inline elements included), then collapse
        // it onto one line.
        let start_len = output.len();
        for child in node.children.borrow().iter() {
            self.traverse_node(child, output, depth + 1, ctx)?;
        }
        let heading_content = output[start_len..].to_string();
        let normalized = self.normalize_text(&heading_content);
        output.truncate(start_len);
        output.push_str(&normalized);

        output.push_str("\n\n");
        Ok(())
    }

    /// Paragraphs: content followed by a blank-line separator.
    fn handle_paragraph(
        &self,
        node: &Handle,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        self.ensure_blank_line(output);

        let start_len = output.len();
        for child in node.children.borrow().iter() {
            self.traverse_node(child, output, depth + 1, ctx)?;
        }

        if output.len() > start_len {
            output.push_str("\n\n");
        }
        Ok(())
    }

    /// Links: `[text](url)`. A missing or dangerous URL keeps the visible
    /// text and drops the link.
    fn handle_link(
        &self,
        node: &Handle,
        output: &mut String,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        let href = self.attr_value(node, "href");

        let mut link_text = String::new();
        for child in node.children.borrow().iter() {
            ctx.tick()?;
            self.extract_text(child, &mut link_text);
        }
        let normalized_text = self.normalize_text(&link_text);
        if normalized_text.is_empty() {
            return Ok(());
        }

        match href.as_deref().and_then(|url| self.security_validator.sanitize_url(url)) {
            Some(safe_url) => {
                output.push('[');
                output.push_str(&normalized_text);
                output.push_str("](");
                output.push_str(safe_url);
                output.push(')');
            }
            None => output.push_str(&normalized_text),
        }

        Ok(())
    }

    /// Images: `![alt](src)`. An image with a dangerous URL is dropped
    /// entirely.
    fn handle_image(&self, node: &Handle, output: &mut String) -> Result<(), ConversionError> {
        let Some(src) = self.attr_value(node, "src") else {
            return Ok(());
        };
        let alt = self.attr_value(node, "alt").unwrap_or_default();

        if let Some(safe_url) = self.security_validator.sanitize_url(&src) {
            output.push_str("![");
            output.push_str(&alt);
            output.push_str("](");
            output.push_str(safe_url);
            output.push(')');
        }

        Ok(())
    }

    /// Lists: `- ` for unordered, `1. ` for ordered items, nested lists
    /// indented two spaces per level.
    fn handle_list(
        &self,
        node: &Handle,
        output: &mut String,
        level: usize,
        ordered: bool,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        if level == 0 {
            self.ensure_blank_line(output);
        }
        // Nested lists recurse without passing through the element
        // dispatcher, so the depth cap is enforced here as well.
        self.security_validator.validate_depth(level)?;

        for child in node.children.borrow().iter() {
            if let NodeData::Element { ref name, .. } = child.data
                && name.local.as_ref() == "li"
            {
                self.handle_list_item(child, output, level, ordered, ctx)?;
            }
        }

        if !output.ends_with("\n\n") {
            output.push('\n');
        }
        Ok(())
    }

    fn handle_list_item(
        &self,
        node: &Handle,
        output: &mut String,
        level: usize,
        ordered: bool,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        for _ in 0..level {
            output.push_str("  ");
        }
        output.push_str(if ordered { "1. " } else { "- " });

        let start_len = output.len();
        for child in node.children.borrow().iter() {
            match child.data {
                NodeData::Element { ref name, .. }
                    if matches!(name.local.as_ref(), "ul" | "ol") =>
                {
                    let nested_ordered = name.local.as_ref() == "ol";
                    // Finish the current line before the nested list.
                    if output.len() > start_len && !output.ends_with('\n') {
                        output.push('\n');
                    }
                    self.handle_list(child, output, level + 1, nested_ordered, ctx)?;
                }
                _ => {
                    self.traverse_node(child, output, level + 1, ctx)?;
                }
            }
        }

        if !output.ends_with('\n') {
            output.push('\n');
        }
        Ok(())
    }

    /// Fenced code blocks from `<pre>`, with language detection from
    /// `language-*` / `lang-*` classes on an inner `<code>` element. Code
    /// content is preserved exactly, with no whitespace normalization.
    fn handle_code_block(&self, node: &Handle, output: &mut String) -> Result<(), ConversionError> {
        self.ensure_blank_line(output);

        let mut language = String::new();
        for child in node.children.borrow().iter() {
            if let NodeData::Element { ref name, .. } = child.data
                && name.local.as_ref() == "code"
                && let Some(class_value) = self.attr_value(child, "class")
            {
                for class in class_value.split_whitespace() {
                    if let Some(lang) = class
                        .strip_prefix("language-")
                        .or_else(|| class.strip_prefix("lang-"))
                    {
                        language = lang.to_string();
                        break;
                    }
                }
                if !language.is_empty() {
                    break;
                }
            }
        }

        output.push_str("```");
        output.push_str(&language);
        output.push('\n');

        self.extract_code_content(node, output);

        if !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str("```\n\n");
        Ok(())
    }

    /// Inline code spans, content preserved exactly.
    fn handle_inline_code(
        &self,
        node: &Handle,
        output: &mut String,
    ) -> Result<(), ConversionError> {
        let mut code_content = String::new();
        self.extract_code_content(node, &mut code_content);

        output.push('`');
        output.push_str(&code_content);
        output.push('`');
        Ok(())
    }

    /// Emphasis and strong emphasis: wrap rendered children in the given
    /// marker (`*` or `**`). Nested formatting nests naturally.
    fn handle_span(
        &self,
        node: &Handle,
        output: &mut String,
        marker: &str,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        output.push_str(marker);
        for child in node.children.borrow().iter() {
            self.traverse_node(child, output, depth + 1, ctx)?;
        }
        output.push_str(marker);
        Ok(())
    }

    /// Strikethrough is a GFM extension; under CommonMark the content is
    /// rendered unmarked.
    fn handle_strikethrough(
        &self,
        node: &Handle,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        if self.options.flavor == MarkdownFlavor::GitHubFlavoredMarkdown {
            self.handle_span(node, output, "~~", depth, ctx)
        } else {
            for child in node.children.borrow().iter() {
                self.traverse_node(child, output, depth + 1, ctx)?;
            }
            Ok(())
        }
    }

    /// Blockquotes: children are rendered into a scratch buffer and each
    /// resulting line is prefixed with `> `. Nested quotes compose into
    /// `> >` naturally.
    fn handle_blockquote(
        &self,
        node: &Handle,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        self.ensure_blank_line(output);

        let mut inner = String::new();
        for child in node.children.borrow().iter() {
            self.traverse_node(child, &mut inner, depth + 1, ctx)?;
        }

        let inner = inner.trim();
        if inner.is_empty() {
            return Ok(());
        }

        for line in inner.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                output.push_str(">\n");
            } else {
                output.push_str("> ");
                output.push_str(line);
                output.push('\n');
            }
        }
        output.push('\n');
        Ok(())
    }

    /// Thematic break.
    fn handle_horizontal_rule(&self, output: &mut String) -> Result<(), ConversionError> {
        self.ensure_blank_line(output);
        output.push_str("---\n\n");
        Ok(())
    }

    /// Tables are a GFM extension; under CommonMark the table is traversed
    /// as a plain container so its text still appears.
    fn handle_table(
        &self,
        node: &Handle,
        output: &mut String,
        depth: usize,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        if self.options.flavor != MarkdownFlavor::GitHubFlavoredMarkdown {
            for child in node.children.borrow().iter() {
                self.traverse_node(child, output, depth + 1, ctx)?;
            }
            return Ok(());
        }

        self.ensure_blank_line(output);

        let mut headers: Vec<String> = Vec::new();
        let mut alignments: Vec<TableAlignment> = Vec::new();
        let mut rows: Vec<Vec<String>> = Vec::new();

        for child in node.children.borrow().iter() {
            if let NodeData::Element { ref name, .. } = child.data {
                match name.local.as_ref() {
                    "thead" => {
                        // First tr inside thead is the header row.
                        for tr in child.children.borrow().iter() {
                            if let NodeData::Element { ref name, .. } = tr.data
                                && name.local.as_ref() == "tr"
                            {
                                self.extract_table_header(tr, &mut headers, &mut alignments, ctx)?;
                                break;
                            }
                        }
                    }
                    "tbody" => {
                        self.extract_table_body(child, &mut headers, &mut alignments, &mut rows, ctx)?;
                    }
                    "tr" => {
                        // Direct tr under table; html5ever normally inserts
                        // a tbody, but handle it anyway.
                        if headers.is_empty() {
                            self.extract_table_header(child, &mut headers, &mut alignments, ctx)?;
                        } else {
                            let mut cells = Vec::new();
                            self.extract_table_row(child, &mut cells, ctx)?;
                            rows.push(cells);
                        }
                    }
                    _ => {}
                }
            }
        }

        // A table without any derivable header row is not representable in
        // GFM; emit nothing.
        if headers.is_empty() {
            return Ok(());
        }

        while alignments.len() < headers.len() {
            alignments.push(TableAlignment::Left);
        }

        self.write_gfm_table(output, &headers, &alignments, &rows);

        if !output.ends_with("\n\n") {
            output.push('\n');
        }
        Ok(())
    }

    /// Walk a tbody. When no header was found in a thead, the first row is
    /// promoted to header (a common pattern in real markup, whether it uses
    /// th or td cells); remaining rows become data.
    fn extract_table_body(
        &self,
        tbody: &Handle,
        headers: &mut Vec<String>,
        alignments: &mut Vec<TableAlignment>,
        rows: &mut Vec<Vec<String>>,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        let mut promote_first = headers.is_empty();

        for child in tbody.children.borrow().iter() {
            if let NodeData::Element { ref name, .. } = child.data
                && name.local.as_ref() == "tr"
            {
                if promote_first {
                    self.extract_table_header(child, headers, alignments, ctx)?;
                    promote_first = false;
                } else {
                    let mut cells = Vec::new();
                    self.extract_table_row(child, &mut cells, ctx)?;
                    rows.push(cells);
                }
            }
        }
        Ok(())
    }

    /// Extract a header row (th or td cells) with per-column alignment.
    fn extract_table_header(
        &self,
        tr: &Handle,
        headers: &mut Vec<String>,
        alignments: &mut Vec<TableAlignment>,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        for child in tr.children.borrow().iter() {
            if let NodeData::Element {
                ref name,
                ref attrs,
                ..
            } = child.data
                && matches!(name.local.as_ref(), "th" | "td")
            {
                headers.push(self.render_table_cell(child, ctx)?);
                alignments.push(self.extract_alignment(&attrs.borrow()));
            }
        }
        Ok(())
    }

    /// Extract a data row.
    fn extract_table_row(
        &self,
        tr: &Handle,
        cells: &mut Vec<String>,
        ctx: &mut ConversionContext,
    ) -> Result<(), ConversionError> {
        for child in tr.children.borrow().iter() {
            if let NodeData::Element { ref name, .. } = child.data
                && matches!(name.local.as_ref(), "td" | "th")
            {
                cells.push(self.render_table_cell(child, ctx)?);
            }
        }
        Ok(())
    }

    /// Render a cell's children (inline formatting included) and trim.
    fn render_table_cell(
        &self,
        cell: &Handle,
        ctx: &mut ConversionContext,
    ) -> Result<String, ConversionError> {
        let mut cell_output = String::new();
        for child in cell.children.borrow().iter() {
            self.traverse_node(child, &mut cell_output, 0, ctx)?;
        }
        Ok(cell_output.trim().to_string())
    }

    /// Column alignment from the `align` attribute or a `text-align` style.
    fn extract_alignment(&self, attrs: &Ref<Vec<html5ever::Attribute>>) -> TableAlignment {
        for attr in attrs.iter() {
            if attr.name.local.as_ref() == "align" {
                return match attr.value.to_ascii_lowercase().as_str() {
                    "center" => TableAlignment::Center,
                    "right" => TableAlignment::Right,
                    _ => TableAlignment::Left,
                };
            }
        }

        for attr in attrs.iter() {
            if attr.name.local.as_ref() == "style" {
                let style = attr.value.to_ascii_lowercase();
                if style.contains("text-align") {
                    if style.contains("center") {
                        return TableAlignment::Center;
                    } else if style.contains("right") {
                        return TableAlignment::Right;
                    }
                    return TableAlignment::Left;
                }
            }
        }

        TableAlignment::Left
    }

    /// Write the assembled GFM table. Short rows are padded to the header
    /// width; extra cells beyond it are dropped.
    fn write_gfm_table(
        &self,
        output: &mut String,
        headers: &[String],
        alignments: &[TableAlignment],
        rows: &[Vec<String>],
    ) {
        output.push('|');
        for header in headers {
            output.push(' ');
            output.push_str(header);
            output.push_str(" |");
        }
        output.push('\n');

        output.push('|');
        for alignment in alignments {
            output.push(' ');
            match alignment {
                TableAlignment::Left => output.push_str("---"),
                TableAlignment::Center => output.push_str(":---:"),
                TableAlignment::Right => output.push_str("---:"),
            }
            output.push_str(" |");
        }
        output.push('\n');

        for row in rows {
            output.push('|');
            for cell in row.iter().take(headers.len()) {
                output.push(' ');
                output.push_str(cell);
                output.push_str(" |");
            }
            for _ in row.len()..headers.len() {
                output.push_str("  |");
            }
            output.push('\n');
        }
    }

    /// First attribute value with the given name, in DOM insertion order.
    /// Event-handler attributes are invisible to the emitter.
    fn attr_value(&self, node: &Handle, name: &str) -> Option<String> {
        if let NodeData::Element { ref attrs, .. } = node.data {
            attrs
                .borrow()
                .iter()
                .filter(|attr| {
                    !self
                        .security_validator
                        .is_event_handler(attr.name.local.as_ref())
                })
                .find(|attr| attr.name.local.as_ref() == name)
                .map(|attr| attr.value.to_string())
        } else {
            None
        }
    }

    /// Separate the next block from whatever came before with one blank
    /// line (no-op at the start of the document).
    fn ensure_blank_line(&self, output: &mut String) {
        if !output.is_empty() && !output.ends_with("\n\n") {
            if output.ends_with('\n') {
                output.push('\n');
            } else {
                output.push_str("\n\n");
            }
        }
    }

    /// Extract text exactly as-is; used for code blocks and code spans
    /// where whitespace is content.
    fn extract_code_content(&self, node: &Handle, output: &mut String) {
        match node.data {
            NodeData::Text { ref contents } => {
                output.push_str(&contents.borrow());
            }
            NodeData::Element { .. } => {
                for child in node.children.borrow().iter() {
                    self.extract_code_content(child, output);
                }
            }
            _ => {}
        }
    }

    /// Extract plain text from a subtree, ignoring markup.
    fn extract_text(&self, node: &Handle, output: &mut String) {
        match node.data {
            NodeData::Text { ref contents } => {
                output.push_str(&contents.borrow());
            }
            NodeData::Element { .. } => {
                for child in node.children.borrow().iter() {
                    self.extract_text(child, output);
                }
            }
            _ => {}
        }
    }

    /// Collapse all whitespace runs in a text node to single spaces and
    /// trim the ends.
    fn normalize_text(&self, text: &str) -> String {
        let words: Vec<&str> = text.split_whitespace().collect();
        words.join(" ")
    }

    /// Final normalization pass over the emitted Markdown.
    ///
    /// Enforces LF-only line endings, collapses blank-line runs, strips
    /// trailing whitespace per line, collapses intra-line space runs
    /// (outside code), and terminates the output with exactly one LF.
    /// Running this pass over its own output is a no-op.
    fn normalize_output(&self, output: String) -> String {
        let output = output.replace("\r\n", "\n");

        let mut result = String::with_capacity(output.len());
        let mut prev_blank = false;
        let mut in_code_block = false;

        for line in output.lines() {
            if line.trim_start().starts_with("```") {
                in_code_block = !in_code_block;
            }

            let trimmed = line.trim_end();

            if trimmed.is_empty() {
                if !prev_blank {
                    result.push('\n');
                    prev_blank = true;
                }
            } else {
                if in_code_block {
                    result.push_str(trimmed);
                } else {
                    let normalized = self.normalize_line_whitespace(trimmed);
                    result.push_str(&normalized);
                }
                result.push('\n');
                prev_blank = false;
            }
        }

        if !result.ends_with('\n') {
            result.push('\n');
        } else {
            while result.ends_with("\n\n") {
                result.pop();
            }
        }

        result
    }

    /// Collapse space runs within one line, preserving leading indentation
    /// (list nesting) and the inside of inline code spans.
    fn normalize_line_whitespace(&self, line: &str) -> String {
        let mut result = String::with_capacity(line.len());
        let mut prev_space = false;
        let mut at_start = true;
        let mut in_inline_code = false;

        for ch in line.chars() {
            if ch == '`' {
                in_inline_code = !in_inline_code;
                result.push(ch);
                prev_space = false;
                at_start = false;
            } else if ch == ' ' {
                if in_inline_code || at_start {
                    result.push(ch);
                } else if !prev_space {
                    result.push(ch);
                    prev_space = true;
                }
            } else {
                result.push(ch);
                prev_space = false;
                at_start = false;
            }
        }

        result
    }
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}
