//! Accept-header negotiation for the Markdown variant
//!
//! Decides whether a request is asking for `text/markdown`. The decision
//! compares the best-matching media range for `text/markdown` against the
//! best match for `text/html` (the type the upstream actually serves):
//! Markdown wins on strictly higher quality, or on equal quality when its
//! range appears first in the header. Wildcard ranges (`*/*`, `text/*`)
//! only count toward Markdown when the `on_wildcard` setting is enabled;
//! they always count toward HTML.

use http::HeaderMap;
use http::header::ACCEPT;

/// A parsed media range from an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
struct MediaRange {
    kind: String,
    subtype: String,
    quality: f32,
    /// Position of the range within the concatenated header value, used for
    /// first-wins tie-breaking.
    position: usize,
}

impl MediaRange {
    /// Specificity rank: exact type beats `type/*` beats `*/*`.
    fn specificity(&self) -> u8 {
        match (self.kind.as_str(), self.subtype.as_str()) {
            ("*", _) => 0,
            (_, "*") => 1,
            _ => 2,
        }
    }

    /// Whether this range covers the given concrete type. Wildcard coverage
    /// can be disabled (the `on_wildcard` gate for `text/markdown`).
    fn covers(&self, kind: &str, subtype: &str, allow_wildcards: bool) -> bool {
        match (self.kind.as_str(), self.subtype.as_str()) {
            ("*", "*") => allow_wildcards,
            (t, "*") => allow_wildcards && t == kind,
            (t, s) => t == kind && s == subtype,
        }
    }
}

/// Parse every `Accept` header value on the request into media ranges.
///
/// Malformed ranges (no `/`, empty type) are skipped. A malformed or
/// missing `q` parameter falls back to 1.0; values are clamped to [0, 1].
fn parse_accept(headers: &HeaderMap) -> Vec<MediaRange> {
    let mut ranges = Vec::new();
    let mut position = 0;

    for value in headers.get_all(ACCEPT) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for part in value.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let mut segments = part.split(';');
            let essence = segments.next().unwrap_or("").trim();
            let Some((kind, subtype)) = essence.split_once('/') else {
                continue;
            };
            let (kind, subtype) = (kind.trim(), subtype.trim());
            if kind.is_empty() || subtype.is_empty() {
                continue;
            }

            let mut quality = 1.0f32;
            for param in segments {
                let Some((name, raw)) = param.split_once('=') else {
                    continue;
                };
                if name.trim().eq_ignore_ascii_case("q") {
                    quality = raw.trim().parse::<f32>().unwrap_or(1.0).clamp(0.0, 1.0);
                    break;
                }
            }

            ranges.push(MediaRange {
                kind: kind.to_ascii_lowercase(),
                subtype: subtype.to_ascii_lowercase(),
                quality,
                position,
            });
            position += 1;
        }
    }

    ranges
}

/// Best `(quality, specificity, position)` among ranges covering a
/// concrete type.
///
/// Higher quality wins; at equal quality the more specific range wins, and
/// at equal specificity the earlier one. The winning range's specificity
/// and position feed the markdown-vs-html tie-break.
fn best_match(
    ranges: &[MediaRange],
    kind: &str,
    subtype: &str,
    allow_wildcards: bool,
) -> Option<(f32, u8, usize)> {
    let mut best: Option<&MediaRange> = None;
    for range in ranges {
        if !range.covers(kind, subtype, allow_wildcards) {
            continue;
        }
        best = match best {
            None => Some(range),
            Some(current) => {
                let better = range.quality > current.quality
                    || (range.quality == current.quality
                        && range.specificity() > current.specificity());
                if better { Some(range) } else { Some(current) }
            }
        };
    }
    best.map(|r| (r.quality, r.specificity(), r.position))
}

/// Decide whether the request prefers `text/markdown` over the upstream's
/// native `text/html`.
///
/// Returns `false` for a missing or empty `Accept` header: absent
/// preference never opts a client in.
pub fn markdown_requested(headers: &HeaderMap, on_wildcard: bool) -> bool {
    let ranges = parse_accept(headers);
    if ranges.is_empty() {
        return false;
    }

    let Some((md_q, md_spec, md_pos)) = best_match(&ranges, "text", "markdown", on_wildcard)
    else {
        return false;
    };
    if md_q <= 0.0 {
        return false;
    }

    // Quality first, then specificity, then first-in-header.
    match best_match(&ranges, "text", "html", true) {
        None => true,
        Some((html_q, html_spec, html_pos)) => {
            md_q > html_q
                || (md_q == html_q
                    && (md_spec > html_spec || (md_spec == html_spec && md_pos <= html_pos)))
        }
    }
}
