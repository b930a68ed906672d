//! Conditional-request evaluation for the Markdown variant
//!
//! Runs after conversion has succeeded (or, in `if_modified_since_only`
//! mode, before conversion is even attempted) and decides between a full
//! 200 and a 304. Precedence follows RFC 9110 §13: when the request
//! carries `If-None-Match`, `If-Modified-Since` is ignored.
//!
//! Entity tags are compared with the strong comparison function: a match
//! requires that neither tag is weak (`W/`-prefixed) and that the opaque
//! quoted values are identical byte for byte. The Markdown variant's tag
//! is always strong, so a client echoing a weakened form never matches.

use http::HeaderMap;
use http::header::{IF_MODIFIED_SINCE, IF_NONE_MATCH};

use crate::config::ConditionalMode;

/// Outcome of conditional evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalDecision {
    /// Emit the full 200 response
    Fresh,
    /// The client's cached variant is current: emit 304
    NotModified,
}

/// Evaluate the request's conditional headers against the variant.
///
/// `variant_etag` is the converted representation's ETag (quoted form);
/// `upstream_last_modified` is the origin's `Last-Modified` value, passed
/// through in origin form.
pub fn evaluate(
    mode: ConditionalMode,
    request: &HeaderMap,
    variant_etag: Option<&str>,
    upstream_last_modified: Option<&str>,
) -> ConditionalDecision {
    match mode {
        ConditionalMode::Disabled => ConditionalDecision::Fresh,
        ConditionalMode::IfModifiedSinceOnly => {
            evaluate_if_modified_since(request, upstream_last_modified)
        }
        ConditionalMode::FullSupport => {
            if request.contains_key(IF_NONE_MATCH) {
                evaluate_if_none_match(request, variant_etag)
            } else {
                evaluate_if_modified_since(request, upstream_last_modified)
            }
        }
    }
}

/// `If-None-Match` against the variant ETag, strong comparison.
///
/// A `*` member matches any existing representation. A weak member
/// (`W/"..."`) never compares strongly equal; unparsable members are
/// skipped. With no match the response stays fresh.
fn evaluate_if_none_match(request: &HeaderMap, variant_etag: Option<&str>) -> ConditionalDecision {
    let Some(variant_etag) = variant_etag else {
        return ConditionalDecision::Fresh;
    };
    // The variant tag is generated strong; a weak tag on either side can
    // never compare strongly equal.
    if variant_etag.starts_with("W/") {
        return ConditionalDecision::Fresh;
    }

    for value in request.get_all(IF_NONE_MATCH) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for member in value.split(',') {
            let member = member.trim();
            if member == "*" {
                return ConditionalDecision::NotModified;
            }
            if !member.starts_with("W/") && member == variant_etag {
                return ConditionalDecision::NotModified;
            }
        }
    }

    ConditionalDecision::Fresh
}

/// `If-Modified-Since` against the upstream `Last-Modified` date.
///
/// Unparsable dates on either side leave the response fresh, which is the
/// safe direction.
pub fn evaluate_if_modified_since(
    request: &HeaderMap,
    upstream_last_modified: Option<&str>,
) -> ConditionalDecision {
    let Some(last_modified) = upstream_last_modified else {
        return ConditionalDecision::Fresh;
    };
    let Some(ims_value) = request
        .get(IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
    else {
        return ConditionalDecision::Fresh;
    };

    let (Ok(last_modified), Ok(since)) = (
        httpdate::parse_http_date(last_modified),
        httpdate::parse_http_date(ims_value),
    ) else {
        return ConditionalDecision::Fresh;
    };

    if last_modified <= since {
        ConditionalDecision::NotModified
    } else {
        ConditionalDecision::Fresh
    }
}
