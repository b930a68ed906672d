//! Authenticated-request detection
//!
//! Authenticated responses usually carry per-user content, so the filter
//! treats them specially: the cache scope of a converted response is forced
//! to `private`, and the `auth_policy` setting can exclude them from
//! conversion entirely. A request counts as authenticated when it carries a
//! non-empty `Authorization` header or any cookie whose name matches a
//! configured pattern.

use http::HeaderMap;
use http::header::{AUTHORIZATION, COOKIE};

use crate::config::CookiePattern;

/// Classify a request as authenticated.
pub fn is_authenticated(headers: &HeaderMap, patterns: &[CookiePattern]) -> bool {
    if let Some(value) = headers.get(AUTHORIZATION)
        && !value.as_bytes().is_empty()
    {
        return true;
    }

    if patterns.is_empty() {
        return false;
    }

    // A request may carry several Cookie headers; scan them all.
    for value in headers.get_all(COOKIE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let name = pair.split('=').next().unwrap_or("").trim();
            if name.is_empty() {
                continue;
            }
            if patterns.iter().any(|p| p.matches(name)) {
                return true;
            }
        }
    }

    false
}
