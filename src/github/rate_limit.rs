//! Rate-limit detection for GitHub API responses.
//!
//! GitHub signals rate limits through:
//! - HTTP 403 with "API rate limit exceeded" in the body
//! - HTTP 429 (secondary rate limit)
//! - GraphQL errors containing "rate limit"
//!
//! A rate-limited 403 must not be mistaken for a revoked credential.

use http::StatusCode;

/// Check whether a response status/body pair indicates a GitHub rate limit.
pub(crate) fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    if status != StatusCode::FORBIDDEN {
        return false;
    }
    let msg = body.to_lowercase();
    msg.contains("rate limit")
        || msg.contains("api rate limit exceeded")
        || msg.contains("secondary rate limit")
}

/// Format a user-friendly message for a rate-limit response body.
pub(crate) fn format_rate_limit_message(body: &str) -> String {
    if body.to_lowercase().contains("secondary rate limit") {
        "Secondary rate limit hit, wait a moment then refresh".to_owned()
    } else {
        "API rate limit exceeded, refresh later".to_owned()
    }
}
