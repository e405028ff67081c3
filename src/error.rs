//! Error taxonomy for everything that talks to the remote API.
//!
//! Application-level code (config loading, CLI, relay startup) uses `anyhow`;
//! the core components return [`FetchError`] so callers can tell a transient
//! failure from a rejected credential or a refused mutation.

use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

use crate::github::rate_limit;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Single page or network failure. Propagated, never retried internally.
    #[error("request failed: {0}")]
    Transient(String),

    /// HTTP 401/403: the credential is no longer usable for this session.
    #[error("authorization rejected (HTTP {status})")]
    AuthInvalid { status: u16 },

    /// Non-2xx answer to a mutation's confirmation call.
    #[error("remote rejected the request (HTTP {status}): {message}")]
    RemoteRejected { status: u16, message: String },

    /// The payload did not have the expected shape.
    #[error("unexpected response: {0}")]
    Malformed(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

impl FetchError {
    /// Whether this error invalidates the stored credential.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthInvalid { .. })
    }

    /// A read that hit a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Transient(msg) if msg.starts_with("HTTP 404"))
    }

    /// Classify a non-2xx status returned by a read request.
    pub fn from_fetch_status(status: StatusCode, body: &str) -> Self {
        if rate_limit::is_rate_limited(status, body) {
            return Self::RateLimited(rate_limit::format_rate_limit_message(body));
        }
        match status.as_u16() {
            code @ (401 | 403) => Self::AuthInvalid { status: code },
            code => Self::Transient(format!("HTTP {code}: {}", truncate(body, 200))),
        }
    }

    /// Classify a non-2xx status returned by a mutation.
    pub fn from_mutation_status(status: StatusCode, body: &str) -> Self {
        if rate_limit::is_rate_limited(status, body) {
            return Self::RateLimited(rate_limit::format_rate_limit_message(body));
        }
        match status.as_u16() {
            code @ (401 | 403) => Self::AuthInvalid { status: code },
            code => Self::RemoteRejected {
                status: code,
                message: truncate(body, 200).to_owned(),
            },
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
