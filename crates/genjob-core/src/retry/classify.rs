//! Classify HTTP status, reqwest errors and opaque messages into retry kinds.
//!
//! Structured signals (status codes, reqwest error flags) are preferred;
//! message matching is the fallback for errors that only carry text.

use crate::error::JobError;
use crate::retry::policy::ErrorKind;

/// Anything that can be mapped onto an [`ErrorKind`] for smart retry.
pub trait Classify {
    fn error_kind(&self) -> ErrorKind;
}

/// Whether smart retry would try `e` again.
pub fn is_retryable(e: &JobError) -> bool {
    e.error_kind().is_retryable()
}

/// Classify an HTTP status code for retry decisions.
pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        408 => ErrorKind::Timeout,
        500..=599 => ErrorKind::Http5xx(code),
        _ => ErrorKind::Other,
    }
}

/// Classify a reqwest error using its flags, then its status, then its message.
pub fn classify_reqwest_error(e: &reqwest::Error) -> ErrorKind {
    if e.is_timeout() {
        return ErrorKind::Timeout;
    }
    if e.is_connect() {
        return ErrorKind::Connection;
    }
    if let Some(status) = e.status() {
        return classify_http_status(status.as_u16());
    }
    if e.is_body() || e.is_decode() || e.is_request() {
        return ErrorKind::Connection;
    }
    if e.is_builder() || e.is_redirect() {
        return ErrorKind::Other;
    }
    classify_message(&e.to_string())
}

const THROTTLE_MARKERS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "overloaded",
    "service_unavailable",
    "service unavailable",
    "temporarily unavailable",
    "throttl",
];

const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out", "deadline exceeded"];

const CONNECTION_MARKERS: &[&str] = &[
    "econnreset",
    "econnrefused",
    "connection reset",
    "connection refused",
    "connection closed",
    "connection aborted",
    "broken pipe",
    "dns",
    "name resolution",
    "getaddrinfo",
    "enotfound",
    "network is unreachable",
];

/// Classify a human-readable error message.
///
/// Retryable markers win over everything else; a message carrying no marker
/// (including "400", "401", "404", "422", "validation", "not found") is `Other`.
pub fn classify_message(msg: &str) -> ErrorKind {
    let lower = msg.to_ascii_lowercase();

    for code in status_tokens(&lower) {
        match classify_http_status(code) {
            ErrorKind::Other => {}
            kind => return kind,
        }
    }
    if THROTTLE_MARKERS.iter().any(|m| lower.contains(m)) {
        return ErrorKind::Throttled;
    }
    if TIMEOUT_MARKERS.iter().any(|m| lower.contains(m)) {
        return ErrorKind::Timeout;
    }
    if CONNECTION_MARKERS.iter().any(|m| lower.contains(m)) {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

/// Standalone three-digit numbers in `s` that look like HTTP status codes.
/// "timeout after 4000ms" yields nothing; "HTTP 503: busy" yields 503.
fn status_tokens(s: &str) -> impl Iterator<Item = u16> + '_ {
    s.split(|c: char| !c.is_ascii_digit())
        .filter(|tok| tok.len() == 3)
        .filter_map(|tok| tok.parse::<u16>().ok())
        .filter(|code| (100..=599).contains(code))
}
