//! Shared reqwest plumbing: client construction and status-to-error mapping.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::JobError;

/// Longest slice of an error body kept in `JobError` messages.
const MAX_ERROR_BODY: usize = 512;

/// Client with the crate user agent and a per-request timeout.
pub fn build_client(timeout: Duration) -> Result<Client, JobError> {
    Client::builder()
        .user_agent(concat!("genjob/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(30))
        .timeout(timeout)
        .build()
        .map_err(JobError::Transport)
}

/// Map a non-success status and its body to a typed error.
pub fn error_from_status(status: StatusCode, body: &str) -> JobError {
    let message = extract_message(body);
    match status.as_u16() {
        401 | 403 => JobError::Auth {
            status: status.as_u16(),
            message,
        },
        code => JobError::Http {
            status: code,
            message,
        },
    }
}

/// Pass a success response through, or turn it into an error carrying the body text.
pub async fn check_status(resp: Response) -> Result<Response, JobError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(error_from_status(status, &body))
}

/// Send a request and decode a JSON success body.
pub async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, JobError> {
    let resp = check_status(req.send().await?).await?;
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        JobError::Protocol(format!(
            "{e}: {}",
            truncate(&String::from_utf8_lossy(&bytes))
        ))
    })
}

/// Providers wrap errors as `{"error": {"message": ..}}`, `{"message": ..}` or
/// `{"detail": ..}`; fall back to the raw (truncated) body.
fn extract_message(body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            v.pointer("/error/message"),
            v.pointer("/message"),
            v.pointer("/detail"),
            v.pointer("/error"),
        ];
        for c in candidates.into_iter().flatten() {
            if let Some(s) = c.as_str() {
                return truncate(s);
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    truncate(trimmed)
}

fn truncate(s: &str) -> String {
    if s.len() <= MAX_ERROR_BODY {
        return s.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
