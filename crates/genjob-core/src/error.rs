//! Error taxonomy shared by submission, polling, download and the catalog gate.
//!
//! The retry executor never wraps these: whatever the last attempt returned is
//! what the caller sees, so `kind()` and `error_kind()` stay inspectable.

use std::path::PathBuf;
use std::time::Duration;

use crate::control::JobAborted;
use crate::retry::{classify_http_status, classify_message, classify_reqwest_error, Classify, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Request parameters are missing or outside what the provider accepts.
    #[error("validation error: {0}")]
    Validation(String),

    /// Required credential environment variable is unset or empty.
    #[error("missing credential: environment variable {var} is not set")]
    MissingCredential { var: &'static str },

    /// Provider rejected the credentials (HTTP 401/403).
    #[error("authentication failed (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Transport-level failure (connect, timeout, reset, body read).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider reports the job itself as failed (e.g. content policy).
    #[error("remote job failed{}: {message}", code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    RemoteJobFailed { code: Option<String>, message: String },

    /// Fewer bytes arrived than the server announced.
    #[error("truncated transfer: expected {expected} bytes, got {received}")]
    Truncated { expected: u64, received: u64 },

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Polling exceeded the configured wall-clock budget.
    #[error("job did not finish within {}s", waited.as_secs())]
    PollTimeout { waited: Duration },

    #[error("job cancelled")]
    Cancelled,

    /// Provider answered with a shape we do not understand.
    #[error("unexpected provider response: {0}")]
    Protocol(String),

    #[error("catalog file {} is malformed: {source}", path.display())]
    CatalogParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Opaque failure from a collaborator; classified by its message.
    #[error("{0}")]
    Opaque(String),
}

impl JobError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        JobError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable snake_case tag used in CLI JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Validation(_) => "validation",
            JobError::MissingCredential { .. } | JobError::Auth { .. } => "auth",
            JobError::Http { .. } | JobError::Transport(_) | JobError::Opaque(_) => {
                if self.error_kind().is_retryable() {
                    "transient"
                } else {
                    "request"
                }
            }
            JobError::RemoteJobFailed { .. } => "remote_job_failure",
            JobError::Truncated { .. } | JobError::Io { .. } => "download_integrity",
            JobError::PollTimeout { .. } => "timeout",
            JobError::Cancelled => "cancelled",
            JobError::Protocol(_) => "protocol",
            JobError::CatalogParse { .. } => "catalog",
        }
    }
}

impl From<JobAborted> for JobError {
    fn from(_: JobAborted) -> Self {
        JobError::Cancelled
    }
}

impl Classify for JobError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            JobError::Http { status, .. } => classify_http_status(*status),
            JobError::Transport(e) => classify_reqwest_error(e),
            JobError::Truncated { .. } => ErrorKind::Truncated,
            JobError::Opaque(msg) => classify_message(msg),
            // A local read or write that fails partway is a broken transfer: the
            // `.part` file is removed and the next attempt starts clean. Missing
            // sources and refused permissions stay fatal.
            JobError::Io { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound
                | std::io::ErrorKind::PermissionDenied
                | std::io::ErrorKind::InvalidInput
                | std::io::ErrorKind::AlreadyExists
                | std::io::ErrorKind::Unsupported => ErrorKind::Other,
                _ => ErrorKind::Truncated,
            },
            JobError::Validation(_)
            | JobError::MissingCredential { .. }
            | JobError::Auth { .. }
            | JobError::RemoteJobFailed { .. }
            | JobError::PollTimeout { .. }
            | JobError::Cancelled
            | JobError::Protocol(_)
            | JobError::CatalogParse { .. } => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_follow_taxonomy() {
        assert_eq!(JobError::Validation("x".into()).kind(), "validation");
        assert_eq!(JobError::MissingCredential { var: "OPENAI_API_KEY" }.kind(), "auth");
        assert_eq!(
            JobError::Http {
                status: 503,
                message: "busy".into()
            }
            .kind(),
            "transient"
        );
        assert_eq!(
            JobError::Http {
                status: 404,
                message: "gone".into()
            }
            .kind(),
            "request"
        );
        assert_eq!(
            JobError::Truncated {
                expected: 10,
                received: 5
            }
            .kind(),
            "download_integrity"
        );
    }

    #[test]
    fn remote_failure_display_includes_code() {
        let e = JobError::RemoteJobFailed {
            code: Some("moderation_blocked".into()),
            message: "prompt rejected".into(),
        };
        assert_eq!(e.to_string(), "remote job failed (moderation_blocked): prompt rejected");
        let e = JobError::RemoteJobFailed {
            code: None,
            message: "boom".into(),
        };
        assert_eq!(e.to_string(), "remote job failed: boom");
    }

    #[test]
    fn fatal_errors_are_not_retryable() {
        assert!(!JobError::Validation("bad".into()).error_kind().is_retryable());
        assert!(!JobError::Auth {
            status: 401,
            message: "no".into()
        }
        .error_kind()
        .is_retryable());
        assert!(!JobError::RemoteJobFailed {
            code: None,
            message: "policy".into()
        }
        .error_kind()
        .is_retryable());
        assert!(JobError::Truncated {
            expected: 2,
            received: 1
        }
        .error_kind()
        .is_retryable());
    }

    #[test]
    fn partial_write_failures_are_retried() {
        let write_failed = JobError::io(
            "/tmp/clip.mp4.part",
            std::io::Error::new(std::io::ErrorKind::Other, "input/output error"),
        );
        assert_eq!(write_failed.error_kind(), ErrorKind::Truncated);
        assert!(write_failed.error_kind().is_retryable());
        assert_eq!(write_failed.kind(), "download_integrity");

        let eof = JobError::io("/tmp/x", std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        assert!(eof.error_kind().is_retryable());
    }

    #[test]
    fn missing_source_and_permissions_are_fatal() {
        for kind in [std::io::ErrorKind::NotFound, std::io::ErrorKind::PermissionDenied] {
            let e = JobError::io("/tmp/x", std::io::Error::from(kind));
            assert!(!e.error_kind().is_retryable(), "{kind:?}");
        }
    }

    #[test]
    fn aborted_maps_to_cancelled() {
        let e = JobError::from(JobAborted);
        assert!(matches!(e, JobError::Cancelled));
        assert_eq!(e.kind(), "cancelled");
        assert!(!e.error_kind().is_retryable());
    }
}
