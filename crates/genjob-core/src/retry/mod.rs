//! Retry and backoff policy.
//!
//! This module encapsulates error classification (timeouts, throttling,
//! connection failures, truncated transfers) and exponential backoff
//! decisions so that submission, polling and download share one policy.

mod classify;
mod policy;
mod run;

pub use classify::{
    classify_http_status, classify_message, classify_reqwest_error, is_retryable, Classify,
};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, run_with_smart_retry, run_with_smart_retry_cancellable, RetryState};
