//! Retry loop: run an async closure until success or the policy says stop.
//!
//! The cancellable variant races every attempt and every backoff sleep
//! against a [`CancelToken`]; a fired token ends the loop at once.

use std::future::Future;
use std::time::Duration;

use super::classify::Classify;
use super::policy::{ErrorKind, RetryDecision, RetryPolicy};
use crate::control::{CancelToken, JobAborted};

/// What the `on_retry` observer sees before each backoff sleep.
#[derive(Debug)]
pub struct RetryState<'a, E> {
    /// 1-based number of the attempt that just failed.
    pub attempt: u32,
    pub last_error: &'a E,
    /// How long the executor sleeps before the next attempt.
    pub next_delay: Duration,
}

/// Token plus the error to return once it fires.
type Abort<'a, E> = Option<(&'a CancelToken, fn() -> E)>;

fn aborted<E: From<JobAborted>>() -> E {
    E::from(JobAborted)
}

/// Runs `f` until it succeeds or `policy.max_attempts` is reached, treating every
/// error as transient. The last error is returned unchanged.
pub async fn run_with_retry<T, E, F, Fut, O>(policy: &RetryPolicy, on_retry: O, f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    O: FnMut(&RetryState<'_, E>),
{
    retry_loop(policy, None, |_| ErrorKind::Connection, on_retry, f).await
}

/// Like [`run_with_retry`] but stops at the first error whose kind is not retryable.
pub async fn run_with_smart_retry<T, E, F, Fut, O>(
    policy: &RetryPolicy,
    on_retry: O,
    f: F,
) -> Result<T, E>
where
    E: Classify,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    O: FnMut(&RetryState<'_, E>),
{
    retry_loop(policy, None, E::error_kind, on_retry, f).await
}

/// [`run_with_smart_retry`] that stops with `E::from(JobAborted)` when `cancel` fires,
/// whether an attempt is in flight or the loop is backing off. An attempt that is
/// interrupted is dropped.
pub async fn run_with_smart_retry_cancellable<T, E, F, Fut, O>(
    policy: &RetryPolicy,
    cancel: Option<&CancelToken>,
    on_retry: O,
    f: F,
) -> Result<T, E>
where
    E: Classify + From<JobAborted>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    O: FnMut(&RetryState<'_, E>),
{
    let abort: Abort<'_, E> = cancel.map(|t| (t, aborted::<E> as fn() -> E));
    retry_loop(policy, abort, E::error_kind, on_retry, f).await
}

async fn retry_loop<T, E, F, Fut, C, O>(
    policy: &RetryPolicy,
    abort: Abort<'_, E>,
    classify: C,
    mut on_retry: O,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> ErrorKind,
    O: FnMut(&RetryState<'_, E>),
{
    let mut attempt = 1u32;
    loop {
        let outcome = match abort {
            Some((token, stop)) => {
                if token.is_cancelled() {
                    tracing::debug!(attempt, "cancelled before attempt");
                    return Err(stop());
                }
                tokio::select! {
                    r = f() => r,
                    _ = token.cancelled() => {
                        tracing::debug!(attempt, "cancelled during attempt");
                        return Err(stop());
                    }
                }
            }
            None => f().await,
        };
        match outcome {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => {
                        tracing::debug!(attempt, ?kind, "giving up");
                        return Err(e);
                    }
                    RetryDecision::RetryAfter(d) => {
                        tracing::debug!(attempt, ?kind, delay_ms = d.as_millis() as u64, "retrying");
                        on_retry(&RetryState {
                            attempt,
                            last_error: &e,
                            next_delay: d,
                        });
                        match abort {
                            Some((token, stop)) => {
                                if !token.sleep(d).await {
                                    tracing::debug!(attempt, "cancelled during backoff");
                                    return Err(stop());
                                }
                            }
                            None => tokio::time::sleep(d).await,
                        }
                        attempt += 1;
                    }
                }
            }
        }
    }
}
