//! Cooperative cancellation: shared cancel tokens and a per-job registry.
//!
//! Each in-flight job is registered with a token. Submission, polling and
//! download check it at every suspension point: retry backoff, poll sleeps,
//! in-flight requests and between streamed chunks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::Notify;

/// Marker error for work stopped by a cancel token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobAborted;

impl std::fmt::Display for JobAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job cancelled")
    }
}

impl std::error::Error for JobAborted {}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cloneable cancel flag with an async wait.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep for `d` unless cancelled first. Returns false when cancelled.
    pub async fn sleep(&self, d: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(d) => !self.is_cancelled(),
            _ = self.cancelled() => false,
        }
    }
}

/// Shared registry of job key -> cancel token. The CLI cancels everything on ctrl-c.
#[derive(Default)]
pub struct JobControl {
    jobs: RwLock<HashMap<String, CancelToken>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job; returns the token to hand to its `JobClient` or `Downloader`.
    pub fn register(&self, key: &str) -> CancelToken {
        let token = CancelToken::new();
        if let Ok(mut jobs) = self.jobs.write() {
            jobs.insert(key.to_string(), token.clone());
        }
        token
    }

    /// Unregister a job (call when the job finishes, success or failure).
    pub fn unregister(&self, key: &str) {
        if let Ok(mut jobs) = self.jobs.write() {
            jobs.remove(key);
        }
    }

    /// Request cancellation for one job.
    pub fn cancel(&self, key: &str) -> bool {
        match self.jobs.read() {
            Ok(jobs) => match jobs.get(key) {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Cancel every registered job. Returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        match self.jobs.read() {
            Ok(jobs) => {
                for token in jobs.values() {
                    token.cancel();
                }
                jobs.len()
            }
            Err(_) => 0,
        }
    }
}
