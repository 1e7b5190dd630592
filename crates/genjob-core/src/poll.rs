//! Status poller.
//!
//! Sleeps `interval` before each status request (the job was just created),
//! issues one request at a time through smart retry, and folds each answer
//! into the monotonic [`JobState`]. The loop ends on a terminal state, when
//! `max_wait` runs out, or when the cancel token fires. Cancellation and the
//! deadline also interrupt sleeps and retry backoff.

use std::future::pending;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::PollConfig;
use crate::control::CancelToken;
use crate::error::JobError;
use crate::job::{JobHandle, JobState, JobStatus};
use crate::provider::JobProvider;
use crate::retry::{run_with_smart_retry, RetryPolicy};

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// `None` polls until a terminal state or cancellation.
    pub max_wait: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

impl From<&PollConfig> for PollOptions {
    fn from(cfg: &PollConfig) -> Self {
        Self {
            interval: cfg.interval(),
            max_wait: cfg.max_wait(),
            cancel: None,
        }
    }
}

impl PollOptions {
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

async fn cancelled(token: Option<&CancelToken>) {
    match token {
        Some(t) => t.cancelled().await,
        None => pending().await,
    }
}

async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => pending().await,
    }
}

/// Poll `handle` until it completes or fails.
///
/// `Ok` carries the terminal status, `Completed` or `Failed`; turning a remote
/// failure into an error is the caller's business. `on_progress` fires once per
/// state change, starting from an implicit `Queued`.
pub async fn poll_until_complete<P>(
    provider: &dyn JobProvider,
    handle: &JobHandle,
    opts: &PollOptions,
    retry: &RetryPolicy,
    mut on_progress: P,
) -> Result<JobStatus, JobError>
where
    P: FnMut(&JobStatus),
{
    let started = Instant::now();
    let deadline = opts.max_wait.map(|w| started + w);
    let cancel = opts.cancel.as_ref();
    let timed_out = || JobError::PollTimeout {
        waited: started.elapsed(),
    };

    let mut current = JobState::Queued;
    let mut skip_sleep = provider.completes_on_submit();
    let mut polls = 0u32;

    loop {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(JobError::Cancelled);
        }

        if !skip_sleep {
            let (wait, last_chance) = match deadline {
                Some(d) => {
                    let remaining = d.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(timed_out());
                    }
                    (remaining.min(opts.interval), remaining < opts.interval)
                }
                None => (opts.interval, false),
            };
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancelled(cancel) => return Err(JobError::Cancelled),
            }
            if last_chance {
                return Err(timed_out());
            }
        }
        skip_sleep = false;

        polls += 1;
        tracing::debug!(provider = %handle.provider, job_id = %handle.id, poll = polls, "checking job status");
        let observed = tokio::select! {
            r = run_with_smart_retry(
                retry,
                |s| tracing::warn!(
                    job_id = %handle.id,
                    attempt = s.attempt,
                    delay_ms = s.next_delay.as_millis() as u64,
                    "status check failed, retrying: {}",
                    s.last_error
                ),
                || provider.status(handle),
            ) => r?,
            _ = cancelled(cancel) => return Err(JobError::Cancelled),
            _ = expired(deadline) => return Err(timed_out()),
        };

        let next = current.advance(observed);
        if next != current {
            current = next;
            let status = JobStatus {
                handle: handle.clone(),
                state: current.clone(),
            };
            tracing::debug!(job_id = %handle.id, state = current.label(), "job state changed");
            on_progress(&status);
        }

        if current.is_terminal() {
            tracing::info!(
                job_id = %handle.id,
                state = current.label(),
                polls,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "job finished"
            );
            return Ok(JobStatus {
                handle: handle.clone(),
                state: current,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ArtifactRef, ProviderId};
    use crate::provider::scripted::ScriptedProvider;

    fn handle() -> JobHandle {
        JobHandle::new("job-1", ProviderId::Sora)
    }

    fn done() -> JobState {
        JobState::Completed {
            artifact: ArtifactRef::new("file:///tmp/out.mp4"),
        }
    }

    fn opts(interval_secs: u64, max_wait_secs: Option<u64>) -> PollOptions {
        PollOptions {
            interval: Duration::from_secs(interval_secs),
            max_wait: max_wait_secs.map(Duration::from_secs),
            cancel: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reports_each_change_and_stops_at_completion() {
        let provider = ScriptedProvider::states(vec![
            JobState::running(10),
            JobState::running(50),
            done(),
        ]);
        let mut seen = Vec::new();
        let started = Instant::now();

        let status = poll_until_complete(
            &provider,
            &handle(),
            &opts(10, Some(1800)),
            &RetryPolicy::default(),
            |s| seen.push(s.state.clone()),
        )
        .await
        .unwrap();

        assert_eq!(status.state, done());
        assert_eq!(provider.polls(), 3);
        assert_eq!(seen, vec![JobState::running(10), JobState::running(50), done()]);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_states_are_not_reported() {
        let provider = ScriptedProvider::states(vec![
            JobState::Queued,
            JobState::Queued,
            JobState::running(0),
            JobState::running(0),
            done(),
        ]);
        let mut calls = 0;
        poll_until_complete(&provider, &handle(), &opts(1, None), &RetryPolicy::default(), |_| {
            calls += 1
        })
        .await
        .unwrap();
        assert_eq!(provider.polls(), 5);
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_is_returned_as_status() {
        let provider = ScriptedProvider::states(vec![JobState::failed(
            Some("moderation_blocked".into()),
            "blocked",
        )]);
        let status = poll_until_complete(&provider, &handle(), &opts(10, None), &RetryPolicy::default(), |_| {})
            .await
            .unwrap();
        assert!(matches!(status.state, JobState::Failed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_wait() {
        let provider = ScriptedProvider::states(vec![JobState::running(5)]);
        let started = Instant::now();
        let err = poll_until_complete(&provider, &handle(), &opts(10, Some(25)), &RetryPolicy::default(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::PollTimeout { waited } if waited == Duration::from_secs(25)));
        assert_eq!(provider.polls(), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(25));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_sleep() {
        let provider = ScriptedProvider::states(vec![JobState::running(5)]);
        let token = CancelToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            trigger.cancel();
        });
        let started = Instant::now();
        let err = poll_until_complete(
            &provider,
            &handle(),
            &opts(10, None).with_cancel(token),
            &RetryPolicy::default(),
            |_| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, JobError::Cancelled));
        assert_eq!(provider.polls(), 1);
        assert_eq!(started.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_status_errors_are_retried() {
        let provider = ScriptedProvider::new(vec![
            Err(JobError::Http {
                status: 503,
                message: "service unavailable".into(),
            }),
            Ok(done()),
        ]);
        let status = poll_until_complete(&provider, &handle(), &opts(10, None), &RetryPolicy::default(), |_| {})
            .await
            .unwrap();
        assert_eq!(status.state, done());
        assert_eq!(provider.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn synchronous_provider_is_asked_without_sleeping() {
        let provider = ScriptedProvider::states(vec![done()]).synchronous();
        let started = Instant::now();
        poll_until_complete(&provider, &handle(), &opts(10, None), &RetryPolicy::default(), |_| {})
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
