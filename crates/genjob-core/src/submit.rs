//! Job submission: validate locally, then create the remote job under smart retry.

use std::sync::Arc;

use crate::control::CancelToken;
use crate::error::JobError;
use crate::job::{JobHandle, JobRequest};
use crate::provider::JobProvider;
use crate::retry::{run_with_smart_retry_cancellable, RetryPolicy};

pub struct Submitter {
    provider: Arc<dyn JobProvider>,
    retry: RetryPolicy,
    cancel: Option<CancelToken>,
}

impl Submitter {
    pub fn new(provider: Arc<dyn JobProvider>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            retry,
            cancel: None,
        }
    }

    /// Stop creating (and backing off) once `token` fires.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Create one remote job and return its handle.
    ///
    /// Validation runs before any network call and is never retried. Creation
    /// has no idempotency key: a create that failed after the provider
    /// accepted it may leave a duplicate job behind when retried.
    pub async fn submit(&self, request: &JobRequest) -> Result<JobHandle, JobError> {
        let provider_id = self.provider.id();
        if request.provider != provider_id {
            return Err(JobError::Validation(format!(
                "request is for {} but the client serves {provider_id}",
                request.provider
            )));
        }
        self.provider.validate(request)?;

        let id = run_with_smart_retry_cancellable(
            &self.retry,
            self.cancel.as_ref(),
            |s| {
                tracing::warn!(
                    provider = %provider_id,
                    attempt = s.attempt,
                    delay_ms = s.next_delay.as_millis() as u64,
                    "create failed, retrying; the provider may now hold a duplicate job: {}",
                    s.last_error
                )
            },
            || self.provider.create(request),
        )
        .await?;

        let handle = JobHandle::new(id, provider_id);
        tracing::info!(provider = %provider_id, job_id = %handle.id, family = request.family(), "job submitted");
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobState, ProviderId, VideoRequest};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fails `create` with the scripted errors, then succeeds.
    struct Flaky {
        failures: Mutex<Vec<JobError>>,
        creates: AtomicU32,
    }

    impl Flaky {
        fn new(failures: Vec<JobError>) -> Self {
            Self {
                failures: Mutex::new(failures),
                creates: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl JobProvider for Flaky {
        fn id(&self) -> ProviderId {
            ProviderId::Sora
        }

        fn validate(&self, request: &JobRequest) -> Result<(), JobError> {
            match &request.body {
                crate::job::RequestBody::Video(v) if !v.prompt.is_empty() => Ok(()),
                _ => Err(JobError::Validation("prompt must not be empty".into())),
            }
        }

        async fn create(&self, _request: &JobRequest) -> Result<String, JobError> {
            let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
            let next = self.failures.lock().unwrap().pop();
            match next {
                Some(e) => Err(e),
                None => Ok(format!("job-{n}")),
            }
        }

        async fn status(&self, _handle: &JobHandle) -> Result<JobState, JobError> {
            Ok(JobState::Queued)
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            ..RetryPolicy::default()
        }
    }

    fn request(prompt: &str) -> JobRequest {
        JobRequest::video(
            ProviderId::Sora,
            VideoRequest {
                prompt: prompt.into(),
                ..VideoRequest::default()
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_request_never_reaches_create() {
        let provider = Arc::new(Flaky::new(vec![]));
        let submitter = Submitter::new(provider.clone(), policy());
        let err = submitter.submit(&request("")).await.unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));
        assert_eq!(provider.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_create_is_retried() {
        let provider = Arc::new(Flaky::new(vec![JobError::Http {
            status: 429,
            message: "rate limit".into(),
        }]));
        let submitter = Submitter::new(provider.clone(), policy());
        let handle = submitter.submit(&request("a lighthouse")).await.unwrap();
        assert_eq!(handle.id, "job-2");
        assert_eq!(handle.provider, ProviderId::Sora);
        assert_eq!(provider.creates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn bad_request_create_is_not_retried() {
        let provider = Arc::new(Flaky::new(vec![JobError::Http {
            status: 400,
            message: "invalid size".into(),
        }]));
        let submitter = Submitter::new(provider.clone(), policy());
        let err = submitter.submit(&request("a lighthouse")).await.unwrap_err();
        assert!(matches!(err, JobError::Http { status: 400, .. }));
        assert_eq!(provider.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn request_for_another_provider_is_rejected() {
        let submitter = Submitter::new(Arc::new(Flaky::new(vec![])), policy());
        let mut req = request("x");
        req.provider = ProviderId::Veo;
        assert!(matches!(submitter.submit(&req).await, Err(JobError::Validation(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_create_backoff() {
        let provider = Arc::new(Flaky::new(vec![
            JobError::Http {
                status: 503,
                message: "busy".into(),
            },
            JobError::Http {
                status: 503,
                message: "busy".into(),
            },
        ]));
        let token = CancelToken::new();
        let submitter = Submitter::new(provider.clone(), policy()).with_cancel(token.clone());
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });
        let started = tokio::time::Instant::now();

        let err = submitter.submit(&request("a lighthouse")).await.unwrap_err();

        assert!(matches!(err, JobError::Cancelled));
        assert_eq!(provider.creates.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }
}
