//! Provider adapters behind one `create / status` contract.
//!
//! Each adapter translates a [`JobRequest`] into its API's payload, maps the
//! API's job states onto [`JobState`], and hands back an [`ArtifactRef`] (with
//! any auth headers the download needs) once the job completes. Synchronous
//! APIs (TTS, logo search, video analysis) finish inside `create` and report
//! `completes_on_submit`, so the poller does not sleep before asking.

mod credentials;
mod finished;
mod media;
#[cfg(test)]
pub(crate) mod scripted;

pub mod fish_audio;
pub mod logo_dev;
pub mod qwen;
pub mod replicate;
pub mod sora;
pub mod veo;
pub mod wan;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::GenjobConfig;
use crate::error::JobError;
use crate::job::{JobHandle, JobRequest, JobState, ProviderId};

pub use credentials::credential;
pub(crate) use finished::FinishedJobs;

#[async_trait]
pub trait JobProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Reject malformed requests before any network call.
    fn validate(&self, request: &JobRequest) -> Result<(), JobError>;

    /// Create the remote job and return its provider-side id.
    /// Not idempotent: a retried create may leave a duplicate job on the provider.
    async fn create(&self, request: &JobRequest) -> Result<String, JobError>;

    /// One status request.
    async fn status(&self, handle: &JobHandle) -> Result<JobState, JobError>;

    /// True when `create` already holds the final result.
    fn completes_on_submit(&self) -> bool {
        false
    }
}

/// Build the adapter for `id`, reading its credentials from the environment.
pub fn from_config(
    id: ProviderId,
    cfg: &GenjobConfig,
    client: Client,
) -> Result<Arc<dyn JobProvider>, JobError> {
    let urls = &cfg.providers;
    let provider: Arc<dyn JobProvider> = match id {
        ProviderId::Sora => Arc::new(sora::SoraProvider::from_env(client, urls.openai.as_deref())?),
        ProviderId::Wan => Arc::new(wan::WanProvider::from_env(client, urls.dashscope.as_deref())?),
        ProviderId::Veo => Arc::new(veo::VeoProvider::from_env(client, urls.gemini.as_deref())?),
        ProviderId::FishAudio => Arc::new(fish_audio::FishAudioProvider::from_env(
            client,
            urls.fish_audio.as_deref(),
        )?),
        ProviderId::Seedream | ProviderId::NanoBanana => Arc::new(
            replicate::ReplicateProvider::from_env(id, client, urls.replicate.as_deref())?,
        ),
        ProviderId::LogoDev => Arc::new(logo_dev::LogoDevProvider::from_env(
            client,
            urls.logo_search.as_deref(),
            urls.logo_image.as_deref(),
        )?),
        ProviderId::Qwen => Arc::new(qwen::QwenProvider::from_env(client, urls.dashscope.as_deref())?),
    };
    Ok(provider)
}

/// Join a base URL and a path without doubling slashes.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Fail with a validation error unless `value` is one of `allowed`.
pub(crate) fn ensure_one_of<T>(field: &str, value: &T, allowed: &[T]) -> Result<(), JobError>
where
    T: PartialEq + std::fmt::Display,
{
    if allowed.contains(value) {
        return Ok(());
    }
    let list: Vec<String> = allowed.iter().map(|a| a.to_string()).collect();
    Err(JobError::Validation(format!(
        "{field} must be one of [{}], got {value}",
        list.join(", ")
    )))
}

pub(crate) fn ensure_non_empty(field: &str, value: &str) -> Result<(), JobError> {
    if value.trim().is_empty() {
        return Err(JobError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Validation error for a request family the adapter does not serve.
pub(crate) fn wrong_family(provider: ProviderId, request: &JobRequest) -> JobError {
    JobError::Validation(format!(
        "{provider} does not accept {} requests",
        request.family()
    ))
}
