//! End-to-end job flow: submit, poll, download, strictly in that order.
//!
//! Every failure is reported with the stage it happened in and whatever the
//! caller needs to pick up from there: a handle once the job exists, and the
//! artifact ref once the job has completed.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::catalog::{slug, CatalogGate, FetchedAsset, GateOutcome};
use crate::config::GenjobConfig;
use crate::control::CancelToken;
use crate::download::Downloader;
use crate::error::JobError;
use crate::http;
use crate::job::{ArtifactRef, DownloadedArtifact, JobHandle, JobRequest, JobState, JobStatus, LogoRequest, ProviderId};
use crate::poll::{poll_until_complete, PollOptions};
use crate::provider::{self, JobProvider};
use crate::retry::RetryPolicy;
use crate::submit::Submitter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Submit,
    Poll,
    /// The provider ran the job and reported it failed.
    Remote,
    Download,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Submit => "submit",
            Stage::Poll => "poll",
            Stage::Remote => "remote",
            Stage::Download => "download",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {error}")]
pub struct JobFailure {
    pub stage: Stage,
    pub handle: Option<JobHandle>,
    /// Set for download failures so the download alone can be retried.
    pub artifact: Option<ArtifactRef>,
    #[source]
    pub error: JobError,
}

impl JobFailure {
    fn at(stage: Stage, handle: Option<&JobHandle>, error: JobError) -> Self {
        Self {
            stage,
            handle: handle.cloned(),
            artifact: None,
            error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub artifact: DownloadedArtifact,
}

pub struct JobClient {
    provider: Arc<dyn JobProvider>,
    submitter: Submitter,
    downloader: Downloader,
    retry: RetryPolicy,
    poll: PollOptions,
}

impl JobClient {
    pub fn new(
        provider: Arc<dyn JobProvider>,
        downloader: Downloader,
        retry: RetryPolicy,
        poll: PollOptions,
    ) -> Self {
        Self {
            submitter: Submitter::new(provider.clone(), retry.clone()),
            provider,
            downloader,
            retry,
            poll,
        }
    }

    /// Client for `id` wired from config; credentials come from the environment.
    pub fn from_config(id: ProviderId, cfg: &GenjobConfig) -> Result<Self, JobError> {
        let client = http::build_client(cfg.http_timeout())?;
        let retry = RetryPolicy::from(&cfg.retry);
        let provider = provider::from_config(id, cfg, client.clone())?;
        Ok(Self::new(
            provider,
            Downloader::new(client, retry.clone()),
            retry,
            PollOptions::from(&cfg.poll),
        ))
    }

    /// Stop every stage on `token`: create retries, polling and the download
    /// all end with [`JobError::Cancelled`] once it fires.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.poll.cancel = Some(token.clone());
        self.submitter = self.submitter.with_cancel(token.clone());
        self.downloader = self.downloader.with_cancel(token);
        self
    }

    pub async fn submit(&self, request: &JobRequest) -> Result<JobHandle, JobFailure> {
        self.submitter
            .submit(request)
            .await
            .map_err(|e| JobFailure::at(Stage::Submit, None, e))
    }

    /// One status request, without retry or sleeping.
    pub async fn check(&self, handle: &JobHandle) -> Result<JobStatus, JobError> {
        let state = self.provider.status(handle).await?;
        Ok(JobStatus {
            handle: handle.clone(),
            state,
        })
    }

    /// Poll to a terminal state. A provider-reported failure becomes
    /// [`JobError::RemoteJobFailed`] at [`Stage::Remote`].
    pub async fn wait<P>(&self, handle: &JobHandle, on_progress: P) -> Result<JobStatus, JobFailure>
    where
        P: FnMut(&JobStatus),
    {
        let status = poll_until_complete(self.provider.as_ref(), handle, &self.poll, &self.retry, on_progress)
            .await
            .map_err(|e| JobFailure::at(Stage::Poll, Some(handle), e))?;
        match &status.state {
            JobState::Failed { error_kind, message } => Err(JobFailure::at(
                Stage::Remote,
                Some(handle),
                JobError::RemoteJobFailed {
                    code: error_kind.clone(),
                    message: message.clone(),
                },
            )),
            _ => Ok(status),
        }
    }

    pub async fn download(
        &self,
        handle: Option<&JobHandle>,
        artifact: &ArtifactRef,
        dest: &Path,
    ) -> Result<DownloadedArtifact, JobFailure> {
        self.downloader.download(artifact, dest).await.map_err(|e| JobFailure {
            stage: Stage::Download,
            handle: handle.cloned(),
            artifact: Some(artifact.clone()),
            error: e,
        })
    }

    /// Submit `request`, wait for it, and download the artifact to `dest`.
    pub async fn run<P>(
        &self,
        request: &JobRequest,
        dest: &Path,
        on_progress: P,
    ) -> Result<JobOutcome, JobFailure>
    where
        P: FnMut(&JobStatus),
    {
        let handle = self.submit(request).await?;
        self.resume(&handle, dest, on_progress).await
    }

    /// Continue an already submitted job: wait, then download.
    pub async fn resume<P>(
        &self,
        handle: &JobHandle,
        dest: &Path,
        on_progress: P,
    ) -> Result<JobOutcome, JobFailure>
    where
        P: FnMut(&JobStatus),
    {
        let status = self.wait(handle, on_progress).await?;
        let artifact_ref = status.artifact().cloned().ok_or_else(|| {
            JobFailure::at(
                Stage::Poll,
                Some(handle),
                JobError::Protocol("terminal status without artifact".into()),
            )
        })?;
        let artifact = self.download(Some(handle), &artifact_ref, dest).await?;
        Ok(JobOutcome { status, artifact })
    }
}

/// Resolve a brand logo through the catalog, fetching it with `client` on a miss.
///
/// The file lands at `<assets_dir>/<slug>.png`. Concurrent calls for one brand
/// share a single fetch.
pub async fn fetch_logo(
    gate: &CatalogGate,
    client: &JobClient,
    request: &LogoRequest,
    job_id: Option<&str>,
    assets_dir: &Path,
) -> Result<GateOutcome, JobError> {
    gate.lookup_or_fetch(&request.brand, job_id, |key| async move {
        let dest = assets_dir.join(format!("{}.png", slug(&key)));
        let logo = JobRequest::logo(LogoRequest {
            brand: request.brand.trim().to_string(),
            size: request.size,
        });
        let outcome = client.run(&logo, &dest, |_| {}).await.map_err(|f| f.error)?;
        let source = outcome.artifact.source_ref.uri;
        // The image URL carries the publishable token; keep it out of the catalog.
        let source_uri = match source.split_once('?') {
            Some((base, _)) => base.to_string(),
            None => source,
        };
        Ok::<_, JobError>(FetchedAsset {
            artifact_path: outcome.artifact.local_path,
            source_uri,
        })
    })
    .await
}
