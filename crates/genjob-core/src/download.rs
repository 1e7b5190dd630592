//! Artifact downloader.
//!
//! Streams a finished artifact (`http(s)://`, `file://` or inline `data:`) into
//! `<dest>.part`, checks the byte count against the announced length, and
//! renames it onto `<dest>`. Each attempt starts from an empty `.part`; the
//! whole attempt is wrapped in smart retry. A cancel token stops the download
//! between chunks and during backoff, and the `.part` file goes with it.

use std::path::Path;

use base64::Engine as _;
use reqwest::Client;
use tokio::io::AsyncReadExt;

use crate::checksum;
use crate::control::CancelToken;
use crate::error::JobError;
use crate::http;
use crate::job::{unix_timestamp, ArtifactRef, DownloadedArtifact};
use crate::retry::{run_with_smart_retry_cancellable, RetryPolicy};
use crate::storage::PartFile;

const FILE_COPY_BUF: usize = 64 * 1024;

#[derive(Clone)]
pub struct Downloader {
    client: Client,
    retry: RetryPolicy,
    cancel: Option<CancelToken>,
}

impl Downloader {
    pub fn new(client: Client, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn check_cancelled(&self) -> Result<(), JobError> {
        match &self.cancel {
            Some(t) if t.is_cancelled() => Err(JobError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Download `artifact` to `dest`. Produces exactly one record per successful download.
    pub async fn download(
        &self,
        artifact: &ArtifactRef,
        dest: &Path,
    ) -> Result<DownloadedArtifact, JobError> {
        let shown = display_uri(&artifact.uri);
        tracing::info!(uri = %shown, dest = %dest.display(), "downloading artifact");

        let byte_size = run_with_smart_retry_cancellable(
            &self.retry,
            self.cancel.as_ref(),
            |s| {
                tracing::warn!(
                    attempt = s.attempt,
                    delay_ms = s.next_delay.as_millis() as u64,
                    uri = %shown,
                    "download failed, retrying: {}",
                    s.last_error
                )
            },
            || self.download_once(artifact, dest),
        )
        .await?;

        let sha256 = checksum::sha256_file(dest).await?;
        tracing::info!(dest = %dest.display(), byte_size, "artifact downloaded");
        Ok(DownloadedArtifact {
            local_path: dest.to_path_buf(),
            byte_size,
            sha256,
            source_ref: artifact.clone(),
            downloaded_at: unix_timestamp(),
        })
    }

    async fn download_once(&self, artifact: &ArtifactRef, dest: &Path) -> Result<u64, JobError> {
        // Any early return drops `part`, which removes the partial file.
        let mut part = PartFile::create(dest).await?;
        match artifact.scheme().as_str() {
            "http" | "https" => self.fetch_http(artifact, &mut part).await?,
            "file" => self.copy_file(&artifact.uri, &mut part).await?,
            "data" => part.write_chunk(&decode_data_uri(&artifact.uri)?).await?,
            other => {
                return Err(JobError::Validation(format!(
                    "unsupported artifact scheme: {other:?}"
                )))
            }
        }
        part.finalize(dest).await
    }

    async fn fetch_http(&self, artifact: &ArtifactRef, part: &mut PartFile) -> Result<(), JobError> {
        let mut req = self.client.get(&artifact.uri);
        for (name, value) in &artifact.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        let mut resp = http::check_status(req.send().await?).await?;
        let expected = resp.content_length();

        while let Some(chunk) = resp.chunk().await? {
            self.check_cancelled()?;
            part.write_chunk(&chunk).await?;
        }

        if let Some(exp) = expected {
            if part.written() != exp {
                return Err(JobError::Truncated {
                    expected: exp,
                    received: part.written(),
                });
            }
        }
        Ok(())
    }

    async fn copy_file(&self, uri: &str, part: &mut PartFile) -> Result<(), JobError> {
        let path = url::Url::parse(uri)
            .ok()
            .and_then(|u| u.to_file_path().ok())
            .ok_or_else(|| JobError::Validation(format!("invalid file URI: {uri}")))?;
        let mut src = tokio::fs::File::open(&path)
            .await
            .map_err(|e| JobError::io(&path, e))?;
        let mut buf = vec![0u8; FILE_COPY_BUF];
        loop {
            let n = src.read(&mut buf).await.map_err(|e| JobError::io(&path, e))?;
            if n == 0 {
                return Ok(());
            }
            self.check_cancelled()?;
            part.write_chunk(&buf[..n]).await?;
        }
    }
}

/// Build a base64 `data:` URI for providers that return bytes inline.
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Decode `data:[<mime>][;base64],<payload>`.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, JobError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| JobError::Validation("not a data URI".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| JobError::Validation("data URI without payload".into()))?;
    if meta.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| JobError::Validation(format!("data URI is not valid base64: {e}")))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Short form of a URI for logs; inline payloads are elided.
pub fn display_uri(uri: &str) -> String {
    match uri.split_once(',') {
        Some((meta, payload)) if uri.starts_with("data:") => {
            format!("{meta},<{} bytes>", payload.len())
        }
        _ => uri.to_string(),
    }
}
