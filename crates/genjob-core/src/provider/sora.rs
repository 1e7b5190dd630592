//! OpenAI SORA video generation (`/v1/videos`).

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use crate::error::JobError;
use crate::http;
use crate::job::{ArtifactRef, JobHandle, JobRequest, JobState, ProviderId, RequestBody, VideoRequest};

use super::media::{is_remote, load_local_image};
use super::{credential, endpoint, ensure_non_empty, ensure_one_of, wrong_family, JobProvider};

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const MODELS: &[&str] = &["sora-2", "sora-2-pro"];
const SECONDS: &[u32] = &[4, 8, 12];
const SIZES: &[&str] = &["720x1280", "1280x720", "1024x1792", "1792x1024"];
const PRO_ONLY_SIZES: &[&str] = &["1024x1792", "1792x1024"];
const DEFAULT_SECONDS: u32 = 8;

pub struct SoraProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct VideoObject {
    id: String,
    status: String,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    error: Option<VideoError>,
}

#[derive(Debug, Deserialize)]
struct VideoError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl SoraProvider {
    pub fn new(client: Client, api_key: impl Into<String>, base_url: Option<&str>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).to_string(),
        }
    }

    pub fn from_env(client: Client, base_url: Option<&str>) -> Result<Self, JobError> {
        Ok(Self::new(client, credential(API_KEY_VAR)?, base_url))
    }

    fn video<'a>(&self, request: &'a JobRequest) -> Result<&'a VideoRequest, JobError> {
        match &request.body {
            RequestBody::Video(v) => Ok(v),
            _ => Err(wrong_family(ProviderId::Sora, request)),
        }
    }

    fn model(req: &VideoRequest) -> &str {
        req.model.as_deref().unwrap_or("sora-2")
    }

    /// Explicit resolution wins; otherwise portrait unless the aspect ratio says landscape.
    fn size(req: &VideoRequest) -> &str {
        match (&req.resolution, req.aspect_ratio.as_deref()) {
            (Some(r), _) => r.as_str(),
            (None, Some("16:9")) => "1280x720",
            (None, _) => "720x1280",
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }
}

/// SORA job states: queued, in_progress, completed, failed.
fn map_state(provider: &SoraProvider, obj: VideoObject) -> JobState {
    match obj.status.as_str() {
        "queued" => JobState::Queued,
        "in_progress" | "processing" => JobState::running(obj.progress.unwrap_or(0.0)),
        "completed" => {
            let uri = endpoint(&provider.base_url, &format!("v1/videos/{}/content", obj.id));
            JobState::Completed {
                artifact: ArtifactRef::new(uri).with_header("Authorization", provider.bearer()),
            }
        }
        "failed" | "cancelled" => {
            let (code, message) = match obj.error {
                Some(e) => (e.code, e.message.unwrap_or_else(|| "video generation failed".into())),
                None => (None, "video generation failed".into()),
            };
            JobState::failed(code, message)
        }
        other => {
            tracing::debug!(status = other, "unknown sora status, still waiting");
            JobState::running(obj.progress.unwrap_or(0.0))
        }
    }
}

#[async_trait]
impl JobProvider for SoraProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Sora
    }

    fn validate(&self, request: &JobRequest) -> Result<(), JobError> {
        let v = self.video(request)?;
        ensure_non_empty("prompt", &v.prompt)?;
        let model = Self::model(v);
        ensure_one_of("model", &model, MODELS)?;
        ensure_one_of("seconds", &v.duration_secs.unwrap_or(DEFAULT_SECONDS), SECONDS)?;
        let size = Self::size(v);
        ensure_one_of("size", &size, SIZES)?;
        if model == "sora-2" && PRO_ONLY_SIZES.contains(&size) {
            return Err(JobError::Validation(format!("size {size} requires sora-2-pro")));
        }
        if let Some(r) = &v.reference_image {
            if is_remote(r) {
                return Err(JobError::Validation(
                    "sora reference image must be a local file".into(),
                ));
            }
        }
        Ok(())
    }

    async fn create(&self, request: &JobRequest) -> Result<String, JobError> {
        let v = self.video(request)?;
        let mut form = Form::new()
            .text("model", Self::model(v).to_string())
            .text("prompt", v.prompt.clone())
            .text("seconds", v.duration_secs.unwrap_or(DEFAULT_SECONDS).to_string())
            .text("size", Self::size(v).to_string());
        if let Some(reference) = &v.reference_image {
            let img = load_local_image(reference).await?;
            let part = Part::bytes(img.bytes)
                .file_name(img.file_name)
                .mime_str(img.mime)?;
            form = form.part("input_reference", part);
        }

        let req = self
            .client
            .post(endpoint(&self.base_url, "v1/videos"))
            .header("Authorization", self.bearer())
            .multipart(form);
        let obj: VideoObject = http::send_json(req).await?;
        tracing::info!(video_id = %obj.id, status = %obj.status, "sora video created");
        Ok(obj.id)
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobState, JobError> {
        let req = self
            .client
            .get(endpoint(&self.base_url, &format!("v1/videos/{}", handle.id)))
            .header("Authorization", self.bearer());
        let obj: VideoObject = http::send_json(req).await?;
        Ok(map_state(self, obj))
    }
}
