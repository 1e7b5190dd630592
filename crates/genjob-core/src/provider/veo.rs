//! Google VEO3 through the Gemini API long-running operations.

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::JobError;
use crate::http;
use crate::job::{ArtifactRef, JobHandle, JobRequest, JobState, ProviderId, RequestBody, VideoRequest};

use super::media::{is_remote, load_local_image};
use super::{credential, endpoint, ensure_non_empty, ensure_one_of, wrong_family, JobProvider};

pub const API_KEY_VAR: &str = "GOOGLE_GENAI_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const DEFAULT_MODEL: &str = "veo-3.0-generate-001";
const DURATIONS: &[u32] = &[4, 6, 8];
const ASPECTS: &[&str] = &["16:9", "9:16"];
const RESOLUTIONS: &[&str] = &["720p", "1080p"];

pub struct VeoProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    response: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

impl VeoProvider {
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
            _ => Err(wrong_family(ProviderId::Veo, request)),
        }
    }

    fn map_operation(&self, op: Operation) -> Result<JobState, JobError> {
        if let Some(err) = op.error {
            return Ok(JobState::failed(
                err.code.map(|c| c.to_string()),
                err.message.unwrap_or_else(|| "veo operation failed".into()),
            ));
        }
        if !op.done {
            return Ok(JobState::running(0));
        }
        let response = op.response.unwrap_or(Value::Null);
        let video = response.pointer("/generateVideoResponse/generatedSamples/0/video/uri");
        match video.and_then(Value::as_str) {
            Some(uri) => Ok(JobState::Completed {
                artifact: ArtifactRef::new(uri).with_header("x-goog-api-key", self.api_key.clone()),
            }),
            None => {
                // Safety filters finish the operation with no samples and a reason list.
                let reasons = response
                    .pointer("/generateVideoResponse/raiMediaFilteredReasons")
                    .and_then(Value::as_array)
                    .map(|r| {
                        r.iter()
                            .filter_map(Value::as_str)
                            .collect::<Vec<_>>()
                            .join("; ")
                    })
                    .filter(|s| !s.is_empty());
                match reasons {
                    Some(r) => Ok(JobState::failed(Some("rai_media_filtered".into()), r)),
                    None => Err(JobError::Protocol(format!(
                        "veo operation {} done without a video",
                        op.name
                    ))),
                }
            }
        }
    }
}

#[async_trait]
impl JobProvider for VeoProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Veo
    }

    fn validate(&self, request: &JobRequest) -> Result<(), JobError> {
        let v = self.video(request)?;
        ensure_non_empty("prompt", &v.prompt)?;
        ensure_one_of("duration", &v.duration_secs.unwrap_or(8), DURATIONS)?;
        ensure_one_of("aspect_ratio", &v.aspect_ratio.as_deref().unwrap_or("9:16"), ASPECTS)?;
        let resolution = v.resolution.as_deref().unwrap_or("720p").to_ascii_lowercase();
        ensure_one_of("resolution", &resolution.as_str(), RESOLUTIONS)?;
        if let Some(img) = &v.reference_image {
            if is_remote(img) {
                return Err(JobError::Validation(
                    "veo reference image must be a local file".into(),
                ));
            }
        }
        Ok(())
    }

    async fn create(&self, request: &JobRequest) -> Result<String, JobError> {
        let v = self.video(request)?;
        let mut instance = json!({ "prompt": v.prompt });
        if let Some(reference) = &v.reference_image {
            let img = load_local_image(reference).await?;
            instance["image"] = json!({
                "bytesBase64Encoded": base64::engine::general_purpose::STANDARD.encode(&img.bytes),
                "mimeType": img.mime,
            });
        }
        let mut parameters = json!({
            "aspectRatio": v.aspect_ratio.as_deref().unwrap_or("9:16"),
            "resolution": v.resolution.as_deref().unwrap_or("720p").to_ascii_lowercase(),
            "durationSeconds": v.duration_secs.unwrap_or(8),
        });
        if let Some(neg) = &v.negative_prompt {
            parameters["negativePrompt"] = json!(neg);
        }

        let model = v.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let req = self
            .client
            .post(endpoint(
                &self.base_url,
                &format!("v1beta/models/{model}:predictLongRunning"),
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({ "instances": [instance], "parameters": parameters }));
        let op: Operation = http::send_json(req).await?;
        tracing::info!(operation = %op.name, "veo operation started");
        Ok(op.name)
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobState, JobError> {
        let req = self
            .client
            .get(endpoint(&self.base_url, &format!("v1beta/{}", handle.id)))
            .header("x-goog-api-key", &self.api_key);
        let op: Operation = http::send_json(req).await?;
        self.map_operation(op)
    }
}
