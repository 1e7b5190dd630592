//! Alibaba Wan2.5 video generation through DashScope async tasks.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::JobError;
use crate::http;
use crate::job::{ArtifactRef, JobHandle, JobRequest, JobState, ProviderId, RequestBody, VideoRequest};

use super::media::is_remote;
use super::{credential, endpoint, ensure_non_empty, ensure_one_of, wrong_family, JobProvider};

pub const API_KEY_VAR: &str = "DASHSCOPE_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://dashscope-intl.aliyuncs.com";

const T2V_MODEL: &str = "wan2.5-t2v-preview";
const I2V_MODEL: &str = "wan2.5-i2v-preview";
const DURATIONS: &[u32] = &[5, 10];
const RESOLUTIONS: &[&str] = &["480P", "720P", "1080P"];
const ASPECTS: &[&str] = &["9:16", "16:9"];

pub struct WanProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TaskEnvelope {
    output: TaskOutput,
}

#[derive(Debug, Deserialize)]
struct TaskOutput {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    task_status: Option<String>,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl WanProvider {
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
            _ => Err(wrong_family(ProviderId::Wan, request)),
        }
    }

    fn resolution(v: &VideoRequest) -> String {
        v.resolution
            .as_deref()
            .unwrap_or("720P")
            .to_ascii_uppercase()
    }

    /// Request body: text-to-video takes a pixel `size`, image-to-video a `resolution` tier.
    fn payload(v: &VideoRequest) -> Value {
        let resolution = Self::resolution(v);
        let duration = v.duration_secs.unwrap_or(5);
        let mut input = json!({ "prompt": v.prompt });
        if let Some(neg) = &v.negative_prompt {
            input["negative_prompt"] = json!(neg);
        }
        match &v.reference_image {
            Some(img) => {
                input["img_url"] = json!(img);
                json!({
                    "model": v.model.as_deref().unwrap_or(I2V_MODEL),
                    "input": input,
                    "parameters": {
                        "resolution": resolution,
                        "duration": duration,
                        "prompt_extend": true,
                    },
                })
            }
            None => json!({
                "model": v.model.as_deref().unwrap_or(T2V_MODEL),
                "input": input,
                "parameters": {
                    "size": pixel_size(&resolution, v.aspect_ratio.as_deref().unwrap_or("9:16")),
                    "duration": duration,
                    "prompt_extend": true,
                },
            }),
        }
    }
}

/// DashScope sizes are `width*height`.
fn pixel_size(resolution: &str, aspect: &str) -> &'static str {
    let portrait = aspect != "16:9";
    match (resolution, portrait) {
        ("480P", true) => "480*832",
        ("480P", false) => "832*480",
        ("1080P", true) => "1080*1920",
        ("1080P", false) => "1920*1080",
        (_, true) => "720*1280",
        (_, false) => "1280*720",
    }
}

/// DashScope task states: PENDING, RUNNING, SUCCEEDED, FAILED, CANCELED, UNKNOWN.
fn map_state(out: TaskOutput) -> Result<JobState, JobError> {
    let status = out.task_status.as_deref().unwrap_or("UNKNOWN");
    Ok(match status {
        "PENDING" => JobState::Queued,
        "RUNNING" => JobState::running(0),
        "SUCCEEDED" => {
            let url = out.video_url.ok_or_else(|| {
                JobError::Protocol("wan task succeeded without video_url".into())
            })?;
            JobState::Completed {
                artifact: ArtifactRef::new(url),
            }
        }
        "FAILED" | "CANCELED" => JobState::failed(
            out.code,
            out.message
                .unwrap_or_else(|| format!("wan task {}", status.to_ascii_lowercase())),
        ),
        other => {
            tracing::debug!(status = other, "wan task state not final, still waiting");
            JobState::running(0)
        }
    })
}

#[async_trait]
impl JobProvider for WanProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Wan
    }

    fn validate(&self, request: &JobRequest) -> Result<(), JobError> {
        let v = self.video(request)?;
        ensure_non_empty("prompt", &v.prompt)?;
        ensure_one_of("duration", &v.duration_secs.unwrap_or(5), DURATIONS)?;
        ensure_one_of("resolution", &Self::resolution(v).as_str(), RESOLUTIONS)?;
        ensure_one_of("aspect_ratio", &v.aspect_ratio.as_deref().unwrap_or("9:16"), ASPECTS)?;
        if let Some(img) = &v.reference_image {
            if !is_remote(img) {
                return Err(JobError::Validation(
                    "wan reference image must be an http(s) URL".into(),
                ));
            }
        }
        Ok(())
    }

    async fn create(&self, request: &JobRequest) -> Result<String, JobError> {
        let v = self.video(request)?;
        let req = self
            .client
            .post(endpoint(
                &self.base_url,
                "api/v1/services/aigc/video-generation/video-synthesis",
            ))
            .bearer_auth(&self.api_key)
            .header("X-DashScope-Async", "enable")
            .json(&Self::payload(v));
        let env: TaskEnvelope = http::send_json(req).await?;
        let task_id = env
            .output
            .task_id
            .ok_or_else(|| JobError::Protocol("wan create response without task_id".into()))?;
        tracing::info!(task_id = %task_id, "wan task created");
        Ok(task_id)
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobState, JobError> {
        let req = self
            .client
            .get(endpoint(&self.base_url, &format!("api/v1/tasks/{}", handle.id)))
            .bearer_auth(&self.api_key);
        let env: TaskEnvelope = http::send_json(req).await?;
        map_state(env.output)
    }
}
