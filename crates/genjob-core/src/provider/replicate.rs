//! Image models hosted on Replicate: ByteDance Seedream 4 and Google Nano Banana.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::JobError;
use crate::http;
use crate::job::{ArtifactRef, ImageRequest, JobHandle, JobRequest, JobState, ProviderId, RequestBody};

use super::media::is_remote;
use super::{credential, endpoint, ensure_non_empty, ensure_one_of, wrong_family, JobProvider};

pub const API_KEY_VAR: &str = "REPLICATE_API_TOKEN";
pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com";

const ASPECTS: &[&str] = &["1:1", "9:16", "16:9", "4:3", "3:4"];
const MAX_REFERENCE_IMAGES: usize = 10;

pub struct ReplicateProvider {
    id: ProviderId,
    client: Client,
    api_token: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl ReplicateProvider {
    /// `id` must be one of the Replicate-hosted models.
    pub fn new(
        id: ProviderId,
        client: Client,
        api_token: impl Into<String>,
        base_url: Option<&str>,
    ) -> Result<Self, JobError> {
        if model_path(id).is_none() {
            return Err(JobError::Validation(format!("{id} is not hosted on replicate")));
        }
        Ok(Self {
            id,
            client,
            api_token: api_token.into(),
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).to_string(),
        })
    }

    pub fn from_env(id: ProviderId, client: Client, base_url: Option<&str>) -> Result<Self, JobError> {
        Self::new(id, client, credential(API_KEY_VAR)?, base_url)
    }

    fn image<'a>(&self, request: &'a JobRequest) -> Result<&'a ImageRequest, JobError> {
        match &request.body {
            RequestBody::Image(i) => Ok(i),
            _ => Err(wrong_family(self.id, request)),
        }
    }

    fn input(&self, req: &ImageRequest) -> Value {
        let aspect = req.aspect_ratio.as_deref().unwrap_or("1:1");
        let mut input = json!({ "prompt": req.prompt, "aspect_ratio": aspect });
        if !req.reference_images.is_empty() {
            input["image_input"] = json!(req.reference_images);
        }
        match self.id {
            ProviderId::Seedream => {
                input["size"] = json!("2K");
                input["max_images"] = json!(1);
            }
            _ => input["output_format"] = json!("png"),
        }
        input
    }
}

fn model_path(id: ProviderId) -> Option<&'static str> {
    match id {
        ProviderId::Seedream => Some("bytedance/seedream-4"),
        ProviderId::NanoBanana => Some("google/nano-banana"),
        _ => None,
    }
}

/// Output is a single URL for some models and a list of URLs for others.
fn first_output(output: Option<&Value>) -> Option<&str> {
    match output? {
        Value::String(s) => Some(s.as_str()),
        Value::Array(items) => items.iter().find_map(Value::as_str),
        _ => None,
    }
}

/// Prediction states: starting, processing, succeeded, failed, canceled.
fn map_state(p: Prediction) -> Result<JobState, JobError> {
    Ok(match p.status.as_str() {
        "starting" => JobState::Queued,
        "processing" => JobState::running(0),
        "succeeded" => {
            let url = first_output(p.output.as_ref()).ok_or_else(|| {
                JobError::Protocol(format!("prediction {} succeeded without output", p.id))
            })?;
            JobState::Completed {
                artifact: ArtifactRef::new(url),
            }
        }
        "failed" | "canceled" => {
            let message = match p.error {
                Some(Value::String(s)) => s,
                Some(other) if !other.is_null() => other.to_string(),
                _ => format!("prediction {}", p.status),
            };
            JobState::failed(Some(p.status.clone()), message)
        }
        other => {
            tracing::debug!(status = other, "unknown prediction status, still waiting");
            JobState::running(0)
        }
    })
}

#[async_trait]
impl JobProvider for ReplicateProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn validate(&self, request: &JobRequest) -> Result<(), JobError> {
        let i = self.image(request)?;
        ensure_non_empty("prompt", &i.prompt)?;
        ensure_one_of("aspect_ratio", &i.aspect_ratio.as_deref().unwrap_or("1:1"), ASPECTS)?;
        if i.reference_images.len() > MAX_REFERENCE_IMAGES {
            return Err(JobError::Validation(format!(
                "at most {MAX_REFERENCE_IMAGES} reference images, got {}",
                i.reference_images.len()
            )));
        }
        if let Some(local) = i.reference_images.iter().find(|r| !is_remote(r)) {
            return Err(JobError::Validation(format!(
                "reference image must be an http(s) URL: {local}"
            )));
        }
        Ok(())
    }

    async fn create(&self, request: &JobRequest) -> Result<String, JobError> {
        let i = self.image(request)?;
        let model = model_path(self.id)
            .ok_or_else(|| JobError::Validation(format!("{} is not hosted on replicate", self.id)))?;
        let req = self
            .client
            .post(endpoint(&self.base_url, &format!("v1/models/{model}/predictions")))
            .bearer_auth(&self.api_token)
            .json(&json!({ "input": self.input(i) }));
        let p: Prediction = http::send_json(req).await?;
        tracing::info!(prediction = %p.id, model, status = %p.status, "replicate prediction created");
        Ok(p.id)
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobState, JobError> {
        let req = self
            .client
            .get(endpoint(&self.base_url, &format!("v1/predictions/{}", handle.id)))
            .bearer_auth(&self.api_token);
        let p: Prediction = http::send_json(req).await?;
        map_state(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: ProviderId) -> ReplicateProvider {
        ReplicateProvider::new(id, Client::new(), "r8_test", None).unwrap()
    }

    fn prediction(status: &str, output: Option<Value>) -> Prediction {
        Prediction {
            id: "p1".into(),
            status: status.into(),
            output,
            error: None,
        }
    }

    #[test]
    fn rejects_non_replicate_provider() {
        assert!(ReplicateProvider::new(ProviderId::Sora, Client::new(), "t", None).is_err());
    }

    #[test]
    fn output_may_be_string_or_list() {
        let one = map_state(prediction("succeeded", Some(json!("https://r.example/a.png")))).unwrap();
        let many = map_state(prediction(
            "succeeded",
            Some(json!(["https://r.example/b.jpg", "https://r.example/c.jpg"])),
        ))
        .unwrap();
        assert_eq!(one, JobState::Completed { artifact: ArtifactRef::new("https://r.example/a.png") });
        assert_eq!(many, JobState::Completed { artifact: ArtifactRef::new("https://r.example/b.jpg") });
        assert!(map_state(prediction("succeeded", Some(json!([])))).is_err());
    }

    #[test]
    fn maps_lifecycle_states() {
        assert_eq!(map_state(prediction("starting", None)).unwrap(), JobState::Queued);
        assert_eq!(map_state(prediction("processing", None)).unwrap(), JobState::running(0));
        let mut failed = prediction("failed", None);
        failed.error = Some(json!("NSFW content detected"));
        assert_eq!(
            map_state(failed).unwrap(),
            JobState::failed(Some("failed".into()), "NSFW content detected")
        );
    }

    #[test]
    fn model_specific_input() {
        let req = ImageRequest {
            prompt: "product shot".into(),
            aspect_ratio: Some("16:9".into()),
            reference_images: vec!["https://cdn.example/ref.png".into()],
        };
        let seedream = provider(ProviderId::Seedream).input(&req);
        assert_eq!(seedream["size"], "2K");
        assert_eq!(seedream["image_input"][0], "https://cdn.example/ref.png");
        let banana = provider(ProviderId::NanoBanana).input(&req);
        assert_eq!(banana["output_format"], "png");
        assert!(banana.get("size").is_none());
    }

    #[test]
    fn validation_limits_reference_images() {
        let p = provider(ProviderId::NanoBanana);
        let mut req = ImageRequest {
            prompt: "x".into(),
            ..ImageRequest::default()
        };
        req.reference_images = (0..11).map(|i| format!("https://cdn.example/{i}.png")).collect();
        assert!(p.validate(&JobRequest::image(ProviderId::NanoBanana, req.clone())).is_err());
        req.reference_images.truncate(10);
        p.validate(&JobRequest::image(ProviderId::NanoBanana, req.clone())).unwrap();
        req.aspect_ratio = Some("21:9".into());
        assert!(p.validate(&JobRequest::image(ProviderId::NanoBanana, req)).is_err());
    }
}
