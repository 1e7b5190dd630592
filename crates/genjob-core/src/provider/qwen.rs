//! Qwen vision-language video analysis on DashScope.
//!
//! Answers synchronously, so the job is finished inside `create` and the
//! model's answer becomes an inline artifact. Two routes share one key:
//!
//! * VL models use the native multimodal-generation endpoint and accept local
//!   videos, which are sent inline as a base64 `data:` URL.
//! * Omni models (`qwen3-omni*`, `qwen-omni*`) use the OpenAI-compatible chat
//!   endpoint and only take an `http(s)` video URL.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::download::data_uri;
use crate::error::JobError;
use crate::http;
use crate::job::{AnalysisRequest, ArtifactRef, JobHandle, JobRequest, JobState, ProviderId, RequestBody};

use super::{credential, endpoint, ensure_non_empty, wrong_family, FinishedJobs, JobProvider};

pub use super::wan::{API_KEY_VAR, DEFAULT_BASE_URL};

pub const DEFAULT_MODEL: &str = "qwen3-vl-235b-a22b-thinking";

const NATIVE_PATH: &str = "api/v1/services/aigc/multimodal-generation/generation";
const COMPATIBLE_PATH: &str = "compatible-mode/v1/chat/completions";

pub struct QwenProvider {
    client: Client,
    api_key: String,
    base_url: String,
    finished: FinishedJobs,
}

/// Where the video comes from, decided before any network call.
#[derive(Debug, PartialEq)]
enum VideoSource {
    Remote(String),
    Local(PathBuf),
}

fn is_omni(model: &str) -> bool {
    model.starts_with("qwen3-omni") || model.starts_with("qwen-omni")
}

fn video_source(video: &str) -> VideoSource {
    let lower = video.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return VideoSource::Remote(video.to_string());
    }
    let path = url::Url::parse(video)
        .ok()
        .filter(|u| u.scheme() == "file")
        .and_then(|u| u.to_file_path().ok())
        .unwrap_or_else(|| PathBuf::from(video));
    VideoSource::Local(path)
}

fn video_mime(path: &Path) -> Result<&'static str, JobError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => Ok("video/mp4"),
        "mov" => Ok("video/quicktime"),
        "webm" => Ok("video/webm"),
        "mkv" => Ok("video/x-matroska"),
        "avi" => Ok("video/x-msvideo"),
        _ => Err(JobError::Validation(format!(
            "video must be mp4, mov, webm, mkv or avi: {}",
            path.display()
        ))),
    }
}

/// Text of a message `content`: a plain string, or a list of `{"text": ..}`
/// parts (bare strings allowed) joined by newlines.
fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(|p| match p {
                    Value::String(s) => Some(s.as_str()),
                    other => other.get("text").and_then(Value::as_str),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        _ => None,
    }
}

/// Drop a surrounding Markdown code fence (```` ```json ```` ... ```` ``` ````).
fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    if !text.starts_with("```") {
        return text;
    }
    let body = text.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

impl QwenProvider {
    pub fn new(client: Client, api_key: impl Into<String>, base_url: Option<&str>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).to_string(),
            finished: FinishedJobs::default(),
        }
    }

    pub fn from_env(client: Client, base_url: Option<&str>) -> Result<Self, JobError> {
        Ok(Self::new(client, credential(API_KEY_VAR)?, base_url))
    }

    fn analysis<'a>(&self, request: &'a JobRequest) -> Result<&'a AnalysisRequest, JobError> {
        match &request.body {
            RequestBody::Analysis(a) => Ok(a),
            _ => Err(wrong_family(ProviderId::Qwen, request)),
        }
    }

    fn model(a: &AnalysisRequest) -> &str {
        a.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Native payload. A local video is read and inlined.
    async fn native_payload(model: &str, a: &AnalysisRequest) -> Result<Value, JobError> {
        let video = match video_source(&a.video) {
            VideoSource::Remote(url) => url,
            VideoSource::Local(path) => {
                let mime = video_mime(&path)?;
                let bytes = tokio::fs::read(&path).await.map_err(|e| {
                    JobError::Validation(format!("cannot read video {}: {e}", path.display()))
                })?;
                data_uri(mime, &bytes)
            }
        };
        Ok(json!({
            "model": model,
            "input": {
                "messages": [{
                    "role": "user",
                    "content": [{ "video": video }, { "text": a.prompt }],
                }],
            },
        }))
    }

    fn compatible_payload(model: &str, a: &AnalysisRequest) -> Value {
        json!({
            "model": model,
            "stream": false,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "video_url", "video_url": { "url": a.video } },
                    { "type": "text", "text": a.prompt },
                ],
            }],
        })
    }

    async fn ask(&self, a: &AnalysisRequest) -> Result<String, JobError> {
        let model = Self::model(a);
        let (path, body, pointer) = if is_omni(model) {
            (COMPATIBLE_PATH, Self::compatible_payload(model, a), "/choices/0/message/content")
        } else {
            (
                NATIVE_PATH,
                Self::native_payload(model, a).await?,
                "/output/choices/0/message/content",
            )
        };
        tracing::info!(model, "sending video for analysis");
        let resp: Value = http::send_json(
            self.client
                .post(endpoint(&self.base_url, path))
                .bearer_auth(&self.api_key)
                .json(&body),
        )
        .await?;
        resp.pointer(pointer)
            .and_then(content_text)
            .ok_or_else(|| JobError::Protocol(format!("no answer in {model} response")))
    }
}

/// Artifact for one answer. Structured answers must parse as JSON.
fn answer_artifact(answer: &str, structured: bool) -> Result<ArtifactRef, JobError> {
    if !structured {
        return Ok(ArtifactRef::new(data_uri("text/plain;charset=utf-8", answer.as_bytes())));
    }
    let body = strip_fences(answer);
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| JobError::Protocol(format!("answer is not valid JSON: {e}")))?;
    let bytes = serde_json::to_vec_pretty(&parsed).map_err(|e| JobError::Opaque(e.to_string()))?;
    Ok(ArtifactRef::new(data_uri("application/json", &bytes)))
}

#[async_trait]
impl JobProvider for QwenProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Qwen
    }

    fn validate(&self, request: &JobRequest) -> Result<(), JobError> {
        let a = self.analysis(request)?;
        ensure_non_empty("video", &a.video)?;
        ensure_non_empty("prompt", &a.prompt)?;
        let model = Self::model(a);
        match video_source(&a.video) {
            VideoSource::Remote(_) => Ok(()),
            VideoSource::Local(_) if is_omni(model) => Err(JobError::Validation(format!(
                "{model} needs an http(s) video URL, got {}",
                a.video
            ))),
            VideoSource::Local(path) => {
                video_mime(&path)?;
                if !path.is_file() {
                    return Err(JobError::Validation(format!("video not found: {}", path.display())));
                }
                Ok(())
            }
        }
    }

    async fn create(&self, request: &JobRequest) -> Result<String, JobError> {
        let a = self.analysis(request)?;
        let answer = self.ask(a).await?;
        let artifact = answer_artifact(&answer, a.structured)?;

        let id = self.finished.next_id("vl");
        tracing::info!(job_id = %id, chars = answer.chars().count(), "video analyzed");
        self.finished.insert(&id, JobState::Completed { artifact });
        Ok(id)
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobState, JobError> {
        self.finished.get(&handle.id).ok_or_else(|| {
            JobError::Validation(format!(
                "unknown analysis job {}; results are held only by the process that created them",
                handle.id
            ))
        })
    }

    fn completes_on_submit(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> QwenProvider {
        QwenProvider::new(Client::new(), "ds-key", Some("http://127.0.0.1:9"))
    }

    fn ask(video: &str, model: Option<&str>) -> JobRequest {
        JobRequest::analysis(AnalysisRequest {
            video: video.into(),
            prompt: "What happens in this video?".into(),
            model: model.map(str::to_string),
            structured: false,
        })
    }

    #[test]
    fn omni_prefixes_route_to_compatible_mode() {
        assert!(is_omni("qwen3-omni-flash"));
        assert!(is_omni("qwen-omni-turbo"));
        assert!(!is_omni(DEFAULT_MODEL));
        assert!(!is_omni("qwen-vl-max"));
    }

    #[test]
    fn video_sources() {
        assert_eq!(
            video_source("HTTPS://cdn.example.com/a.mp4"),
            VideoSource::Remote("HTTPS://cdn.example.com/a.mp4".into())
        );
        assert_eq!(video_source("file:///tmp/a.mp4"), VideoSource::Local("/tmp/a.mp4".into()));
        assert_eq!(video_source("clips/a.mp4"), VideoSource::Local("clips/a.mp4".into()));
    }

    #[test]
    fn validation_checks_local_files_and_omni_urls() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.mp4");
        std::fs::write(&clip, b"mp4").unwrap();
        let clip = clip.to_str().unwrap();

        provider().validate(&ask(clip, None)).unwrap();
        provider().validate(&ask("https://x/clip.mp4", Some("qwen3-omni-flash"))).unwrap();

        let err = provider().validate(&ask(clip, Some("qwen3-omni-flash"))).unwrap_err();
        assert!(err.to_string().contains("http(s) video URL"));
        let missing = dir.path().join("gone.mp4");
        let err = provider().validate(&ask(missing.to_str().unwrap(), None)).unwrap_err();
        assert!(err.to_string().contains("video not found"));
        assert!(provider().validate(&ask("notes.txt", None)).is_err());
        let speech = JobRequest::speech(Default::default());
        assert!(provider().validate(&speech).is_err());
    }

    #[test]
    fn content_joins_text_parts() {
        assert_eq!(content_text(&json!("plain")).unwrap(), "plain");
        assert_eq!(
            content_text(&json!([{ "text": "first" }, "second", { "image": "x" }])).unwrap(),
            "first\nsecond"
        );
        assert!(content_text(&json!(42)).is_none());
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_fences("```\n[1]\n```  "), "[1]");
        assert_eq!(strip_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn structured_answers_must_be_json() {
        let art = answer_artifact("```json\n{\"pacing\": {\"rhythm\": \"fast\"}}\n```", true).unwrap();
        assert!(art.uri.starts_with("data:application/json;base64,"));
        let err = answer_artifact("The video is fast paced.", true).unwrap_err();
        assert!(matches!(err, JobError::Protocol(_)));
        let text = answer_artifact("The video is fast paced.", false).unwrap();
        assert!(text.uri.starts_with("data:text/plain;charset=utf-8;base64,"));
    }

    #[tokio::test]
    async fn local_video_is_inlined_in_native_payload() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.MOV");
        std::fs::write(&clip, b"moov").unwrap();
        let req = AnalysisRequest {
            video: clip.to_string_lossy().into_owned(),
            prompt: "describe".into(),
            ..Default::default()
        };
        let body = QwenProvider::native_payload(DEFAULT_MODEL, &req).await.unwrap();
        assert_eq!(body["model"], DEFAULT_MODEL);
        let content = &body["input"]["messages"][0]["content"];
        assert_eq!(content[0]["video"], data_uri("video/quicktime", b"moov"));
        assert_eq!(content[1]["text"], "describe");
    }

    #[test]
    fn compatible_payload_uses_video_url_parts() {
        let req = AnalysisRequest {
            video: "https://cdn.example.com/a.mp4".into(),
            prompt: "sync?".into(),
            ..Default::default()
        };
        let body = QwenProvider::compatible_payload("qwen3-omni-flash", &req);
        assert_eq!(body["stream"], false);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "video_url");
        assert_eq!(content[0]["video_url"]["url"], "https://cdn.example.com/a.mp4");
        assert_eq!(content[1]["text"], "sync?");
    }
}
