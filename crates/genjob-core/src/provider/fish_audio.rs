//! Fish Audio text-to-speech. The API answers synchronously with the audio bytes.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::download::data_uri;
use crate::error::JobError;
use crate::http;
use crate::job::{ArtifactRef, JobHandle, JobRequest, JobState, ProviderId, RequestBody, SpeechRequest};

use super::{credential, endpoint, ensure_non_empty, ensure_one_of, wrong_family, FinishedJobs, JobProvider};

pub const API_KEY_VAR: &str = "FISH_AUDIO_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.fish.audio";

const FORMATS: &[&str] = &["mp3", "wav", "opus"];
const MAX_TEXT_CHARS: usize = 10_000;

pub struct FishAudioProvider {
    client: Client,
    api_key: String,
    base_url: String,
    finished: FinishedJobs,
}

impl FishAudioProvider {
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

    fn speech<'a>(&self, request: &'a JobRequest) -> Result<&'a SpeechRequest, JobError> {
        match &request.body {
            RequestBody::Speech(s) => Ok(s),
            _ => Err(wrong_family(ProviderId::FishAudio, request)),
        }
    }
}

fn mime_for(format: &str) -> &'static str {
    match format {
        "wav" => "audio/wav",
        "opus" => "audio/ogg",
        _ => "audio/mpeg",
    }
}

#[async_trait]
impl JobProvider for FishAudioProvider {
    fn id(&self) -> ProviderId {
        ProviderId::FishAudio
    }

    fn validate(&self, request: &JobRequest) -> Result<(), JobError> {
        let s = self.speech(request)?;
        ensure_non_empty("text", &s.text)?;
        let chars = s.text.chars().count();
        if chars > MAX_TEXT_CHARS {
            return Err(JobError::Validation(format!(
                "text is {chars} characters, limit is {MAX_TEXT_CHARS}"
            )));
        }
        ensure_one_of("format", &s.format.as_str(), FORMATS)
    }

    async fn create(&self, request: &JobRequest) -> Result<String, JobError> {
        let s = self.speech(request)?;
        let mut body = json!({ "text": s.text, "format": s.format });
        if let Some(voice) = &s.voice_id {
            body["reference_id"] = json!(voice);
        }
        let resp = self
            .client
            .post(endpoint(&self.base_url, "v1/tts"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let audio = http::check_status(resp).await?.bytes().await?;
        if audio.is_empty() {
            return Err(JobError::Protocol("fish audio returned an empty body".into()));
        }

        let id = self.finished.next_id("tts");
        tracing::info!(job_id = %id, bytes = audio.len(), "speech synthesized");
        self.finished.insert(
            &id,
            JobState::Completed {
                artifact: ArtifactRef::new(data_uri(mime_for(&s.format), &audio)),
            },
        );
        Ok(id)
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobState, JobError> {
        self.finished.get(&handle.id).ok_or_else(|| {
            JobError::Validation(format!(
                "unknown speech job {}; results are held only by the process that created them",
                handle.id
            ))
        })
    }

    fn completes_on_submit(&self) -> bool {
        true
    }
}
