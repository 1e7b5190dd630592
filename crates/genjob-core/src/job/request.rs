//! Provider-neutral request payloads. Adapters validate and translate them.

use serde::{Deserialize, Serialize};

use super::types::ProviderId;

/// A job request bound to a provider. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub provider: ProviderId,
    pub body: RequestBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestBody {
    Video(VideoRequest),
    Speech(SpeechRequest),
    Image(ImageRequest),
    Logo(LogoRequest),
    Analysis(AnalysisRequest),
}

impl JobRequest {
    pub fn video(provider: ProviderId, req: VideoRequest) -> Self {
        Self {
            provider,
            body: RequestBody::Video(req),
        }
    }

    pub fn speech(req: SpeechRequest) -> Self {
        Self {
            provider: ProviderId::FishAudio,
            body: RequestBody::Speech(req),
        }
    }

    pub fn image(provider: ProviderId, req: ImageRequest) -> Self {
        Self {
            provider,
            body: RequestBody::Image(req),
        }
    }

    pub fn logo(req: LogoRequest) -> Self {
        Self {
            provider: ProviderId::LogoDev,
            body: RequestBody::Logo(req),
        }
    }

    pub fn analysis(req: AnalysisRequest) -> Self {
        Self {
            provider: ProviderId::Qwen,
            body: RequestBody::Analysis(req),
        }
    }

    /// Family name for error messages ("video", "speech", ...).
    pub fn family(&self) -> &'static str {
        match self.body {
            RequestBody::Video(_) => "video",
            RequestBody::Speech(_) => "speech",
            RequestBody::Image(_) => "image",
            RequestBody::Logo(_) => "logo",
            RequestBody::Analysis(_) => "analysis",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoRequest {
    pub prompt: String,
    /// Clip length; each provider accepts its own fixed set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
    /// Resolution in the provider's vocabulary (`720x1280` for SORA, `720P` for Wan, `720p` for VEO).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    /// `9:16` or `16:9`; providers that take a size derive orientation from it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    /// Reference image for image-to-video: a URL, or a local path for providers that upload bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    /// Override the provider's default model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    /// Voice model id (Fish Audio `reference_id`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    pub format: String,
}

impl Default for SpeechRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            voice_id: None,
            format: "mp3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    /// Reference image URLs for editing / style transfer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoRequest {
    pub brand: String,
    /// Square size in pixels.
    pub size: u32,
}

impl LogoRequest {
    pub fn new(brand: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            size: 512,
        }
    }
}

/// Question about a video for a vision-language model. The answer is the artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// `http(s)` URL, `file://` URI or local path.
    pub video: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Expect a JSON answer: code fences are stripped and the body must parse.
    #[serde(default)]
    pub structured: bool,
}
