//! Identifiers, handles and artifact records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Remote service a job runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Sora,
    Wan,
    Veo,
    FishAudio,
    Seedream,
    NanoBanana,
    LogoDev,
    Qwen,
}

impl ProviderId {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderId::Sora => "sora",
            ProviderId::Wan => "wan",
            ProviderId::Veo => "veo",
            ProviderId::FishAudio => "fish_audio",
            ProviderId::Seedream => "seedream",
            ProviderId::NanoBanana => "nano_banana",
            ProviderId::LogoDev => "logo_dev",
            ProviderId::Qwen => "qwen",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "sora" => Ok(ProviderId::Sora),
            "wan" | "wan2.5" => Ok(ProviderId::Wan),
            "veo" | "veo3" => Ok(ProviderId::Veo),
            "fish_audio" | "fish" => Ok(ProviderId::FishAudio),
            "seedream" => Ok(ProviderId::Seedream),
            "nano_banana" => Ok(ProviderId::NanoBanana),
            "logo_dev" | "logo" => Ok(ProviderId::LogoDev),
            "qwen" | "qwen_vl" | "qwen3" => Ok(ProviderId::Qwen),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// The only durable reference to a remote job. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
    pub provider: ProviderId,
    /// Unix seconds.
    pub submitted_at: i64,
}

impl JobHandle {
    pub fn new(id: impl Into<String>, provider: ProviderId) -> Self {
        Self {
            id: id.into(),
            provider,
            submitted_at: unix_timestamp(),
        }
    }
}

/// Locator of a provider-hosted result: `http(s)://`, `file://` or `data:`.
///
/// Provider URLs expire; treat these as ephemeral. `headers` carry download
/// auth and are never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub uri: String,
    #[serde(skip)]
    pub headers: BTreeMap<String, String>,
}

impl ArtifactRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// URI scheme, lowercased (`https`, `file`, `data`, ...).
    pub fn scheme(&self) -> String {
        self.uri
            .split_once(':')
            .map(|(s, _)| s.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

/// A finished artifact on local disk. Owned by the caller once returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedArtifact {
    pub local_path: PathBuf,
    /// Size of the written file, measured on disk.
    pub byte_size: u64,
    /// Lowercase hex SHA-256 of the written file.
    pub sha256: String,
    pub source_ref: ArtifactRef,
    /// Unix seconds.
    pub downloaded_at: i64,
}

/// Current time as Unix seconds.
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
