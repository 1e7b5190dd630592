//! Job data model: requests, handles, state snapshots and artifacts.

mod request;
mod state;
mod types;

pub use request::{AnalysisRequest, ImageRequest, JobRequest, LogoRequest, RequestBody, SpeechRequest, VideoRequest};
pub use state::{JobState, JobStatus};
pub use types::{unix_timestamp, ArtifactRef, DownloadedArtifact, JobHandle, ProviderId};
