//! `genjob video | speech | image | analyze`: submit, poll and download one job.

use std::path::Path;

use genjob_core::config::GenjobConfig;
use genjob_core::control::JobControl;
use genjob_core::job::{AnalysisRequest, ImageRequest, JobRequest, ProviderId, SpeechRequest, VideoRequest};
use genjob_core::pipeline::JobClient;
use serde_json::json;

use crate::cli::output::{artifact_json, handle_json, Report};

pub async fn run_video(
    cfg: &GenjobConfig,
    control: &JobControl,
    provider: ProviderId,
    req: VideoRequest,
    output: &Path,
) -> Report {
    run_job(cfg, control, JobRequest::video(provider, req), output).await
}

pub async fn run_speech(
    cfg: &GenjobConfig,
    control: &JobControl,
    text: String,
    voice_id: Option<String>,
    format: String,
    output: &Path,
) -> Report {
    let req = SpeechRequest {
        text,
        voice_id,
        format,
    };
    run_job(cfg, control, JobRequest::speech(req), output).await
}

pub async fn run_image(
    cfg: &GenjobConfig,
    control: &JobControl,
    model: ProviderId,
    prompt: String,
    aspect_ratio: Option<String>,
    reference_images: Vec<String>,
    output: &Path,
) -> Report {
    let req = ImageRequest {
        prompt,
        aspect_ratio,
        reference_images,
    };
    run_job(cfg, control, JobRequest::image(model, req), output).await
}

pub async fn run_analyze(cfg: &GenjobConfig, control: &JobControl, req: AnalysisRequest, output: &Path) -> Report {
    run_job(cfg, control, JobRequest::analysis(req), output).await
}

async fn run_job(cfg: &GenjobConfig, control: &JobControl, request: JobRequest, output: &Path) -> Report {
    let client = match JobClient::from_config(request.provider, cfg) {
        Ok(c) => c,
        Err(e) => return Report::error(&e),
    };
    let key = format!("{}:{}", request.provider, output.display());
    let client = client.with_cancel(control.register(&key));

    let result = client
        .run(&request, output, |s| {
            tracing::info!(job_id = %s.handle.id, state = s.state.label(), "progress");
        })
        .await;
    control.unregister(&key);

    match result {
        Ok(outcome) => Report::ok(json!({
            "job": handle_json(&outcome.status.handle),
            "state": outcome.status.state.label(),
            "artifact": artifact_json(&outcome.artifact),
        })),
        Err(failure) => {
            tracing::error!(stage = %failure.stage, "job failed: {}", failure.error);
            Report::failure(&failure)
        }
    }
}
