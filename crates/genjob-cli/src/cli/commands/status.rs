//! `genjob status` (one check) and `genjob resume` (poll an existing job, then download).

use std::path::Path;

use genjob_core::config::GenjobConfig;
use genjob_core::control::JobControl;
use genjob_core::job::{JobHandle, ProviderId};
use genjob_core::pipeline::JobClient;
use serde_json::json;

use crate::cli::output::{artifact_json, handle_json, status_json, Report};

pub async fn run_status(cfg: &GenjobConfig, provider: ProviderId, id: &str) -> Report {
    let client = match JobClient::from_config(provider, cfg) {
        Ok(c) => c,
        Err(e) => return Report::error(&e),
    };
    match client.check(&JobHandle::new(id, provider)).await {
        Ok(status) => Report::ok(status_json(&status)),
        Err(e) => Report::error(&e),
    }
}

pub async fn run_resume(
    cfg: &GenjobConfig,
    control: &JobControl,
    provider: ProviderId,
    id: &str,
    output: &Path,
) -> Report {
    let client = match JobClient::from_config(provider, cfg) {
        Ok(c) => c,
        Err(e) => return Report::error(&e),
    };
    let client = client.with_cancel(control.register(id));

    let handle = JobHandle::new(id, provider);
    let result = client.resume(&handle, output, |_| {}).await;
    control.unregister(id);

    match result {
        Ok(outcome) => Report::ok(json!({
            "job": handle_json(&outcome.status.handle),
            "state": outcome.status.state.label(),
            "artifact": artifact_json(&outcome.artifact),
        })),
        Err(failure) => Report::failure(&failure),
    }
}
