//! `genjob download <uri>`: fetch an artifact without touching the provider.

use std::path::Path;

use genjob_core::config::GenjobConfig;
use genjob_core::control::JobControl;
use genjob_core::download::Downloader;
use genjob_core::http;
use genjob_core::job::ArtifactRef;
use genjob_core::retry::RetryPolicy;
use serde_json::json;

use crate::cli::output::{artifact_json, Report};

pub async fn run_download(cfg: &GenjobConfig, control: &JobControl, uri: &str, output: &Path) -> Report {
    let client = match http::build_client(cfg.http_timeout()) {
        Ok(c) => c,
        Err(e) => return Report::error(&e),
    };
    let downloader = Downloader::new(client, RetryPolicy::from(&cfg.retry)).with_cancel(control.register(uri));
    let result = downloader.download(&ArtifactRef::new(uri), output).await;
    control.unregister(uri);
    match result {
        Ok(artifact) => Report::ok(json!({ "artifact": artifact_json(&artifact) })),
        Err(e) => Report::error(&e),
    }
}
