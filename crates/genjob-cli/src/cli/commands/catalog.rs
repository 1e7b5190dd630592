//! `genjob logo <brand>` and `genjob catalog`.

use std::path::Path;

use genjob_core::catalog::{CatalogGate, FetchedAsset, GateOutcome};
use genjob_core::config::GenjobConfig;
use genjob_core::control::JobControl;
use genjob_core::job::{LogoRequest, ProviderId};
use genjob_core::pipeline::{fetch_logo, JobClient};
use serde_json::json;

use crate::cli::output::Report;

pub async fn run_logo(
    cfg: &GenjobConfig,
    control: &JobControl,
    brand: &str,
    job_id: Option<&str>,
    size: u32,
) -> Report {
    let gate = match CatalogGate::open(&cfg.catalog.path).await {
        Ok(g) => g,
        Err(e) => return Report::error(&e),
    };

    // A cached logo is served without credentials.
    let cached = gate.get(brand).await.is_some();
    let outcome = match JobClient::from_config(ProviderId::LogoDev, cfg) {
        Ok(client) => {
            let client = client.with_cancel(control.register(brand));
            let mut request = LogoRequest::new(brand);
            request.size = size;
            let outcome = fetch_logo(&gate, &client, &request, job_id, Path::new(&cfg.catalog.assets_dir)).await;
            control.unregister(brand);
            outcome
        }
        Err(e) if cached => {
            tracing::debug!("logo client unavailable, serving from catalog: {e}");
            gate.lookup_or_fetch(brand, job_id, |_| async move { Err::<FetchedAsset, _>(e) }).await
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(o) => logo_report(o),
        Err(e) => Report::error(&e),
    }
}

fn logo_report(o: GateOutcome) -> Report {
    Report::ok(json!({
        "cached": !o.fetched,
        "entry": o.entry,
    }))
}

pub async fn run_catalog(cfg: &GenjobConfig) -> Report {
    let gate = match CatalogGate::open(&cfg.catalog.path).await {
        Ok(g) => g,
        Err(e) => return Report::error(&e),
    };
    Report::ok(json!({
        "path": gate.path(),
        "entries": gate.entries().await,
        "stats": gate.stats().await,
    }))
}
