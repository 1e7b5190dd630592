//! JSON results printed on stdout.

use genjob_core::download::display_uri;
use genjob_core::job::{DownloadedArtifact, JobHandle, JobStatus};
use genjob_core::pipeline::JobFailure;
use genjob_core::JobError;
use serde_json::{json, Map, Value};

/// One command result. `success` decides the exit code.
#[derive(Debug)]
pub struct Report {
    pub success: bool,
    pub body: Map<String, Value>,
}

impl Report {
    pub fn ok(fields: Value) -> Self {
        Self::with(true, fields)
    }

    fn with(success: bool, fields: Value) -> Self {
        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(success));
        if let Value::Object(map) = fields {
            body.extend(map);
        }
        Self { success, body }
    }

    /// Failure at one stage of a job, with the handle and artifact when known.
    pub fn failure(f: &JobFailure) -> Self {
        let mut fields = json!({
            "stage": f.stage,
            "error": error_json(&f.error),
        });
        if let Some(h) = &f.handle {
            fields["job"] = handle_json(h);
        }
        if let Some(a) = &f.artifact {
            fields["artifact_uri"] = json!(display_uri(&a.uri));
        }
        Self::with(false, fields)
    }

    pub fn error(e: &JobError) -> Self {
        Self::with(false, json!({ "error": error_json(e) }))
    }

    /// Errors outside the job taxonomy (config file, runtime setup).
    pub fn internal(e: &anyhow::Error) -> Self {
        Self::with(
            false,
            json!({ "error": { "kind": "internal", "message": format!("{e:#}") } }),
        )
    }

    pub fn exit_code(&self) -> i32 {
        if self.success {
            0
        } else {
            1
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.body).unwrap_or_else(|_| "{}".to_string())
    }
}

pub fn error_json(e: &JobError) -> Value {
    json!({ "kind": e.kind(), "message": e.to_string() })
}

pub fn handle_json(h: &JobHandle) -> Value {
    json!({ "id": h.id, "provider": h.provider, "submitted_at": h.submitted_at })
}

pub fn status_json(s: &JobStatus) -> Value {
    let mut v = json!({ "job": handle_json(&s.handle), "state": s.state.label() });
    match &s.state {
        genjob_core::job::JobState::Running { progress } => v["progress"] = json!(progress),
        genjob_core::job::JobState::Completed { artifact } => {
            v["artifact_uri"] = json!(display_uri(&artifact.uri))
        }
        genjob_core::job::JobState::Failed { error_kind, message } => {
            v["error"] = json!({ "code": error_kind, "message": message })
        }
        genjob_core::job::JobState::Queued => {}
    }
    v
}

/// Inline `data:` sources are shortened so stdout stays readable.
pub fn artifact_json(a: &DownloadedArtifact) -> Value {
    json!({
        "path": a.local_path,
        "byte_size": a.byte_size,
        "sha256": a.sha256,
        "source_uri": display_uri(&a.source_ref.uri),
        "downloaded_at": a.downloaded_at,
    })
}
