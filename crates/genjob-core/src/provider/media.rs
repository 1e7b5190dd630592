//! Reference images given as local paths or `file://` URIs.

use std::path::{Path, PathBuf};

use crate::error::JobError;

pub(crate) struct LocalImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub file_name: String,
}

pub(crate) fn is_remote(reference: &str) -> bool {
    let lower = reference.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
}

pub(crate) fn image_mime(path: &Path) -> Result<&'static str, JobError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "webp" => Ok("image/webp"),
        _ => Err(JobError::Validation(format!(
            "reference image must be png, jpeg or webp: {}",
            path.display()
        ))),
    }
}

fn local_path(reference: &str) -> PathBuf {
    url::Url::parse(reference)
        .ok()
        .filter(|u| u.scheme() == "file")
        .and_then(|u| u.to_file_path().ok())
        .unwrap_or_else(|| PathBuf::from(reference))
}

/// Read a local reference image. Missing files fail validation before any upload.
pub(crate) async fn load_local_image(reference: &str) -> Result<LocalImage, JobError> {
    let path = local_path(reference);
    let mime = image_mime(&path)?;
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        JobError::Validation(format!("cannot read reference image {}: {e}", path.display()))
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "reference".to_string());
    Ok(LocalImage {
        bytes,
        mime,
        file_name,
    })
}
