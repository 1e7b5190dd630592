//! API keys come from the environment only, checked before any network call.

use crate::error::JobError;

/// Read a non-empty credential from environment variable `var`.
pub fn credential(var: &'static str) -> Result<String, JobError> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(JobError::MissingCredential { var }),
    }
}
