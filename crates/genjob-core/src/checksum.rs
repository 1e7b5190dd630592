//! SHA-256 of finished artifacts.
//!
//! Hashed from disk after the rename, so the digest covers exactly the bytes
//! the caller will read.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::JobError;

const READ_CHUNK: usize = 64 * 1024;

/// Lowercase hex SHA-256 of the file at `path`.
pub async fn sha256_file(path: &Path) -> Result<String, JobError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| JobError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match file.read(&mut chunk).await.map_err(|e| JobError::io(path, e))? {
            0 => break,
            n => hasher.update(&chunk[..n]),
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Digest of an in-memory payload, same encoding as [`sha256_file`].
pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
