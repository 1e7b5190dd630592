//! Sequential `.part` writer with rename-on-finalize.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::JobError;

use super::temp_path;

/// Temp file for one artifact. Removed on drop unless `finalize` succeeded.
pub struct PartFile {
    file: Option<File>,
    temp_path: PathBuf,
    written: u64,
}

impl PartFile {
    /// Create `<final_path>.part`, creating parent directories as needed.
    /// Truncates a stale `.part` left by an earlier crash.
    pub async fn create(final_path: &Path) -> Result<Self, JobError> {
        if let Some(parent) = final_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| JobError::io(parent, e))?;
        }
        let temp_path = temp_path(final_path);
        let file = File::create(&temp_path)
            .await
            .map_err(|e| JobError::io(&temp_path, e))?;
        Ok(Self {
            file: Some(file),
            temp_path,
            written: 0,
        })
    }

    pub async fn write_chunk(&mut self, data: &[u8]) -> Result<(), JobError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| JobError::Protocol("write after finalize".into()))?;
        file.write_all(data)
            .await
            .map_err(|e| JobError::io(&self.temp_path, e))?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes handed to `write_chunk` so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush, fsync and rename onto `final_path`. Returns the size measured on disk.
    pub async fn finalize(mut self, final_path: &Path) -> Result<u64, JobError> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .await
                .map_err(|e| JobError::io(&self.temp_path, e))?;
            file.sync_all()
                .await
                .map_err(|e| JobError::io(&self.temp_path, e))?;
        }
        tokio::fs::rename(&self.temp_path, final_path)
            .await
            .map_err(|e| JobError::io(final_path, e))?;
        // Renamed away: nothing left for Drop to clean up.
        self.temp_path = PathBuf::new();
        let meta = tokio::fs::metadata(final_path)
            .await
            .map_err(|e| JobError::io(final_path, e))?;
        Ok(meta.len())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        self.file.take();
        if self.temp_path.as_os_str().is_empty() {
            return;
        }
        match std::fs::remove_file(&self.temp_path) {
            Ok(()) => tracing::debug!(path = %self.temp_path.display(), "removed partial file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.temp_path.display(), "could not remove partial file: {}", e),
        }
    }
}

/// Replace `path` with `data` through a `.part` file and rename.
pub async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), JobError> {
    let mut part = PartFile::create(path).await?;
    part.write_chunk(data).await?;
    part.finalize(path).await?;
    Ok(())
}
