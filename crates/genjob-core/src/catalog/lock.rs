//! Advisory lock shared by every process using one catalog file.
//!
//! The lock lives on a sidecar `<catalog>.lock` file, never on `catalog.json`
//! itself: saves replace the catalog by rename, which would orphan a lock held
//! on the old inode.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::JobError;

/// Exclusive lock, released when dropped (closing the fd drops the flock).
pub(super) struct FileLock {
    _file: File,
}

pub(super) fn lock_path(catalog: &Path) -> PathBuf {
    let mut name = catalog.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

impl FileLock {
    /// Block (off the runtime threads) until the lock for `catalog` is ours.
    pub(super) async fn acquire(catalog: &Path) -> Result<Self, JobError> {
        let path = lock_path(catalog);
        tokio::task::spawn_blocking(move || Self::acquire_blocking(&path))
            .await
            .map_err(|e| JobError::Opaque(format!("catalog lock task failed: {e}")))?
    }

    fn acquire_blocking(path: &Path) -> Result<Self, JobError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| JobError::io(parent, e))?;
        }
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| JobError::io(path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let fd = file.as_raw_fd();
            loop {
                let r = unsafe { libc::flock(fd, libc::LOCK_EX) };
                if r == 0 {
                    break;
                }
                let err = std::io::Error::last_os_error();
                if err.kind() != std::io::ErrorKind::Interrupted {
                    return Err(JobError::io(path, err));
                }
            }
        }

        Ok(Self { _file: file })
    }
}
