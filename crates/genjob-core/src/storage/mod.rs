//! Disk I/O and file lifecycle.
//!
//! Artifacts are streamed into `<dest>.part`, fsynced, then atomically renamed
//! onto `<dest>`. A `.part` file that is dropped before `finalize` is removed,
//! so a failed or cancelled download never leaves partial data behind.

mod writer;

pub use writer::{write_atomic, PartFile};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `clip.mp4` → `clip.mp4.part`).
pub fn temp_path(final_path: &std::path::Path) -> std::path::PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    std::path::PathBuf::from(o)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn temp_path_appends_part() {
        let p = temp_path(Path::new("clip.mp4"));
        assert_eq!(p.to_string_lossy(), "clip.mp4.part");
        let p2 = temp_path(Path::new("/tmp/voice.mp3"));
        assert_eq!(p2.to_string_lossy(), "/tmp/voice.mp3.part");
    }

    #[tokio::test]
    async fn create_write_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("nested/out/output.bin");
        let tp = temp_path(&final_path);

        let mut part = PartFile::create(&final_path).await.unwrap();
        part.write_chunk(b"hello ").await.unwrap();
        part.write_chunk(b"world").await.unwrap();
        assert_eq!(part.written(), 11);
        assert!(tp.exists());
        let size = part.finalize(&final_path).await.unwrap();

        assert_eq!(size, 11);
        assert!(!tp.exists());
        assert_eq!(std::fs::read(&final_path).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn dropped_part_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("clip.mp4");
        let tp = temp_path(&final_path);
        {
            let mut part = PartFile::create(&final_path).await.unwrap();
            part.write_chunk(b"partial").await.unwrap();
            assert!(tp.exists());
        }
        assert!(!tp.exists());
        assert!(!final_path.exists());
    }

    #[tokio::test]
    async fn finalize_replaces_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("logo.png");
        std::fs::write(&final_path, b"old").unwrap();
        let mut part = PartFile::create(&final_path).await.unwrap();
        part.write_chunk(b"new bytes").await.unwrap();
        part.finalize(&final_path).await.unwrap();
        assert_eq!(std::fs::read(&final_path).unwrap(), b"new bytes");
    }

    #[tokio::test]
    async fn write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/catalog.json");
        write_atomic(&path, b"{}").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
        assert!(!temp_path(&path).exists());
    }
}
