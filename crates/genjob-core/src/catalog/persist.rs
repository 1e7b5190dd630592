//! JSON persistence: `{ "entries": [...], "stats": {...} }`, rewritten whole on every save.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::entry::{Catalog, CatalogEntry, CatalogStats};
use crate::error::JobError;
use crate::storage::write_atomic;

#[derive(Debug, Serialize, Deserialize)]
struct CatalogDocument {
    entries: Vec<CatalogEntry>,
    #[serde(default)]
    stats: CatalogStats,
}

impl Catalog {
    /// Load from `path`. A missing file is an empty catalog; a malformed one is an
    /// error and is left untouched.
    pub async fn load(path: &Path) -> Result<Catalog, JobError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no catalog yet, starting empty");
                return Ok(Catalog::default());
            }
            Err(e) => return Err(JobError::io(path, e)),
        };
        let doc: CatalogDocument =
            serde_json::from_slice(&bytes).map_err(|source| JobError::CatalogParse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Catalog::from_parts(doc.entries, doc.stats.updated_at))
    }

    /// Write the whole catalog through a temp file and rename.
    pub async fn save(&self, path: &Path) -> Result<(), JobError> {
        let doc = CatalogDocument {
            entries: self.entries().cloned().collect(),
            stats: self.stats(),
        };
        let json = serde_json::to_vec_pretty(&doc)
            .map_err(|e| JobError::Opaque(format!("serialize catalog: {e}")))?;
        write_atomic(path, &json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FetchedAsset;
    use std::path::PathBuf;

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let c = Catalog::load(&dir.path().join("catalog.json")).await.unwrap();
        assert!(c.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_keeps_entries_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/catalog.json");
        let mut c = Catalog::default();
        c.insert_new(
            "nike",
            "Nike",
            FetchedAsset {
                artifact_path: PathBuf::from("assets/logos/nike.png"),
                source_uri: "https://img.logo.dev/nike.com".into(),
            },
            Some("job-1"),
        );
        c.record_use("nike", Some("job-2"));
        c.save(&path).await.unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["stats"]["total_entries"], 1);
        assert_eq!(raw["stats"]["total_usages"], 2);
        assert_eq!(raw["entries"][0]["key"], "nike");

        let loaded = Catalog::load(&path).await.unwrap();
        assert_eq!(loaded.get("nike").unwrap().usage_count, 2);
        assert_eq!(loaded.stats().total_usages, 2);
    }

    #[tokio::test]
    async fn malformed_file_is_an_error_and_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let err = Catalog::load(&path).await.unwrap_err();
        assert!(matches!(err, JobError::CatalogParse { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"{ not json");
    }
}
