//! Catalog entries and the in-memory catalog they live in.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::job::unix_timestamp;

/// One cached asset. Lives until explicitly removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Normalized key (see [`super::normalize_key`]).
    pub key: String,
    /// The caller's spelling on first fetch.
    pub display_name: String,
    pub artifact_path: PathBuf,
    pub source_uri: String,
    pub usage_count: u64,
    #[serde(default)]
    pub used_in_jobs: BTreeSet<String>,
    pub created_at: i64,
    pub last_used_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_entries: usize,
    pub total_usages: u64,
    pub updated_at: i64,
}

/// What a fetch hands back for a cache miss.
#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub artifact_path: PathBuf,
    pub source_uri: String,
}

#[derive(Debug, Default, Clone)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
    updated_at: i64,
}

impl Catalog {
    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    /// Count one more use of an existing entry.
    pub fn record_use(&mut self, key: &str, job_id: Option<&str>) -> Option<CatalogEntry> {
        let now = unix_timestamp();
        let entry = self.entries.get_mut(key)?;
        entry.usage_count += 1;
        entry.last_used_at = now;
        if let Some(job) = job_id {
            entry.used_in_jobs.insert(job.to_string());
        }
        self.updated_at = now;
        Some(entry.clone())
    }

    /// Insert a freshly fetched asset with `usage_count = 1`.
    pub fn insert_new(
        &mut self,
        key: &str,
        display_name: &str,
        asset: FetchedAsset,
        job_id: Option<&str>,
    ) -> CatalogEntry {
        let now = unix_timestamp();
        let entry = CatalogEntry {
            key: key.to_string(),
            display_name: display_name.trim().to_string(),
            artifact_path: asset.artifact_path,
            source_uri: asset.source_uri,
            usage_count: 1,
            used_in_jobs: job_id.map(|j| j.to_string()).into_iter().collect(),
            created_at: now,
            last_used_at: now,
        };
        self.entries.insert(key.to_string(), entry.clone());
        self.updated_at = now;
        entry
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            total_entries: self.entries.len(),
            total_usages: self.entries.values().map(|e| e.usage_count).sum(),
            updated_at: self.updated_at,
        }
    }

    pub(super) fn from_parts(entries: Vec<CatalogEntry>, updated_at: i64) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.key.clone(), e)).collect(),
            updated_at,
        }
    }
}
