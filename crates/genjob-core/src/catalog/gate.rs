//! Cache gate with single-flight per key.
//!
//! Callers for the same key queue on a per-key async lock, so exactly one of
//! them runs the fetch and the rest find the entry it inserted. The catalog
//! itself sits behind one async mutex and is saved after every change.
//!
//! Other processes may share the file. Every change takes the sidecar file
//! lock, re-reads `catalog.json`, applies itself and saves before releasing, so
//! no process overwrites entries it never saw. The fetch runs outside the file
//! lock; two processes missing the same key at once may both fetch, and the
//! later one records a use of the entry the first inserted.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::entry::{Catalog, CatalogEntry, CatalogStats, FetchedAsset};
use super::key::normalize_key;
use super::lock::FileLock;
use crate::error::JobError;

/// Result of [`CatalogGate::lookup_or_fetch`].
#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub entry: CatalogEntry,
    /// True when this call ran the fetch.
    pub fetched: bool,
}

pub struct CatalogGate {
    path: PathBuf,
    catalog: Mutex<Catalog>,
    in_flight: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CatalogGate {
    /// Load the catalog at `path` (missing file means empty).
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, JobError> {
        let path = path.into();
        let catalog = Catalog::load(&path).await?;
        tracing::debug!(path = %path.display(), entries = catalog.len(), "catalog opened");
        Ok(Self {
            path,
            catalog: Mutex::new(catalog),
            in_flight: std::sync::Mutex::new(HashMap::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut map = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(key.to_string()).or_default().clone()
    }

    fn release_key(&self, key: &str, lock: &Arc<Mutex<()>>) {
        let mut map = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Only the map and this caller hold it: nobody is queued behind us.
        if Arc::strong_count(lock) == 2 {
            map.remove(key);
        }
    }

    /// Return the cached entry for `raw_key`, or run `fetch` once and cache its result.
    ///
    /// A hit increments `usage_count` and records `job_id`. A failed fetch
    /// leaves the catalog unchanged; the next caller for the key fetches again.
    pub async fn lookup_or_fetch<F, Fut>(
        &self,
        raw_key: &str,
        job_id: Option<&str>,
        fetch: F,
    ) -> Result<GateOutcome, JobError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<FetchedAsset, JobError>>,
    {
        let key = normalize_key(raw_key);
        if key.is_empty() {
            return Err(JobError::Validation("catalog key must not be empty".into()));
        }

        let lock = self.key_lock(&key);
        let outcome = {
            let _flight = lock.lock().await;
            self.lookup_or_fetch_locked(&key, raw_key, job_id, fetch).await
        };
        self.release_key(&key, &lock);
        outcome
    }

    async fn lookup_or_fetch_locked<F, Fut>(
        &self,
        key: &str,
        raw_key: &str,
        job_id: Option<&str>,
        fetch: F,
    ) -> Result<GateOutcome, JobError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<FetchedAsset, JobError>>,
    {
        {
            let mut catalog = self.catalog.lock().await;
            let _file = self.sync(&mut catalog).await?;
            if let Some(entry) = catalog.record_use(key, job_id) {
                catalog.save(&self.path).await?;
                tracing::info!(key, usage_count = entry.usage_count, "catalog hit");
                return Ok(GateOutcome {
                    entry,
                    fetched: false,
                });
            }
        }

        // Other keys and other processes may use the catalog while this fetch runs.
        tracing::info!(key, "catalog miss, fetching");
        let asset = fetch(key.to_string()).await?;

        let mut catalog = self.catalog.lock().await;
        let _file = self.sync(&mut catalog).await?;
        let entry = match catalog.record_use(key, job_id) {
            Some(existing) => {
                tracing::info!(key, "entry added by another process during fetch, keeping it");
                existing
            }
            None => catalog.insert_new(key, raw_key, asset, job_id),
        };
        catalog.save(&self.path).await?;
        Ok(GateOutcome {
            entry,
            fetched: true,
        })
    }

    /// Take the file lock and replace `catalog` with what is on disk now.
    /// Changes made while the returned guard lives are saved before it drops.
    async fn sync(&self, catalog: &mut Catalog) -> Result<FileLock, JobError> {
        let lock = FileLock::acquire(&self.path).await?;
        *catalog = Catalog::load(&self.path).await?;
        Ok(lock)
    }

    /// Entry as of the last load or change made through this gate.
    pub async fn get(&self, raw_key: &str) -> Option<CatalogEntry> {
        self.catalog.lock().await.get(&normalize_key(raw_key)).cloned()
    }

    pub async fn entries(&self) -> Vec<CatalogEntry> {
        self.catalog.lock().await.entries().cloned().collect()
    }

    pub async fn stats(&self) -> CatalogStats {
        self.catalog.lock().await.stats()
    }
}
