//! Local analysis cache
//!
//! One JSON file per content hash: `<cache_dir>/<md5>.json`. An entry is
//! written once, after a complete retrieval, and read back in place of any
//! network traffic for the same file.
//!
//! Writes are guarded per hash: an in-process async mutex serializes writers
//! for the same hash, and the file itself is produced as a temp file in the
//! cache folder and renamed into place without clobbering, so a reader never
//! sees a partial entry and a second writer never replaces the first.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::TrackAnalysis;
use crate::services::hasher::ContentHash;

const ENTRY_EXTENSION: &str = "json";

/// Outcome of a cache write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Written,
    /// An entry for this hash already existed and was left untouched
    AlreadyPresent,
}

/// File-per-hash store of completed analyses
pub struct AnalysisCache {
    cache_dir: PathBuf,
    write_locks: Mutex<HashMap<ContentHash, Arc<tokio::sync::Mutex<()>>>>,
}

impl AnalysisCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn entry_path(&self, md5: &ContentHash) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", md5.as_str(), ENTRY_EXTENSION))
    }

    /// Load the persisted analysis for `md5`
    ///
    /// `None` when there is no entry, or when the entry was fetched with a
    /// different analysis version.
    pub async fn load(
        &self,
        md5: &ContentHash,
        analysis_version: u32,
    ) -> AnalysisResult<Option<TrackAnalysis>> {
        let path = self.entry_path(md5);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(md5 = %md5, "No cached analysis");
                return Ok(None);
            }
            Err(e) => {
                return Err(AnalysisError::Cache(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let analysis: TrackAnalysis = serde_json::from_slice(&bytes).map_err(|e| {
            AnalysisError::Cache(format!("Corrupt cache entry {}: {}", path.display(), e))
        })?;

        if analysis.md5 != md5.as_str() {
            return Err(AnalysisError::Cache(format!(
                "Cache entry {} belongs to {}",
                path.display(),
                analysis.md5
            )));
        }

        if analysis.analysis_version != analysis_version {
            tracing::warn!(
                md5 = %md5,
                cached_version = analysis.analysis_version,
                requested_version = analysis_version,
                "Cached analysis has a different analysis version, ignoring it"
            );
            return Ok(None);
        }

        tracing::info!(md5 = %md5, path = %path.display(), "Loaded analysis from disk");
        Ok(Some(analysis))
    }

    /// Persist a completed analysis, once per hash
    pub async fn store(&self, analysis: &TrackAnalysis) -> AnalysisResult<StoreOutcome> {
        let md5 = ContentHash::parse(&analysis.md5)
            .map_err(|e| AnalysisError::Cache(format!("Cannot key cache entry: {}", e)))?;

        let lock = self.write_lock(&md5);
        let outcome = {
            let _guard = lock.lock().await;
            self.write_entry(&md5, analysis).await
        };
        self.release_write_lock(&md5, lock);
        outcome
    }

    async fn write_entry(
        &self,
        md5: &ContentHash,
        analysis: &TrackAnalysis,
    ) -> AnalysisResult<StoreOutcome> {
        let path = self.entry_path(md5);

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(md5 = %md5, "Cache entry already present");
            return Ok(StoreOutcome::AlreadyPresent);
        }

        let json = serde_json::to_vec_pretty(analysis)
            .map_err(|e| AnalysisError::Cache(format!("Serialize analysis failed: {}", e)))?;

        let cache_dir = self.cache_dir.clone();
        let target = path.clone();
        let outcome = tokio::task::spawn_blocking(move || write_once(&cache_dir, &target, &json))
            .await
            .map_err(|e| AnalysisError::Internal(format!("Cache write task failed: {}", e)))??;

        match outcome {
            StoreOutcome::Written => {
                tracing::info!(md5 = %md5, path = %path.display(), "Saved analysis to disk")
            }
            StoreOutcome::AlreadyPresent => {
                tracing::debug!(md5 = %md5, "Another writer persisted this entry first")
            }
        }
        Ok(outcome)
    }

    fn write_lock(&self, md5: &ContentHash) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .write_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(md5.clone()).or_default().clone()
    }

    /// Drop the per-hash lock once no other writer holds it
    fn release_write_lock(&self, md5: &ContentHash, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        let mut locks = self
            .write_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if locks
            .get(md5)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(md5);
        }
    }
}

fn write_once(cache_dir: &Path, target: &Path, json: &[u8]) -> AnalysisResult<StoreOutcome> {
    let cache_err = |what: &str, e: std::io::Error| {
        AnalysisError::Cache(format!("{} in {}: {}", what, cache_dir.display(), e))
    };

    std::fs::create_dir_all(cache_dir).map_err(|e| cache_err("Create cache folder failed", e))?;

    let mut temp = tempfile::NamedTempFile::new_in(cache_dir)
        .map_err(|e| cache_err("Create temp file failed", e))?;
    temp.write_all(json)
        .map_err(|e| cache_err("Write temp file failed", e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| cache_err("Sync temp file failed", e))?;

    match temp.persist_noclobber(target) {
        Ok(_) => Ok(StoreOutcome::Written),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
            Ok(StoreOutcome::AlreadyPresent)
        }
        Err(e) => Err(cache_err("Rename into place failed", e.error)),
    }
}
