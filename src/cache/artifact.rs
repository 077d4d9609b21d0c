//! Artifact Cache Module
//!
//! Caches generated documents together with how they were produced.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{BoundedCache, CacheStats, SharedCache};
use crate::config::BoundedCacheConfig;
use crate::error::CacheResult;

/// Which pipeline path produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPath {
    Worker,
    Fallback,
}

/// Facts recorded alongside a generated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub template_id: String,
    pub template_version: u32,
    pub generated_at: DateTime<Utc>,
    /// Length of the document in bytes
    pub size_bytes: usize,
    pub generation_ms: u64,
    pub path: GenerationPath,
    /// Options the document was generated with
    #[serde(default)]
    pub options: serde_json::Value,
}

/// A cached document and its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub data: String,
    pub metadata: ArtifactMetadata,
}

// == Artifact Cache ==
/// Cache of generated documents keyed by content-derived cache key.
#[derive(Debug)]
pub struct ArtifactCache {
    store: SharedCache<String, Arc<Artifact>>,
}

impl ArtifactCache {
    pub fn new(config: BoundedCacheConfig) -> Self {
        let cache = BoundedCache::with_estimator(config, Arc::new(artifact_size));
        Self {
            store: SharedCache::new("artifacts", cache),
        }
    }

    /// Wraps `data` with `metadata` and stores the pair.
    pub async fn set_artifact(
        &self,
        key: impl Into<String>,
        data: String,
        metadata: ArtifactMetadata,
    ) -> CacheResult<()> {
        let artifact = Arc::new(Artifact { data, metadata });
        self.store.set(key.into(), artifact, None).await
    }

    /// Returns the document only.
    pub async fn get_artifact_data(&self, key: &str) -> Option<String> {
        self.store.get(key).await.map(|artifact| artifact.data.clone())
    }

    /// Returns the document and its metadata.
    pub async fn get_artifact_with_metadata(&self, key: &str) -> Option<Arc<Artifact>> {
        self.store.get(key).await
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.store.delete(key).await
    }

    pub async fn has(&self, key: &str) -> bool {
        self.store.has(key).await
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.stats().await
    }

    /// Underlying cache, for maintenance and invalidation.
    pub fn store(&self) -> &SharedCache<String, Arc<Artifact>> {
        &self.store
    }
}

/// Document bytes plus a rough allowance for the metadata.
fn artifact_size(artifact: &Arc<Artifact>) -> usize {
    let meta = &artifact.metadata;
    artifact.data.len()
        + meta.template_id.len()
        + serde_json::to_vec(&meta.options).map_or(0, |v| v.len())
        + 64
}
