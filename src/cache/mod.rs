//! Cache Module
//!
//! Bounded LRU caching with TTL expiration and byte-size limits, plus the
//! specialized content and artifact caches built on top of it.

mod artifact;
mod bounded;
mod content;
mod entry;
mod lru;
mod shared;
mod stats;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use artifact::{Artifact, ArtifactCache, ArtifactMetadata, GenerationPath};
pub use bounded::{json_size_estimator, BoundedCache, SizeEstimator, DEFAULT_RELEASE_RATIO};
pub use content::{compact_stylesheet, ContentCache, ContentCacheStats};
pub use entry::{current_timestamp_ms, CacheEntry};
pub use lru::LruOrder;
pub use shared::SharedCache;
pub use stats::{CacheCounters, CacheStats};
