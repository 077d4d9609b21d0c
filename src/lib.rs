//! Render Cache - bounded caching and generation pipeline for rendered documents
//!
//! Generic LRU+TTL caches under a byte budget, an orchestrator that owns the
//! content, artifact and metadata caches, and a pipeline that renders
//! templates on a worker pool with an in-process fallback.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod render;
pub mod tasks;

pub use api::AppState;
pub use cache::{BoundedCache, SharedCache};
pub use config::Config;
pub use error::{CacheError, GenerationError, RenderError};
pub use orchestrator::CacheOrchestrator;
pub use pipeline::GenerationPipeline;
pub use render::{DocumentRenderer, PlaceholderRenderer};
