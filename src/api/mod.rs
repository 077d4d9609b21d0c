//! API Module
//!
//! HTTP diagnostics surface over the generation pipeline and caches.
//!
//! # Endpoints
//! - `POST /generate` - Generate a document
//! - `POST /warm` - Warm the artifact cache
//! - `POST /invalidate` - Invalidate cache entries by pattern
//! - `POST /memory-pressure` - Inject a memory pressure event
//! - `GET /stats` - Cache and pipeline statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
