//! Request and Response models for the diagnostics API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

pub use requests::{InvalidateRequest, MemoryPressureRequest, PatternMode, WarmRequest};
pub use responses::{
    GenerateResponse, HealthResponse, InvalidateResponse, MemoryPressureResponse, StatsResponse,
};
