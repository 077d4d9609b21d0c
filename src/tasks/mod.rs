//! Background Tasks Module
//!
//! Long-running tasks owned by the cache orchestrator.
//!
//! # Tasks
//! - Maintenance: expires stale entries and enforces the memory high-water mark
//! - Pressure listener: reacts to memory pressure signals from a monitor

mod maintenance;
mod pressure;

pub use maintenance::spawn_maintenance_task;
pub use pressure::spawn_pressure_listener;
