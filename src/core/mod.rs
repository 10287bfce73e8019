//! Core infrastructure: configuration, time, pooling and telemetry.

pub mod config;
pub mod pool;
pub mod telemetry;
pub mod time;
