//! Remote telemetry API — the Upload Pipeline's HTTP boundary (spec §4.7/§6).

pub mod client;
pub mod models;

pub use client::{ApiClient, ApiClientConfig, ApiClientStats, ApiError};
pub use models::*;
