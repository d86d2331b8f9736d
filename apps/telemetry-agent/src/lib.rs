//! Telemetry agent library.
//!
//! Dual-rate sampling, lap lifecycle tracking, validation, and reliable
//! batched upload for racing-simulator telemetry. Modules:
//!
//! - **source**: the `SourceAdapter` boundary and its mock/pitwall impls
//! - **sampling**: the Physics Sampler (fixed cadence) and Scoring Sampler
//!   (change-triggered with periodic fallback)
//! - **lap**: the Lap Lifecycle Manager, the single consumer of raw samples
//! - **validation**: the Lap Validator's rule pipeline
//! - **upload**: the Upload Pipeline and its 7-endpoint remote API sequence
//! - **api**: the HTTP client and wire models backing the Upload Pipeline
//! - **app**: the Supervisor tying every component together
//! - **config**: CLI/env/file configuration loading and validation
//! - **events**: the agent's `AgentEvent` bus wiring
//! - **buffer**, **ratelimit**, **backoff**, **perf**: shared utilities

pub mod api;
pub mod app;
pub mod backoff;
pub mod buffer;
pub mod config;
pub mod events;
pub mod lap;
pub mod model;
pub mod perf;
pub mod ratelimit;
pub mod sampling;
pub mod source;
pub mod upload;
pub mod validation;

pub use app::{Status, Supervisor};
pub use config::Config;
pub use events::{AgentEvent, AgentEventKind, EventHandler};
