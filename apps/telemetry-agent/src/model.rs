//! Shared value types passed between samplers, the lifecycle manager, the
//! validator, and the upload pipeline (spec Data Model, §3).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One high-frequency physics tick (~90 Hz). Carries the simulator's own
/// `lap_number` (used by the Lifecycle Manager to detect boundaries); the
/// internal `lap_id` is assigned later, once the Manager has opened a lap
/// around it.
/// Field set mirrors the union described in spec §3 and the original
/// tracker's `_extract_physics_data` helpers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsSample {
    pub sample_time: DateTime<Utc>,
    pub session_time: f64,
    pub lap_number: i32,
    pub lap_distance_pct: f32,
    pub lap_distance: f32,
    pub speed_kmh: f32,
    pub rpm: f32,
    pub gear: i32,
    pub throttle: f32,
    pub brake: f32,
    pub clutch: f32,
    pub steering_angle: f32,
    pub position_x: f32,
    pub position_y: f32,
    pub position_z: f32,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub velocity_z: f32,
    pub lateral_accel: f32,
    pub longitudinal_accel: f32,
    pub vertical_accel: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub yaw_rate: f32,
    pub in_pits: bool,
    pub on_track: bool,
}

/// One low-frequency scoring snapshot, captured either on a trigger or on
/// the periodic deadline (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringSnapshot {
    pub snapshot_time: DateTime<Utc>,
    pub update_trigger: ScoringTrigger,
    pub session_time: f64,
    pub lap_number: i32,
    pub sector: i32,
    pub position: i32,
    pub last_lap_time: f64,
    pub best_lap_time: f64,
    pub current_lap_time: f64,
    pub incidents: i32,
    pub fuel_level: f32,
    pub track_temp: f32,
    pub air_temp: f32,
    pub session_flags: u32,
}

/// Fixed priority order a trigger is evaluated in, per
/// `snapshot_collector.py`'s `_collect_scoring_snapshot`: the first trigger
/// that fires wins, there is no "multiple triggers at once" case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoringTrigger {
    SectorComplete,
    LapComplete,
    PositionChange,
    Periodic,
}

/// What both samplers push into the Lifecycle Manager's single inbound
/// channel (spec §5: "an in-process MPMC channel consumed only by the
/// Manager" — producers are the two samplers, consumer is the Manager).
#[derive(Debug, Clone)]
pub enum RawSample {
    Physics(PhysicsSample),
    Scoring(ScoringSnapshot),
}

/// A lap that has been sealed by the Lifecycle Manager (boundary detected,
/// buffers drained) but not yet validated.
#[derive(Debug, Clone)]
pub struct ClosedLap {
    pub lap_id: Uuid,
    pub session_id: Uuid,
    pub lap_number: i32,
    pub lap_time_s: f64,
    pub physics: Arc<Vec<PhysicsSample>>,
    pub scoring: Arc<Vec<ScoringSnapshot>>,
}

/// A closed lap the Validator has accepted, carrying its report and ready
/// for the Upload Pipeline. Ownership of the sample buffers moves here
/// (no clone) per the Data Model's ownership rule.
#[derive(Debug, Clone)]
pub struct ValidatedLap {
    pub lap: ClosedLap,
    pub report: crate::validation::ValidationReport,
}

/// Outcome of an upload attempt, reported back to the Supervisor for status
/// accounting.
#[derive(Debug, Clone)]
pub enum LapOutcome {
    Uploaded { lap_id: Uuid, lap_number: i32 },
    Failed { lap_id: Uuid, lap_number: i32, reason: String },
}

/// Minimal session identity the Lifecycle Manager gates on before accepting
/// any sample (spec §4.4: "session initialization gating").
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub track_name: String,
    pub vehicle_name: String,
    pub started_at: DateTime<Utc>,
}
