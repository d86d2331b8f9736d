//! Wire DTOs for the remote telemetry API (spec §6). These are deliberately
//! separate from the internal `crate::model` types: the internal types carry
//! everything the validator/lifecycle manager need, the wire types carry only
//! what each endpoint's contract requires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{ClosedLap, PhysicsSample, ScoringSnapshot, ScoringTrigger};

/// Generic envelope every endpoint responds with: `{ success, data|error, status }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
}

/// Step 1: `POST /api/telemetry/sessions`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRequest {
    pub user_id: String,
    pub session_type: i32,
    pub track_name: String,
    pub session_stamp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionCreated {
    pub id: Uuid,
}

/// Step 2: `POST /api/telemetry/vehicles`.
#[derive(Debug, Clone, Serialize)]
pub struct VehicleRequest {
    pub session_id: Uuid,
    pub slot_id: i32,
    pub driver_name: String,
    pub vehicle_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleCreated {
    pub id: Uuid,
}

/// Step 3: `POST /api/telemetry/laps`.
#[derive(Debug, Clone, Serialize)]
pub struct LapRequest {
    pub user_id: String,
    pub session_id: Uuid,
    pub vehicle_id: Uuid,
    pub lap_number: i32,
    pub lap_start_time: DateTime<Utc>,
    pub lap_end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LapCreated {
    pub id: Uuid,
}

/// Step 4: `POST /api/telemetry/timing` (optional, sector times).
#[derive(Debug, Clone, Serialize)]
pub struct TimingRequest {
    pub lap_id: Uuid,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sector_times: Vec<f64>,
}

/// Step 5: `POST /api/telemetry/data`, one batch at a time.
#[derive(Debug, Clone, Serialize)]
pub struct DataRequest {
    pub lap_id: Uuid,
    pub telemetry_points: Vec<TelemetryPoint>,
}

/// One row of the uploaded stream. Physics and scoring batches both land
/// here, tagged by `kind` so the backend can distinguish them without two
/// endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryPoint {
    Physics {
        sample_time: DateTime<Utc>,
        session_time: f64,
        speed_kmh: f32,
        rpm: f32,
        gear: i32,
        throttle: f32,
        brake: f32,
        lap_distance_pct: f32,
        position_x: f32,
        position_y: f32,
        position_z: f32,
    },
    Scoring {
        snapshot_time: DateTime<Utc>,
        session_time: f64,
        trigger: ScoringTrigger,
        sector: i32,
        position: i32,
        last_lap_time: f64,
        fuel_level: f32,
    },
}

impl From<&PhysicsSample> for TelemetryPoint {
    fn from(p: &PhysicsSample) -> Self {
        TelemetryPoint::Physics {
            sample_time: p.sample_time,
            session_time: p.session_time,
            speed_kmh: p.speed_kmh,
            rpm: p.rpm,
            gear: p.gear,
            throttle: p.throttle,
            brake: p.brake,
            lap_distance_pct: p.lap_distance_pct,
            position_x: p.position_x,
            position_y: p.position_y,
            position_z: p.position_z,
        }
    }
}

impl From<&ScoringSnapshot> for TelemetryPoint {
    fn from(s: &ScoringSnapshot) -> Self {
        TelemetryPoint::Scoring {
            snapshot_time: s.snapshot_time,
            session_time: s.session_time,
            trigger: s.update_trigger,
            sector: s.sector,
            position: s.position,
            last_lap_time: s.last_lap_time,
            fuel_level: s.fuel_level,
        }
    }
}

/// Step 6: `POST /api/telemetry/summary` — aggregates computed by the
/// Upload Pipeline over the closed lap's physics stream (spec §4.7.d).
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRequest {
    pub lap_id: Uuid,
    pub max_speed_kmh: f32,
    pub avg_speed_kmh: f32,
    pub min_speed_kmh: f32,
    pub max_rpm: f32,
    pub avg_throttle: f32,
    pub avg_brake: f32,
    pub fuel_used: f32,
    pub total_distance_m: f32,
}

impl SummaryRequest {
    /// Invariant (spec §8.6): `max_speed >= avg_speed >= min_speed`, and
    /// `fuel_used = max(0, fuel_start - fuel_end)`.
    pub fn from_lap(lap: &ClosedLap) -> Self {
        let speeds: Vec<f32> = lap.physics.iter().map(|p| p.speed_kmh).collect();
        let max_speed_kmh = speeds.iter().copied().fold(f32::MIN, f32::max).max(0.0);
        let min_speed_kmh = speeds.iter().copied().fold(f32::MAX, f32::min).min(max_speed_kmh);
        let avg_speed_kmh = if speeds.is_empty() {
            0.0
        } else {
            (speeds.iter().sum::<f32>() / speeds.len() as f32).clamp(min_speed_kmh, max_speed_kmh)
        };
        let max_rpm = lap.physics.iter().map(|p| p.rpm).fold(0.0_f32, f32::max);
        let avg_throttle = mean(lap.physics.iter().map(|p| p.throttle));
        let avg_brake = mean(lap.physics.iter().map(|p| p.brake));

        let fuel_start = lap.scoring.first().map(|s| s.fuel_level).unwrap_or(0.0);
        let fuel_end = lap.scoring.last().map(|s| s.fuel_level).unwrap_or(fuel_start);
        let fuel_used = (fuel_start - fuel_end).max(0.0);

        let total_distance_m = lap.physics.last().map(|p| p.lap_distance).unwrap_or(0.0);

        Self {
            lap_id: lap.lap_id,
            max_speed_kmh,
            avg_speed_kmh,
            min_speed_kmh,
            max_rpm,
            avg_throttle,
            avg_brake,
            fuel_used,
            total_distance_m,
        }
    }
}

fn mean(values: impl Iterator<Item = f32> + Clone) -> f32 {
    let count = values.clone().count();
    if count == 0 {
        0.0
    } else {
        values.sum::<f32>() / count as f32
    }
}

/// Step 7: `POST /api/telemetry/conditions` (optional).
#[derive(Debug, Clone, Serialize)]
pub struct ConditionsRequest {
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub track_temp: f32,
    pub air_temp: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn lap_with(speeds: &[f32]) -> ClosedLap {
        let physics = speeds
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                let mut p = crate::source::MockAdapter::sample_physics(1, i as f64 * 0.1, 0.0);
                p.speed_kmh = s;
                p
            })
            .collect();
        ClosedLap {
            lap_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            lap_number: 1,
            lap_time_s: speeds.len() as f64 * 0.1,
            physics: Arc::new(physics),
            scoring: Arc::new(vec![]),
        }
    }

    #[test]
    fn summary_respects_max_avg_min_ordering() {
        let summary = SummaryRequest::from_lap(&lap_with(&[100.0, 200.0, 150.0]));
        assert!(summary.max_speed_kmh >= summary.avg_speed_kmh);
        assert!(summary.avg_speed_kmh >= summary.min_speed_kmh);
    }

    #[test]
    fn fuel_used_is_never_negative() {
        let mut lap = lap_with(&[100.0]);
        lap.scoring = Arc::new(vec![]);
        let summary = SummaryRequest::from_lap(&lap);
        assert_eq!(summary.fuel_used, 0.0);
    }
}
