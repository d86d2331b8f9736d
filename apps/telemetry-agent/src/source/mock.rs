//! Scripted `SourceAdapter` used by unit/integration tests across the
//! sampling, lifecycle, and validation modules — grounded in the teacher's
//! `ReplaySource`/test-fixture pattern (`telemetry/source.rs`'s `#[cfg(test)]`
//! module), generalized to a hand-scripted frame sequence instead of an IBT
//! file so tests don't depend on binary fixtures.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::model::{PhysicsSample, ScoringSnapshot};
use crate::source::{SourceAdapter, SourceError};

pub struct MockAdapter {
    physics: Mutex<VecDeque<PhysicsSample>>,
    scoring: Mutex<VecDeque<ScoringSnapshot>>,
    opened: Mutex<bool>,
    paused: Mutex<bool>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            physics: Mutex::new(VecDeque::new()),
            scoring: Mutex::new(VecDeque::new()),
            opened: Mutex::new(false),
            paused: Mutex::new(false),
        }
    }

    /// Scripted frames are replayed in the order they were pushed (FIFO),
    /// matching the simulator's own tick ordering.
    pub fn push_physics(&self, sample: PhysicsSample) {
        self.physics.lock().unwrap().push_back(sample);
    }

    pub fn push_scoring(&self, snapshot: ScoringSnapshot) {
        self.scoring.lock().unwrap().push_back(snapshot);
    }

    pub fn set_paused(&self, paused: bool) {
        *self.paused.lock().unwrap() = paused;
    }

    /// Build a single synthetic physics sample for a given lap/time, useful
    /// for constructing test sequences quickly.
    pub fn sample_physics(lap_number: i32, session_time: f64, lap_distance_pct: f32) -> PhysicsSample {
        PhysicsSample {
            sample_time: Utc::now(),
            session_time,
            lap_number,
            lap_distance_pct,
            lap_distance: lap_distance_pct * 5000.0,
            speed_kmh: 180.0,
            rpm: 7000.0,
            gear: 4,
            throttle: 0.8,
            brake: 0.0,
            clutch: 0.0,
            steering_angle: 0.0,
            position_x: 100.0,
            position_y: 200.0,
            position_z: 0.0,
            velocity_x: 50.0,
            velocity_y: 0.0,
            velocity_z: 0.0,
            lateral_accel: 0.0,
            longitudinal_accel: 0.0,
            vertical_accel: 0.0,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            yaw_rate: 0.0,
            in_pits: false,
            on_track: true,
        }
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    async fn open(&mut self) -> Result<(), SourceError> {
        *self.opened.lock().unwrap() = true;
        Ok(())
    }

    fn read_physics(&self) -> Result<PhysicsSample, SourceError> {
        if !*self.opened.lock().unwrap() {
            return Err(SourceError::Unavailable);
        }
        self.physics
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(SourceError::Unavailable)
    }

    fn read_scoring(&self) -> Result<ScoringSnapshot, SourceError> {
        if !*self.opened.lock().unwrap() {
            return Err(SourceError::Unavailable);
        }
        self.scoring
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(SourceError::Unavailable)
    }

    fn is_paused(&self) -> bool {
        *self.paused.lock().unwrap()
    }
}
