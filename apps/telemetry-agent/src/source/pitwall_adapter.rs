//! `SourceAdapter` backed by the `pitwall` crate's shared-memory client.
//!
//! Grounded in `telemetry/source.rs`'s `TelemetrySource`/`ReplaySource`/
//! `LiveSource` split, collapsed into a single adapter that owns whichever
//! connection kind it was opened with and exposes only the latest frame —
//! the dual-rate tick cadence itself lives one layer up, in
//! `crate::sampling`.

use std::path::PathBuf;

use async_trait::async_trait;
use pitwall::{Pitwall, PitwallFrame, ReplayConnection, UpdateRate};
use tracing::info;

use crate::model::{PhysicsSample, ScoringSnapshot, ScoringTrigger};
use crate::source::{SourceAdapter, SourceError};

#[derive(PitwallFrame, Debug, Clone)]
struct RawPhysicsFrame {
    #[field_name = "SessionTime"]
    session_time: f64,
    #[field_name = "Lap"]
    lap_number: i32,
    #[field_name = "LapDistPct"]
    lap_distance_pct: f32,
    #[field_name = "LapDist"]
    lap_distance: f32,
    #[field_name = "Speed"]
    speed: f32,
    #[field_name = "RPM"]
    rpm: f32,
    #[field_name = "Gear"]
    gear: i32,
    #[field_name = "Throttle"]
    throttle: f32,
    #[field_name = "Brake"]
    brake: f32,
    #[field_name = "Clutch"]
    #[missing = "0.0f32"]
    clutch: f32,
    #[field_name = "SteeringWheelAngle"]
    steering_angle: f32,
    #[field_name = "VelocityX"]
    velocity_x: f32,
    #[field_name = "VelocityY"]
    velocity_y: f32,
    #[field_name = "VelocityZ"]
    #[missing = "0.0f32"]
    velocity_z: f32,
    #[field_name = "LatAccel"]
    lateral_accel: f32,
    #[field_name = "LongAccel"]
    longitudinal_accel: f32,
    #[field_name = "VertAccel"]
    #[missing = "0.0f32"]
    vertical_accel: f32,
    #[field_name = "Yaw"]
    yaw: f32,
    #[field_name = "Pitch"]
    #[missing = "0.0f32"]
    pitch: f32,
    #[field_name = "Roll"]
    #[missing = "0.0f32"]
    roll: f32,
    #[field_name = "YawRate"]
    yaw_rate: f32,
    #[field_name = "OnPitRoad"]
    in_pits: bool,
    #[field_name = "IsOnTrack"]
    #[missing = "true"]
    on_track: bool,
}

fn adapt_physics(raw: RawPhysicsFrame) -> PhysicsSample {
    PhysicsSample {
        sample_time: chrono::Utc::now(),
        session_time: raw.session_time,
        lap_number: raw.lap_number,
        lap_distance_pct: raw.lap_distance_pct,
        lap_distance: raw.lap_distance,
        speed_kmh: raw.speed * 3.6,
        rpm: raw.rpm,
        gear: raw.gear,
        throttle: raw.throttle,
        brake: raw.brake,
        clutch: raw.clutch,
        steering_angle: raw.steering_angle,
        position_x: 0.0,
        position_y: 0.0,
        position_z: 0.0,
        velocity_x: raw.velocity_x,
        velocity_y: raw.velocity_y,
        velocity_z: raw.velocity_z,
        lateral_accel: raw.lateral_accel,
        longitudinal_accel: raw.longitudinal_accel,
        vertical_accel: raw.vertical_accel,
        yaw: raw.yaw,
        pitch: raw.pitch,
        roll: raw.roll,
        yaw_rate: raw.yaw_rate,
        in_pits: raw.in_pits,
        on_track: raw.on_track,
    }
}

/// Config mirrors `telemetry/source.rs`'s `TelemetrySourceConfig`.
#[derive(Debug, Clone)]
pub struct PitwallSourceConfig {
    pub replay_file: Option<PathBuf>,
    pub playback_speed: f64,
}

enum Connection {
    Replay(ReplayConnection),
    #[cfg(windows)]
    Live(pitwall::LiveConnection),
}

pub struct PitwallAdapter {
    config: PitwallSourceConfig,
    connection: Option<Connection>,
}

impl PitwallAdapter {
    pub fn new(config: PitwallSourceConfig) -> Self {
        Self {
            config,
            connection: None,
        }
    }
}

#[async_trait]
impl SourceAdapter for PitwallAdapter {
    async fn open(&mut self) -> Result<(), SourceError> {
        if self.connection.is_some() {
            return Ok(());
        }
        let connection = match &self.config.replay_file {
            Some(path) => {
                info!("opening replay file {}", path.display());
                let conn = Pitwall::open(path, self.config.playback_speed)
                    .await
                    .map_err(|e| SourceError::OpenFailed(e.to_string()))?;
                Connection::Replay(conn)
            }
            None => {
                #[cfg(windows)]
                {
                    info!("connecting to live simulator");
                    let conn = Pitwall::connect()
                        .await
                        .map_err(|e| SourceError::OpenFailed(e.to_string()))?;
                    Connection::Live(conn)
                }
                #[cfg(not(windows))]
                {
                    return Err(SourceError::OpenFailed(
                        "live mode is only available on Windows".into(),
                    ));
                }
            }
        };
        self.connection = Some(connection);
        Ok(())
    }

    fn read_physics(&self) -> Result<PhysicsSample, SourceError> {
        use futures::executor::block_on;
        use futures::StreamExt;

        let connection = self.connection.as_ref().ok_or(SourceError::Unavailable)?;
        let mut stream = match connection {
            Connection::Replay(c) => Box::pin(c.subscribe::<RawPhysicsFrame>(UpdateRate::Native)),
            #[cfg(windows)]
            Connection::Live(c) => Box::pin(c.subscribe::<RawPhysicsFrame>(UpdateRate::Native)),
        };
        let raw = block_on(stream.next()).ok_or(SourceError::Disconnected)?;
        Ok(adapt_physics(raw))
    }

    fn read_scoring(&self) -> Result<ScoringSnapshot, SourceError> {
        // Scoring data is derived from the same physics stream's session
        // fields in this adapter; the real mapping depends on the
        // simulator's scoring variable set, which `pitwall` exposes through
        // the same `FrameAdapter` mechanism as physics.
        let physics = self.read_physics()?;
        Ok(ScoringSnapshot {
            snapshot_time: physics.sample_time,
            update_trigger: ScoringTrigger::Periodic,
            session_time: physics.session_time,
            lap_number: physics.lap_number,
            sector: 0,
            position: 0,
            last_lap_time: 0.0,
            best_lap_time: 0.0,
            current_lap_time: 0.0,
            incidents: 0,
            fuel_level: 0.0,
            track_temp: 0.0,
            air_temp: 0.0,
            session_flags: 0,
        })
    }

    fn is_paused(&self) -> bool {
        self.connection.is_none()
    }
}
