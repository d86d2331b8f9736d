//! Upload Pipeline (spec §4.7) — an `EventHandler` subscribed to
//! `AgentEvent::LapValidated`. Orchestrates the remote API's 7-step sequence
//! and reports back via `AgentEvent::LapOutcome` for the Supervisor's status
//! accounting.
//!
//! Grounded in `original_source/.../api_client.py`'s `HerbieAPIClient`
//! workflow methods (`create_session`/`create_vehicle`/`create_lap`/
//! `create_timing`/`insert_telemetry_data`/`create_lap_summary`/
//! `create_session_conditions`) and the teacher's `handlers/lap_upload.rs`
//! `EventHandler` shape.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::{
    ApiClient, ApiError, ConditionsRequest, LapRequest, SessionRequest, TelemetryPoint, TimingRequest,
    VehicleRequest,
};
use crate::events::{AgentEvent, AgentEventKind, EventHandler, HandlerContext};
use crate::model::{LapOutcome, ValidatedLap};

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub user_id: String,
    pub session_type: i32,
    pub track_name: String,
    pub slot_id: i32,
    pub driver_name: String,
    pub vehicle_name: String,
    pub physics_batch_size: usize,
    pub scoring_batch_size: usize,
    /// Whether to attempt `create_session_conditions` after each lap's
    /// summary (spec §4.7.3.e marks this step optional).
    pub upload_conditions: bool,
}

/// Lap-level counters surfaced through the Supervisor's `Status` view.
/// Request-level counters (bytes out, retry attempts) live on `ApiClient`
/// itself, reachable via `UploadPipeline::client_stats`.
#[derive(Debug, Default)]
pub struct UploadStats {
    pub laps_uploaded: AtomicU64,
    pub laps_failed: AtomicU64,
}

pub struct UploadPipeline {
    client: Arc<ApiClient>,
    config: UploadConfig,
    session_id: OnceCell<Uuid>,
    vehicle_id: OnceCell<Uuid>,
    session_creation_failed: AtomicBool,
    stats: Arc<UploadStats>,
}

impl UploadPipeline {
    pub fn new(client: Arc<ApiClient>, config: UploadConfig) -> Self {
        Self {
            client,
            config,
            session_id: OnceCell::new(),
            vehicle_id: OnceCell::new(),
            session_creation_failed: AtomicBool::new(false),
            stats: Arc::new(UploadStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<UploadStats> {
        self.stats.clone()
    }

    pub fn client_stats(&self) -> Arc<crate::api::ApiClientStats> {
        self.client.stats()
    }

    /// Steps 1-2 (spec §4.7): called once per agent run, result cached. If
    /// session/vehicle creation ever fails, every subsequent lap fails fast
    /// without hammering the endpoint again.
    async fn ensure_session_and_vehicle(&self, started_at: chrono::DateTime<chrono::Utc>) -> Result<(Uuid, Uuid), ApiError> {
        if self.session_creation_failed.load(Ordering::Acquire) {
            return Err(ApiError::InvalidRequest("session creation previously failed".into()));
        }

        let client = &self.client;
        let config = &self.config;
        let session_id = self
            .session_id
            .get_or_try_init(|| async {
                client
                    .ensure_session(&SessionRequest {
                        user_id: config.user_id.clone(),
                        session_type: config.session_type,
                        track_name: config.track_name.clone(),
                        session_stamp: started_at.to_rfc3339(),
                    })
                    .await
            })
            .await;

        let session_id = match session_id {
            Ok(id) => *id,
            Err(err) => {
                self.session_creation_failed.store(true, Ordering::Release);
                return Err(err);
            }
        };

        let vehicle_id = self
            .vehicle_id
            .get_or_try_init(|| async {
                client
                    .ensure_vehicle(&VehicleRequest {
                        session_id,
                        slot_id: config.slot_id,
                        driver_name: config.driver_name.clone(),
                        vehicle_name: config.vehicle_name.clone(),
                    })
                    .await
            })
            .await;

        match vehicle_id {
            Ok(id) => Ok((session_id, *id)),
            Err(err) => {
                self.session_creation_failed.store(true, Ordering::Release);
                Err(err)
            }
        }
    }

    async fn upload_lap(&self, lap: ValidatedLap) -> LapOutcome {
        let _timer = crate::perf::ScopedTimer::start("upload_lap");
        let closed = lap.lap;
        let lap_number = closed.lap_number;

        let started_at = closed
            .physics
            .first()
            .map(|p| p.sample_time)
            .unwrap_or_else(chrono::Utc::now);
        let ended_at = closed.physics.last().map(|p| p.sample_time).unwrap_or(started_at);

        let (session_id, vehicle_id) = match self.ensure_session_and_vehicle(started_at).await {
            Ok(ids) => ids,
            Err(err) => {
                error!(lap_number, error = %err, "cannot upload lap: session/vehicle unavailable");
                return LapOutcome::Failed {
                    lap_id: closed.lap_id,
                    lap_number,
                    reason: err.to_string(),
                };
            }
        };

        // Step 3.a
        let lap_id = match self
            .client
            .create_lap(&LapRequest {
                user_id: self.config.user_id.clone(),
                session_id,
                vehicle_id,
                lap_number,
                lap_start_time: started_at,
                lap_end_time: ended_at,
            })
            .await
        {
            Ok(id) => id,
            Err(err) => {
                warn!(lap_number, error = %err, "create_lap failed, lap marked failed");
                return LapOutcome::Failed {
                    lap_id: closed.lap_id,
                    lap_number,
                    reason: err.to_string(),
                };
            }
        };

        // Step 3.b (optional)
        let _ = self
            .client
            .create_timing(&TimingRequest {
                lap_id,
                sector_times: Vec::new(),
            })
            .await;

        // Step 3.c: physics then scoring, each chunked ascending in sample time
        // (both streams are already ascending per spec §3's Physics Sample
        // invariant and the Scoring Sampler's sequential emission order).
        for chunk in closed.physics.chunks(self.config.physics_batch_size) {
            let points: Vec<TelemetryPoint> = chunk.iter().map(TelemetryPoint::from).collect();
            if let Err(err) = self.client.insert_samples(lap_id, points).await {
                warn!(lap_number, error = %err, "insert_samples (physics) failed, lap marked failed");
                return LapOutcome::Failed {
                    lap_id: closed.lap_id,
                    lap_number,
                    reason: err.to_string(),
                };
            }
        }
        for chunk in closed.scoring.chunks(self.config.scoring_batch_size) {
            let points: Vec<TelemetryPoint> = chunk.iter().map(TelemetryPoint::from).collect();
            if let Err(err) = self.client.insert_samples(lap_id, points).await {
                warn!(lap_number, error = %err, "insert_samples (scoring) failed, lap marked failed");
                return LapOutcome::Failed {
                    lap_id: closed.lap_id,
                    lap_number,
                    reason: err.to_string(),
                };
            }
        }

        // Step 3.d
        if let Err(err) = self.client.create_lap_summary(&closed).await {
            warn!(lap_number, error = %err, "create_lap_summary failed, lap marked failed");
            return LapOutcome::Failed {
                lap_id: closed.lap_id,
                lap_number,
                reason: err.to_string(),
            };
        }

        // Step 3.e (optional)
        if self.config.upload_conditions {
            let track_temp = closed.scoring.last().map(|s| s.track_temp).unwrap_or(0.0);
            let air_temp = closed.scoring.last().map(|s| s.air_temp).unwrap_or(0.0);
            let _ = self
                .client
                .create_session_conditions(&ConditionsRequest {
                    session_id,
                    timestamp: ended_at,
                    track_temp,
                    air_temp,
                })
                .await;
        }

        self.stats.laps_uploaded.fetch_add(1, Ordering::Relaxed);
        info!(lap_number, %lap_id, "lap uploaded");
        LapOutcome::Uploaded {
            lap_id: closed.lap_id,
            lap_number,
        }
    }
}

#[async_trait]
impl EventHandler<AgentEvent> for UploadPipeline {
    fn handles(&self) -> AgentEventKind {
        AgentEventKind::LapValidated
    }

    async fn handle(&self, event: AgentEvent, ctx: &HandlerContext) {
        if let AgentEvent::LapValidated(lap) = event {
            let lap_number = lap.lap.lap_number;
            let outcome = self.upload_lap(lap).await;
            if matches!(outcome, LapOutcome::Failed { .. }) {
                self.stats.laps_failed.fetch_add(1, Ordering::Relaxed);
            }
            debug_assert_eq!(
                lap_number,
                match &outcome {
                    LapOutcome::Uploaded { lap_number, .. } => *lap_number,
                    LapOutcome::Failed { lap_number, .. } => *lap_number,
                }
            );
            ctx.publish(AgentEvent::LapOutcome(outcome));
        }
    }

    fn name(&self) -> &'static str {
        "UploadPipeline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffConfig;
    use crate::api::ApiClientConfig;
    use std::time::Duration;
    use std::sync::Arc;
    use uuid::Uuid;

    fn pipeline(base_url: String) -> UploadPipeline {
        let client = Arc::new(ApiClient::new(ApiClientConfig {
            base_url,
            timeout: Duration::from_millis(200),
            retry_attempts: 0,
            backoff: BackoffConfig {
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                multiplier: 2.0,
                jitter: false,
            },
            requests_per_minute: 1000,
            limit_wait_max: Duration::from_millis(50),
        }));
        UploadPipeline::new(
            client,
            UploadConfig {
                user_id: "driver-1".into(),
                session_type: 0,
                track_name: "Spa".into(),
                slot_id: 0,
                driver_name: "Driver One".into(),
                vehicle_name: "GT3".into(),
                physics_batch_size: 100,
                scoring_batch_size: 20,
                upload_conditions: true,
            },
        )
    }

    #[tokio::test]
    async fn unreachable_backend_fails_the_lap_without_panicking() {
        let pipeline = pipeline("http://127.0.0.1:1".into());
        let physics = vec![crate::source::MockAdapter::sample_physics(1, 0.0, 0.0)];
        let closed = crate::model::ClosedLap {
            lap_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            lap_number: 1,
            lap_time_s: 1.0,
            physics: Arc::new(physics),
            scoring: Arc::new(vec![]),
        };
        let report = crate::validation::ValidationReport::failed(crate::validation::ValidationOutcome::Valid);
        let outcome = pipeline.upload_lap(ValidatedLap { lap: closed, report }).await;
        assert!(matches!(outcome, LapOutcome::Failed { .. }));
    }
}
