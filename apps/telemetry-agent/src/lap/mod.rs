//! Lap Lifecycle Manager (spec §4.4) — the sole consumer of the
//! `AgentEvent::Raw` channel both samplers publish to. Grounded in the
//! teacher's `LapHandler` (`handlers/lap.rs`, buffer-until-boundary pattern)
//! generalized to two streams, pit exclusion, and session-gating, and in
//! `original_source/.../snapshot_collector.py`'s `_handle_lap_change`
//! (flush-both-buffers-and-reset-state on rotation).

mod state;

pub use state::LifecycleState;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::buffer::BatchBuffer;
use crate::events::{AgentEvent, AgentEventKind, EventHandler, HandlerContext};
use crate::model::{ClosedLap, RawSample, SessionInfo, ValidatedLap};
use crate::validation::{validate_lap, ValidationConfig, ValidationOutcome};

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub physics_batch_size: usize,
    pub scoring_batch_size: usize,
    pub physics_flush_interval: Duration,
    pub scoring_flush_interval: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            // ~1s at 90Hz / ~4s at 5Hz, matching snapshot_collector.py's
            // physics_batch_size=100 / scoring_batch_size=20.
            physics_batch_size: 100,
            scoring_batch_size: 20,
            physics_flush_interval: Duration::from_secs(1),
            scoring_flush_interval: Duration::from_secs(4),
        }
    }
}

/// Lap-level counters exposed to the Supervisor's `Status` view.
#[derive(Debug, Default)]
pub struct LifecycleStats {
    pub laps_closed: AtomicU64,
    pub laps_discarded: AtomicU64,
}

pub struct LapLifecycleManager {
    config: LifecycleConfig,
    validation: ValidationConfig,
    state: RwLock<LifecycleState>,
    stats: Arc<LifecycleStats>,
}

impl LapLifecycleManager {
    pub fn new(config: LifecycleConfig, validation: ValidationConfig) -> Self {
        Self {
            state: RwLock::new(LifecycleState::new(&config)),
            config,
            validation,
            stats: Arc::new(LifecycleStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<LifecycleStats> {
        self.stats.clone()
    }

    async fn on_raw_sample(&self, sample: RawSample, ctx: &HandlerContext) {
        let mut state = self.state.write().await;

        let lap_number = match &sample {
            RawSample::Physics(p) => {
                if p.in_pits {
                    return;
                }
                p.lap_number
            }
            RawSample::Scoring(s) => s.lap_number,
        };

        if state.session.is_none() {
            state.session = Some(SessionInfo {
                session_id: Uuid::new_v4(),
                track_name: "unknown".to_string(),
                vehicle_name: "unknown".to_string(),
                started_at: chrono::Utc::now(),
            });
            state.current_lap_number = lap_number;
            debug!(lap_number, "session initialized on first accepted sample");
        } else if lap_number != state.current_lap_number {
            self.close_lap(&mut state, ctx).await;
            state.current_lap_number = lap_number;
            state.lap_id = Uuid::new_v4();
        }

        match sample {
            RawSample::Physics(p) => {
                if state.physics_buffer.push(p) {
                    state.physics_history.extend(state.physics_buffer.take());
                }
            }
            RawSample::Scoring(s) => {
                if state.scoring_buffer.push(s) {
                    state.scoring_history.extend(state.scoring_buffer.take());
                }
            }
        }
    }

    async fn close_lap(&self, state: &mut LifecycleState, ctx: &HandlerContext) {
        state.physics_history.extend(state.physics_buffer.take());
        state.scoring_history.extend(state.scoring_buffer.take());

        // A lap that never accumulated a physics sample spent its entire
        // window inside pit/garage exclusion (spec §3: "a lap that begins or
        // ends entirely inside pit exclusion is flagged invalid_pit at
        // close"). It still counts against `laps_discarded`.
        if state.physics_history.is_empty() {
            self.stats.laps_discarded.fetch_add(1, Ordering::Relaxed);
            warn!(
                lap_number = state.current_lap_number,
                outcome = ?ValidationOutcome::InvalidPit,
                "lap discarded: entirely inside pit exclusion"
            );
            state.scoring_history.clear();
            return;
        }

        let session_id = state
            .session
            .as_ref()
            .map(|s| s.session_id)
            .unwrap_or_else(Uuid::nil);

        let lap_time_s = match (state.physics_history.first(), state.physics_history.last()) {
            (Some(first), Some(last)) => last.session_time - first.session_time,
            _ => 0.0,
        };

        let closed = ClosedLap {
            lap_id: state.lap_id,
            session_id,
            lap_number: state.current_lap_number,
            lap_time_s,
            physics: Arc::new(std::mem::take(&mut state.physics_history)),
            scoring: Arc::new(std::mem::take(&mut state.scoring_history)),
        };

        state.physics_buffer = BatchBuffer::new(self.config.physics_batch_size, self.config.physics_flush_interval);
        state.scoring_buffer = BatchBuffer::new(self.config.scoring_batch_size, self.config.scoring_flush_interval);

        let report = validate_lap(&closed, &self.validation);
        if report.outcome == ValidationOutcome::Valid {
            self.stats.laps_closed.fetch_add(1, Ordering::Relaxed);
            info!(lap_number = closed.lap_number, "lap closed and validated");
            ctx.publish(AgentEvent::LapValidated(ValidatedLap { lap: closed, report }));
        } else {
            self.stats.laps_discarded.fetch_add(1, Ordering::Relaxed);
            warn!(
                lap_number = closed.lap_number,
                outcome = ?report.outcome,
                "lap discarded by validator"
            );
        }
    }
}

#[async_trait]
impl EventHandler<AgentEvent> for LapLifecycleManager {
    fn handles(&self) -> AgentEventKind {
        AgentEventKind::Raw
    }

    async fn handle(&self, event: AgentEvent, ctx: &HandlerContext) {
        if let AgentEvent::Raw(sample) = event {
            self.on_raw_sample(sample, ctx).await;
        }
    }

    fn name(&self) -> &'static str {
        "LapLifecycleManager"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AgentEventKind, EventBus, HandlerRegistry};
    use crate::model::ScoringSnapshot;
    use crate::source::MockAdapter;
    use crate::validation::ValidationConfig;

    fn permissive_validation() -> ValidationConfig {
        ValidationConfig {
            min_points: 1,
            min_lap_time_s: 0.0,
            max_lap_time_s: 100_000.0,
            max_gap_s: 100_000.0,
            speed_outlier_threshold_kmh: 100_000.0,
            min_distance_percentage: 0.0,
        }
    }

    fn fine_grained_buffers() -> LifecycleConfig {
        LifecycleConfig {
            physics_batch_size: 1,
            scoring_batch_size: 1,
            physics_flush_interval: Duration::from_millis(1),
            scoring_flush_interval: Duration::from_millis(1),
        }
    }

    fn scoring_for_lap(lap_number: i32) -> ScoringSnapshot {
        ScoringSnapshot {
            snapshot_time: chrono::Utc::now(),
            update_trigger: crate::model::ScoringTrigger::Periodic,
            session_time: lap_number as f64,
            lap_number,
            sector: 0,
            position: 1,
            last_lap_time: 0.0,
            best_lap_time: 0.0,
            current_lap_time: 0.0,
            incidents: 0,
            fuel_level: 100.0,
            track_temp: 25.0,
            air_temp: 20.0,
            session_flags: 0,
        }
    }

    #[tokio::test]
    async fn boundary_crossing_closes_and_validates_the_prior_lap() {
        let bus: EventBus = EventBus::new(16);
        let mut validated_rx = bus.subscribe(AgentEventKind::LapValidated);

        let manager = LapLifecycleManager::new(fine_grained_buffers(), permissive_validation());
        let stats = manager.stats();
        let mut registry: HandlerRegistry = HandlerRegistry::new();
        registry.register(manager);
        let handles = registry.run(bus.clone());

        bus.publish(AgentEvent::Raw(RawSample::Physics(MockAdapter::sample_physics(1, 0.0, 0.0))))
            .unwrap();
        bus.publish(AgentEvent::Raw(RawSample::Physics(MockAdapter::sample_physics(1, 0.1, 0.1))))
            .unwrap();
        bus.publish(AgentEvent::Raw(RawSample::Physics(MockAdapter::sample_physics(2, 0.2, 0.2))))
            .unwrap();

        let validated = tokio::time::timeout(Duration::from_secs(1), validated_rx.recv())
            .await
            .expect("should receive a validated lap")
            .unwrap();
        match validated {
            AgentEvent::LapValidated(v) => assert_eq!(v.lap.lap_number, 1),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(stats.laps_closed.load(Ordering::Relaxed), 1);

        registry.shutdown();
        for h in handles {
            let _ = tokio::time::timeout(Duration::from_secs(1), h).await;
        }
    }

    /// Spec §3/§4.4: "a lap that begins or ends entirely inside pit exclusion
    /// is flagged invalid_pit at close". The boundary to and from such a lap
    /// is still observable via the Scoring stream (which has no `in_pits`
    /// exclusion), even though every Physics Sample for it was dropped.
    #[tokio::test]
    async fn a_lap_entirely_inside_pit_exclusion_is_discarded_without_validation() {
        let bus: EventBus = EventBus::new(16);
        let mut validated_rx = bus.subscribe(AgentEventKind::LapValidated);

        let manager = LapLifecycleManager::new(fine_grained_buffers(), permissive_validation());
        let stats = manager.stats();
        let mut registry: HandlerRegistry = HandlerRegistry::new();
        registry.register(manager);
        let handles = registry.run(bus.clone());

        // Opens the session on lap 1.
        bus.publish(AgentEvent::Raw(RawSample::Physics(MockAdapter::sample_physics(1, 0.0, 0.0))))
            .unwrap();

        // Every physics tick during lap 2 is inside pit exclusion and is
        // dropped before it ever reaches a buffer.
        let mut pit_sample = MockAdapter::sample_physics(2, 1.0, 0.0);
        pit_sample.in_pits = true;
        bus.publish(AgentEvent::Raw(RawSample::Physics(pit_sample))).unwrap();

        // Scoring crosses 1 -> 2 (closing lap 1, which has one physics
        // sample) and then 2 -> 3 (closing lap 2, which has none).
        bus.publish(AgentEvent::Raw(RawSample::Scoring(scoring_for_lap(2)))).unwrap();
        bus.publish(AgentEvent::Raw(RawSample::Scoring(scoring_for_lap(3)))).unwrap();

        let first = tokio::time::timeout(Duration::from_secs(1), validated_rx.recv())
            .await
            .expect("lap 1 should validate")
            .unwrap();
        assert!(matches!(first, AgentEvent::LapValidated(v) if v.lap.lap_number == 1));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(
            validated_rx.try_recv().is_err(),
            "an all-pit lap must never publish LapValidated"
        );
        assert_eq!(stats.laps_discarded.load(Ordering::Relaxed), 1);

        registry.shutdown();
        for h in handles {
            let _ = tokio::time::timeout(Duration::from_secs(1), h).await;
        }
    }
}
