//! Scoring Sampler (spec §4.3) — polled faster than it emits, change-triggered
//! with a periodic fallback. Grounded in
//! `original_source/.../snapshot_collector.py`'s `_collect_scoring_snapshot`
//! and `ScoringState` (fixed priority: sector > lap > position > periodic).

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::events::{AgentEvent, EventBus};
use crate::model::{RawSample, ScoringSnapshot, ScoringTrigger};
use crate::sampling::physics::SamplerStats;
use crate::source::SourceAdapter;

/// Last-seen baselines the trigger check compares each poll against,
/// mirroring `snapshot_collector.py`'s `ScoringState` dataclass. Reinstalled
/// fresh at every lap rotation (by the Lap Lifecycle Manager dropping the
/// sampler's last-emit clock via a fresh `ScoringSampler`-internal reset is
/// not needed here: the trigger state lives with the sampler, and a fresh
/// lap's first poll naturally differs from the stale baseline of the
/// previous lap, firing at worst on `periodic`).
struct ScoringState {
    last_sector: i32,
    last_lap_time: f64,
    last_position: i32,
    last_emit: tokio::time::Instant,
}

impl ScoringState {
    fn fresh() -> Self {
        Self {
            last_sector: -1,
            last_lap_time: -1.0,
            last_position: -1,
            last_emit: tokio::time::Instant::now(),
        }
    }
}

pub struct ScoringSampler {
    source: Arc<dyn SourceAdapter>,
    bus: EventBus,
    cancel: CancellationToken,
    poll_period: Duration,
    periodic_deadline: Duration,
    source_failure_window: Duration,
    stats: Arc<SamplerStats>,
}

impl ScoringSampler {
    pub fn new(
        source: Arc<dyn SourceAdapter>,
        bus: EventBus,
        cancel: CancellationToken,
        poll_period: Duration,
        periodic_deadline: Duration,
        source_failure_window: Duration,
    ) -> Self {
        Self {
            source,
            bus,
            cancel,
            poll_period,
            periodic_deadline,
            source_failure_window,
            stats: Arc::new(SamplerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SamplerStats> {
        self.stats.clone()
    }

    /// Fixed evaluation order per spec §4.3: the first matching condition
    /// wins. Returns `None` if no trigger fired (deadline not reached).
    fn trigger_for(snapshot: &ScoringSnapshot, state: &ScoringState, periodic_deadline: Duration) -> Option<ScoringTrigger> {
        if snapshot.sector != state.last_sector {
            return Some(ScoringTrigger::SectorComplete);
        }
        if snapshot.last_lap_time != state.last_lap_time && snapshot.last_lap_time > 0.0 {
            return Some(ScoringTrigger::LapComplete);
        }
        if snapshot.position != state.last_position {
            return Some(ScoringTrigger::PositionChange);
        }
        if state.last_emit.elapsed() >= periodic_deadline {
            return Some(ScoringTrigger::Periodic);
        }
        None
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.poll_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut state = ScoringState::fresh();
        let mut last_lap_number = i32::MIN;
        let mut last_success = StdInstant::now();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("scoring sampler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if self.source.is_paused() {
                        continue;
                    }
                    match self.source.read_scoring() {
                        Ok(mut snapshot) => {
                            last_success = StdInstant::now();
                            if self.stats.degraded.swap(false, Ordering::Relaxed) {
                                debug!("scoring source recovered");
                            }

                            // A lap rotation installs a fresh baseline so the
                            // first snapshot of the new lap always fires.
                            if snapshot.lap_number != last_lap_number {
                                state = ScoringState::fresh();
                                last_lap_number = snapshot.lap_number;
                            }

                            if let Some(trigger) = Self::trigger_for(&snapshot, &state, self.periodic_deadline) {
                                snapshot.update_trigger = trigger;
                                state.last_sector = snapshot.sector;
                                state.last_lap_time = snapshot.last_lap_time;
                                state.last_position = snapshot.position;
                                state.last_emit = tokio::time::Instant::now();

                                self.stats.samples_emitted.fetch_add(1, Ordering::Relaxed);
                                if self.bus.publish(AgentEvent::Raw(RawSample::Scoring(snapshot))).is_err() {
                                    warn!("no subscribers for scoring snapshots");
                                }
                            }
                        }
                        Err(err) => {
                            debug!(error = %err, "scoring read failed, skipping poll");
                            if last_success.elapsed() > self.source_failure_window
                                && !self.stats.degraded.swap(true, Ordering::Relaxed)
                            {
                                error!(error = %err, "scoring source unavailable beyond failure window");
                            }
                        }
                    }
                }
            }
        }
    }
}
