//! Physics Sampler (spec §4.2) — fixed ~90Hz cadence, never aggregates,
//! never runs ahead. Grounded in the teacher's `UpdateRate::Native`
//! subscription idiom (`telemetry/source.rs`) and the original tracker's
//! fixed `~0.011s` tick (`snapshot_collector.py`).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::events::{AgentEvent, EventBus};
use crate::model::RawSample;
use crate::source::SourceAdapter;

/// Counters and degradation flag surfaced through the Supervisor's `Status`
/// view (spec §4.8/§7: persistent `SourceUnavailable` marks the agent
/// `Degraded` rather than exiting).
#[derive(Debug, Default)]
pub struct SamplerStats {
    pub samples_emitted: AtomicU64,
    pub degraded: AtomicBool,
}

pub struct PhysicsSampler {
    source: Arc<dyn SourceAdapter>,
    bus: EventBus,
    cancel: CancellationToken,
    tick_period: Duration,
    source_failure_window: Duration,
    stats: Arc<SamplerStats>,
}

impl PhysicsSampler {
    pub fn new(
        source: Arc<dyn SourceAdapter>,
        bus: EventBus,
        cancel: CancellationToken,
        tick_period: Duration,
        source_failure_window: Duration,
    ) -> Self {
        Self {
            source,
            bus,
            cancel,
            tick_period,
            source_failure_window,
            stats: Arc::new(SamplerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SamplerStats> {
        self.stats.clone()
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.tick_period);
        // Ticks must never be allowed to pile up and fire back-to-back —
        // the sampler reads whatever is current, it never catches up.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_success = Instant::now();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("physics sampler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if self.source.is_paused() {
                        continue;
                    }
                    match self.source.read_physics() {
                        Ok(sample) => {
                            last_success = Instant::now();
                            if self.stats.degraded.swap(false, Ordering::Relaxed) {
                                debug!("physics source recovered");
                            }
                            self.stats.samples_emitted.fetch_add(1, Ordering::Relaxed);
                            if self.bus.publish(AgentEvent::Raw(RawSample::Physics(sample))).is_err() {
                                warn!("no subscribers for physics samples");
                            }
                        }
                        Err(err) => {
                            debug!(error = %err, "physics read failed, skipping tick");
                            if last_success.elapsed() > self.source_failure_window
                                && !self.stats.degraded.swap(true, Ordering::Relaxed)
                            {
                                error!(error = %err, "physics source unavailable beyond failure window");
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AgentEventKind;
    use crate::source::MockAdapter;
    use std::sync::Arc as StdArc;

    #[tokio::test(start_paused = true)]
    async fn stops_promptly_on_cancellation() {
        let bus = EventBus::new(16);
        let _rx = bus.subscribe(AgentEventKind::Raw);
        let adapter: StdArc<dyn SourceAdapter> = StdArc::new(MockAdapter::new());
        let cancel = CancellationToken::new();
        let sampler = PhysicsSampler::new(
            adapter,
            bus,
            cancel.clone(),
            Duration::from_millis(11),
            Duration::from_secs(2),
        );

        let handle = tokio::spawn(sampler.run());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sampler task should exit")
            .unwrap();
    }
}
