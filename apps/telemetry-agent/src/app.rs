//! Supervisor (spec §4.8/§5) — owns the event bus, spawns both samplers as
//! tokio tasks, registers the Lap Lifecycle Manager and Upload Pipeline as
//! handlers, and drives bounded-grace-period shutdown. Grounded in the
//! teacher's `RacingCoachApp` task-orchestration shape (`app.rs`, since
//! removed in this tree) generalized to the dual-rate sampler pair and a
//! pull-based `Status` snapshot the teacher didn't have.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiClientConfig};
use crate::config::Config;
use crate::events::{AgentEvent, AgentEventKind, EventBus, HandlerRegistry};
use crate::lap::{LapLifecycleManager, LifecycleConfig};
use crate::model::LapOutcome;
use crate::sampling::{PhysicsSampler, SamplerStats, ScoringSampler};
use crate::source::SourceAdapter;
use crate::upload::{UploadConfig, UploadPipeline};
use crate::validation::ValidationConfig;

/// How long the Supervisor waits for in-flight work (buffered samples,
/// an upload already underway) to drain after a shutdown signal before
/// forcing handler tasks down regardless (spec §5: "bounded grace period").
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A source read failing for longer than this marks that stream `Degraded`
/// in `Status` rather than tearing the agent down (spec §7).
const SOURCE_FAILURE_WINDOW: Duration = Duration::from_secs(2);

const EVENT_BUS_CAPACITY: usize = 1024;

/// Why `Supervisor::run` returned — `main.rs` maps this to the spec's exit
/// codes (0 for a requested/completed run, 130 for ctrl-c).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Requested,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Starting,
    Running,
    Degraded,
    ShuttingDown,
    Stopped,
}

/// Snapshot of everything the spec's Status view names: per-component
/// counters, last error, and uptime. Cloned out of a `watch` channel on
/// every poll, never locked against the hot path.
#[derive(Debug, Clone)]
pub struct Status {
    pub state: RunState,
    pub uptime: Duration,
    pub physics_samples_emitted: u64,
    pub scoring_samples_emitted: u64,
    pub physics_degraded: bool,
    pub scoring_degraded: bool,
    pub laps_closed: u64,
    pub laps_discarded: u64,
    pub laps_uploaded: u64,
    pub laps_failed: u64,
    pub bytes_out: u64,
    pub retry_attempts: u64,
    pub last_error: Option<String>,
}

impl Status {
    fn starting() -> Self {
        Self {
            state: RunState::Starting,
            uptime: Duration::ZERO,
            physics_samples_emitted: 0,
            scoring_samples_emitted: 0,
            physics_degraded: false,
            scoring_degraded: false,
            laps_closed: 0,
            laps_discarded: 0,
            laps_uploaded: 0,
            laps_failed: 0,
            bytes_out: 0,
            retry_attempts: 0,
            last_error: None,
        }
    }
}

pub struct Supervisor {
    config: Config,
    source: Arc<dyn SourceAdapter>,
    cancel: CancellationToken,
    status_tx: watch::Sender<Status>,
    status_rx: watch::Receiver<Status>,
}

impl Supervisor {
    pub fn new(config: Config, source: Arc<dyn SourceAdapter>) -> Self {
        let (status_tx, status_rx) = watch::channel(Status::starting());
        Self {
            config,
            source,
            cancel: CancellationToken::new(),
            status_tx,
            status_rx,
        }
    }

    /// A cheap clone of the live status receiver; callers poll it from
    /// outside the run loop (a CLI status line, a health endpoint, tests).
    pub fn status(&self) -> watch::Receiver<Status> {
        self.status_rx.clone()
    }

    /// External shutdown request (e.g. a signal handler outside `run`).
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(self) -> Result<ShutdownReason, anyhow::Error> {
        let started_at = Instant::now();
        let bus: EventBus = EventBus::new(EVENT_BUS_CAPACITY);

        let lifecycle_config = LifecycleConfig {
            physics_batch_size: self.config.api.batch_size,
            scoring_batch_size: self.config.api.batch_size / 5,
            physics_flush_interval: Duration::from_secs(1),
            scoring_flush_interval: Duration::from_secs(4),
        };
        let validation_config = ValidationConfig {
            min_points: self.config.validation.min_points,
            min_lap_time_s: self.config.validation.min_lap_time_s,
            max_lap_time_s: self.config.validation.max_lap_time_s,
            max_gap_s: self.config.validation.max_gap_s,
            speed_outlier_threshold_kmh: self.config.validation.speed_outlier_threshold_kmh,
            min_distance_percentage: self.config.validation.min_distance_percentage,
        };
        let lifecycle = LapLifecycleManager::new(lifecycle_config, validation_config);
        let lifecycle_stats = lifecycle.stats();

        let api_client = Arc::new(ApiClient::new(ApiClientConfig {
            base_url: self.config.api.base_url.clone(),
            timeout: self.config.api.timeout,
            retry_attempts: self.config.api.retry_attempts,
            backoff: crate::backoff::BackoffConfig {
                initial_delay: self.config.api.retry_delay,
                max_delay: Duration::from_secs(30),
                multiplier: 2.0,
                jitter: true,
            },
            requests_per_minute: self.config.api.requests_per_minute,
            limit_wait_max: Duration::from_secs(10),
        }));
        let upload = UploadPipeline::new(
            api_client,
            UploadConfig {
                user_id: self.config.api.user_id.clone(),
                session_type: 0,
                track_name: "unknown".to_string(),
                slot_id: 0,
                driver_name: self.config.api.user_id.clone(),
                vehicle_name: "unknown".to_string(),
                physics_batch_size: self.config.api.batch_size,
                scoring_batch_size: self.config.api.batch_size / 5,
                upload_conditions: true,
            },
        );
        let upload_stats = upload.stats();
        let client_stats = upload.client_stats();

        let mut registry: HandlerRegistry = HandlerRegistry::new();
        registry.register(lifecycle);
        registry.register(upload);
        let handler_tasks = registry.run(bus.clone());

        let physics = PhysicsSampler::new(
            self.source.clone(),
            bus.clone(),
            self.cancel.clone(),
            self.config.sampling.physics_period,
            SOURCE_FAILURE_WINDOW,
        );
        let physics_stats = physics.stats();
        let scoring = ScoringSampler::new(
            self.source.clone(),
            bus.clone(),
            self.cancel.clone(),
            self.config.sampling.scoring_poll_period,
            self.config.sampling.scoring_periodic,
            SOURCE_FAILURE_WINDOW,
        );
        let scoring_stats = scoring.stats();

        let physics_task = tokio::spawn(physics.run());
        let scoring_task = tokio::spawn(scoring.run());

        let mut outcome_rx = bus.subscribe(AgentEventKind::LapOutcome);
        let last_error: Arc<std::sync::Mutex<Option<String>>> = Arc::new(std::sync::Mutex::new(None));
        let last_error_writer = last_error.clone();
        let outcome_cancel = self.cancel.clone();
        let outcome_watcher = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = outcome_cancel.cancelled() => break,
                    event = outcome_rx.recv() => {
                        match event {
                            Ok(AgentEvent::LapOutcome(LapOutcome::Failed { lap_number, reason, .. })) => {
                                warn!(lap_number, reason = %reason, "lap upload failed");
                                *last_error_writer.lock().unwrap() = Some(reason);
                            }
                            Ok(_) => {}
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });

        let reason = self
            .publish_status_loop(
                started_at,
                physics_stats,
                scoring_stats,
                lifecycle_stats,
                upload_stats,
                client_stats,
                last_error,
            )
            .await;

        info!("shutdown signal received, stopping samplers");
        self.cancel.cancel();

        let grace = tokio::time::sleep(SHUTDOWN_GRACE);
        tokio::pin!(grace);
        tokio::select! {
            _ = &mut grace => {
                warn!("shutdown grace period elapsed, forcing handlers down");
            }
            result = async {
                let _ = physics_task.await;
                let _ = scoring_task.await;
                let _ = outcome_watcher.await;
            } => {
                let _ = result;
            }
        }

        registry.shutdown();
        for task in handler_tasks {
            let _ = tokio::time::timeout(Duration::from_secs(1), task).await;
        }

        let mut final_status = self.status_rx.borrow().clone();
        final_status.state = RunState::Stopped;
        let _ = self.status_tx.send(final_status);

        info!("supervisor stopped");
        Ok(reason)
    }

    /// Polls component counters into `Status` at a steady cadence until
    /// ctrl-c or an external cancellation arrives, then returns so `run` can
    /// proceed to shutdown.
    async fn publish_status_loop(
        &self,
        started_at: Instant,
        physics_stats: Arc<SamplerStats>,
        scoring_stats: Arc<SamplerStats>,
        lifecycle_stats: Arc<crate::lap::LifecycleStats>,
        upload_stats: Arc<crate::upload::UploadStats>,
        client_stats: Arc<crate::api::ApiClientStats>,
        last_error: Arc<std::sync::Mutex<Option<String>>>,
    ) -> ShutdownReason {
        let mut tick = tokio::time::interval(Duration::from_millis(500));
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("ctrl-c received");
                    return ShutdownReason::Interrupted;
                }
                _ = self.cancel.cancelled() => {
                    return ShutdownReason::Requested;
                }
                _ = tick.tick() => {
                    let physics_degraded = physics_stats.degraded.load(Ordering::Relaxed);
                    let scoring_degraded = scoring_stats.degraded.load(Ordering::Relaxed);
                    let state = if physics_degraded || scoring_degraded {
                        RunState::Degraded
                    } else {
                        RunState::Running
                    };
                    let status = Status {
                        state,
                        uptime: started_at.elapsed(),
                        physics_samples_emitted: physics_stats.samples_emitted.load(Ordering::Relaxed),
                        scoring_samples_emitted: scoring_stats.samples_emitted.load(Ordering::Relaxed),
                        physics_degraded,
                        scoring_degraded,
                        laps_closed: lifecycle_stats.laps_closed.load(Ordering::Relaxed),
                        laps_discarded: lifecycle_stats.laps_discarded.load(Ordering::Relaxed),
                        laps_uploaded: upload_stats.laps_uploaded.load(Ordering::Relaxed),
                        laps_failed: upload_stats.laps_failed.load(Ordering::Relaxed),
                        bytes_out: client_stats.bytes_out.load(Ordering::Relaxed),
                        retry_attempts: client_stats.retry_attempts.load(Ordering::Relaxed),
                        last_error: last_error.lock().unwrap().clone(),
                    };
                    let _ = self.status_tx.send(status);
                }
            }
        }
    }
}
