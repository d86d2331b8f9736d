//! Remote telemetry API client — the 7-endpoint sequence of spec §4.7/§6.
//! Grounded in `original_source/.../api_client.py`'s `HerbieAPIClient`
//! (`_make_request`'s rate-limit-then-retry loop, required-field validation
//! per endpoint, 4xx≠429 final / 429+5xx retried) and the teacher's
//! `api/client.rs` `#[instrument]`-per-endpoint shape.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::backoff::{BackoffConfig, ExponentialBackoff};
use crate::model::ClosedLap;
use crate::ratelimit::RateLimiter;

use super::models::*;

/// Rate-limit waits/429s get their own retry budget, separate from
/// `retry_attempts` (spec §7: "does not count against `retry_attempts`").
/// Bounded so a backend stuck returning 429 forever can't loop indefinitely.
const RATE_LIMIT_RETRY_CAP: u32 = 8;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rate limit exceeded, waited longer than the configured maximum")]
    RateLimitExceeded,

    #[error("client error {status}: {body}")]
    ClientError { status: u16, body: String },

    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
}

impl ApiError {
    /// Per spec §7: everything except `InvalidRequest`/`ClientError` is
    /// retried (429 and 5xx); `RateLimitExceeded` is retried too but does
    /// not count against `retry_attempts`.
    fn retryable(&self) -> bool {
        matches!(self, ApiError::Transport(_) | ApiError::ServerError { .. } | ApiError::RateLimitExceeded)
    }
}

#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub backoff: BackoffConfig,
    pub requests_per_minute: usize,
    pub limit_wait_max: Duration,
}

/// Request-level counters surfaced through the Supervisor's `Status` view,
/// tracked here since the client is the only thing that sees a request's
/// encoded size and retry count.
#[derive(Debug, Default)]
pub struct ApiClientStats {
    pub bytes_out: AtomicU64,
    pub retry_attempts: AtomicU64,
}

pub struct ApiClient {
    http: Client,
    config: ApiClientConfig,
    rate_limiter: Mutex<RateLimiter>,
    stats: std::sync::Arc<ApiClientStats>,
}

impl ApiClient {
    pub fn new(config: ApiClientConfig) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("reqwest client configuration is valid");
        let rate_limiter = Mutex::new(RateLimiter::new(config.requests_per_minute, Duration::from_secs(60)));
        Self {
            http,
            config,
            rate_limiter,
            stats: std::sync::Arc::new(ApiClientStats::default()),
        }
    }

    pub fn stats(&self) -> std::sync::Arc<ApiClientStats> {
        self.stats.clone()
    }

    async fn wait_for_rate_limit_slot(&self) -> Result<(), ApiError> {
        let mut waited = Duration::ZERO;
        loop {
            let (ok, wait) = {
                let mut limiter = self.rate_limiter.lock().unwrap();
                if limiter.can_proceed() {
                    (true, Duration::ZERO)
                } else {
                    (false, limiter.time_until_next())
                }
            };
            if ok {
                return Ok(());
            }
            if waited + wait > self.config.limit_wait_max {
                return Err(ApiError::RateLimitExceeded);
            }
            let sleep_for = wait.min(self.config.limit_wait_max);
            tokio::time::sleep(sleep_for).await;
            waited += sleep_for;
        }
    }

    #[instrument(skip(self, body))]
    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut backoff = ExponentialBackoff::new(self.config.backoff.clone());

        let encoded = serde_json::to_vec(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.stats.bytes_out.fetch_add(encoded.len() as u64, Ordering::Relaxed);

        let mut attempt = 0;
        let mut rate_limit_attempt = 0;
        loop {
            if let Err(err) = self.wait_for_rate_limit_slot().await {
                // Local rate-limit timeout: wait and retry on its own
                // budget, never the `retry_attempts` one (spec §7).
                if rate_limit_attempt < RATE_LIMIT_RETRY_CAP {
                    rate_limit_attempt += 1;
                    let delay = backoff.next_delay();
                    warn!(error = %err, rate_limit_attempt, delay_ms = delay.as_millis(), "rate limit wait exceeded, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(err);
            }

            debug!(url = %url, attempt, "sending telemetry API request");
            let result = self.http.post(&url).body(encoded.clone()).header("content-type", "application/json").send().await;

            let outcome = match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let envelope: ApiEnvelope<T> = response.json().await?;
                        if envelope.success {
                            return envelope
                                .data
                                .ok_or_else(|| ApiError::InvalidRequest("response missing data".into()));
                        }
                        Err(ApiError::ClientError {
                            status: status.as_u16(),
                            body: envelope.error.unwrap_or_default(),
                        })
                    } else if status == StatusCode::TOO_MANY_REQUESTS {
                        Err(ApiError::RateLimitExceeded)
                    } else if status.is_server_error() {
                        let text = response.text().await.unwrap_or_default();
                        Err(ApiError::ServerError {
                            status: status.as_u16(),
                            body: text,
                        })
                    } else {
                        let text = response.text().await.unwrap_or_default();
                        Err(ApiError::ClientError {
                            status: status.as_u16(),
                            body: text,
                        })
                    }
                }
                Err(err) => Err(ApiError::Transport(err)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                // 429 retries on its own budget too, never `retry_attempts`.
                Err(ApiError::RateLimitExceeded) if rate_limit_attempt < RATE_LIMIT_RETRY_CAP => {
                    rate_limit_attempt += 1;
                    let delay = backoff.next_delay();
                    warn!(rate_limit_attempt, delay_ms = delay.as_millis(), "rate limited (429), retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(ApiError::RateLimitExceeded) => return Err(ApiError::RateLimitExceeded),
                Err(err) if err.retryable() && attempt < self.config.retry_attempts => {
                    attempt += 1;
                    self.stats.retry_attempts.fetch_add(1, Ordering::Relaxed);
                    let delay = backoff.next_delay();
                    warn!(error = %err, attempt, delay_ms = delay.as_millis(), "retrying telemetry API request");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Step 1 (spec §6, §4.7.1): called once per agent run.
    #[instrument(skip(self))]
    pub async fn ensure_session(&self, req: &SessionRequest) -> Result<Uuid, ApiError> {
        if req.user_id.is_empty() || req.track_name.is_empty() {
            return Err(ApiError::InvalidRequest("session requires user_id and track_name".into()));
        }
        let created: SessionCreated = self.post("/api/telemetry/sessions", req).await?;
        info!(session_id = %created.id, "session created");
        Ok(created.id)
    }

    /// Step 2: called once per session.
    #[instrument(skip(self))]
    pub async fn ensure_vehicle(&self, req: &VehicleRequest) -> Result<Uuid, ApiError> {
        if req.driver_name.is_empty() || req.vehicle_name.is_empty() {
            return Err(ApiError::InvalidRequest("vehicle requires driver_name and vehicle_name".into()));
        }
        let created: VehicleCreated = self.post("/api/telemetry/vehicles", req).await?;
        info!(vehicle_id = %created.id, "vehicle created");
        Ok(created.id)
    }

    /// Step 3.a: exactly once per lap, in program order.
    #[instrument(skip(self))]
    pub async fn create_lap(&self, req: &LapRequest) -> Result<Uuid, ApiError> {
        if req.user_id.is_empty() {
            return Err(ApiError::InvalidRequest("lap requires user_id".into()));
        }
        let created: LapCreated = self.post("/api/telemetry/laps", req).await?;
        info!(lap_id = %created.id, lap_number = req.lap_number, "lap created");
        Ok(created.id)
    }

    /// Step 3.b: optional sector times.
    #[instrument(skip(self))]
    pub async fn create_timing(&self, req: &TimingRequest) -> Result<(), ApiError> {
        let _: serde_json::Value = self.post("/api/telemetry/timing", req).await?;
        Ok(())
    }

    /// Step 3.c: one call per buffered batch; the caller supplies batches in
    /// ascending sample-time order per stream.
    #[instrument(skip(self, points), fields(count = points.len()))]
    pub async fn insert_samples(&self, lap_id: Uuid, points: Vec<TelemetryPoint>) -> Result<(), ApiError> {
        if points.is_empty() {
            return Err(ApiError::InvalidRequest("no telemetry points in batch".into()));
        }
        let req = DataRequest {
            lap_id,
            telemetry_points: points,
        };
        let _: serde_json::Value = self.post("/api/telemetry/data", &req).await?;
        Ok(())
    }

    /// Step 3.d: aggregates computed by the caller over the closed lap.
    #[instrument(skip(self, lap))]
    pub async fn create_lap_summary(&self, lap: &ClosedLap) -> Result<(), ApiError> {
        let req = SummaryRequest::from_lap(lap);
        let _: serde_json::Value = self.post("/api/telemetry/summary", &req).await?;
        Ok(())
    }

    /// Step 3.e: optional.
    #[instrument(skip(self))]
    pub async fn create_session_conditions(&self, req: &ConditionsRequest) -> Result<(), ApiError> {
        let _: serde_json::Value = self.post("/api/telemetry/conditions", req).await?;
        Ok(())
    }
}
