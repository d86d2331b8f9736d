//! Property tests for the Rate Limiter (spec §4.9, property 9) and the Lap
//! Validator (spec §4.5), in the `proptest!` style used elsewhere in this
//! corpus for telemetry invariants.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use telemetry_agent::backoff::{BackoffConfig, ExponentialBackoff};
use telemetry_agent::model::ClosedLap;
use telemetry_agent::ratelimit::RateLimiter;
use telemetry_agent::source::MockAdapter;
use telemetry_agent::validation::{validate_lap, ValidationConfig, ValidationOutcome};
use uuid::Uuid;

fn lap_with_points(n: usize, lap_time_s: f64) -> ClosedLap {
    let physics: Vec<_> = (0..n)
        .map(|i| {
            let mut p = MockAdapter::sample_physics(1, i as f64 * (lap_time_s / n.max(1) as f64), i as f32 / n as f32);
            p.speed_kmh = 180.0;
            p
        })
        .collect();
    ClosedLap {
        lap_id: Uuid::new_v4(),
        session_id: Uuid::new_v4(),
        lap_number: 1,
        lap_time_s,
        physics: Arc::new(physics),
        scoring: Arc::new(vec![]),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property 9: across any burst of attempts issued back-to-back (well
    /// under the 60s window), the number that `can_proceed()` admits never
    /// exceeds the configured call budget.
    #[test]
    fn rate_limiter_never_admits_more_than_its_budget(
        max_calls in 1usize..50,
        attempts in 0usize..200,
    ) {
        let mut limiter = RateLimiter::new(max_calls, Duration::from_secs(60));
        let admitted = (0..attempts).filter(|_| limiter.can_proceed()).count();
        prop_assert!(admitted <= max_calls);
    }

    /// A lap whose point count, duration, and speeds all sit comfortably
    /// inside spec §4.5's bounds always validates, regardless of the exact
    /// values chosen within range (generalizes the fixed-case
    /// `accepts_a_well_formed_lap` unit test in `validation/mod.rs`).
    #[test]
    fn well_formed_laps_always_validate(
        n in 200usize..2000,
        lap_time_s in 30.5f64..100.0,
    ) {
        // n is kept well above lap_time_s so the per-sample gap
        // (lap_time_s / n) never approaches the 2s max_gap_s bound.
        let lap = lap_with_points(n, lap_time_s);
        let config = ValidationConfig::default();
        let report = validate_lap(&lap, &config);
        prop_assert_eq!(report.outcome, ValidationOutcome::Valid);
    }

    /// An unjittered backoff's delay is monotonically non-decreasing in the
    /// attempt index (up to the configured cap), regardless of the starting
    /// delay or multiplier chosen.
    #[test]
    fn unjittered_backoff_never_shrinks(
        initial_ms in 1u64..1000,
        multiplier in 1.0f64..5.0,
        rounds in 1usize..10,
    ) {
        let config = BackoffConfig {
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_secs(3600),
            multiplier,
            jitter: false,
        };
        let mut backoff = ExponentialBackoff::new(config);
        let mut previous = Duration::ZERO;
        for _ in 0..rounds {
            let delay = backoff.next_delay();
            prop_assert!(delay >= previous);
            previous = delay;
        }
    }
}
