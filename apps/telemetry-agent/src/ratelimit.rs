//! Fixed-window rate limiter — ported from `original_source/.../utils.py`'s
//! `RateLimiter`. Spec §4.9/§6 intentionally reuses `batch_size` as the call
//! budget; see DESIGN.md for the conflation and the `requests_per_minute`
//! escape hatch.

use std::time::{Duration, Instant};

pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: Vec<Instant>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            max_calls,
            window,
            calls: Vec::new(),
        }
    }

    fn prune(&mut self, now: Instant) {
        self.calls.retain(|&t| now.duration_since(t) < self.window);
    }

    /// Returns true and records the call if under the limit, false
    /// otherwise. Mirrors the Python `can_proceed()`.
    pub fn can_proceed(&mut self) -> bool {
        let now = Instant::now();
        self.prune(now);
        if self.calls.len() < self.max_calls {
            self.calls.push(now);
            true
        } else {
            false
        }
    }

    /// How long the caller must wait before `can_proceed` would return true
    /// again, zero if it already would.
    pub fn time_until_next(&mut self) -> Duration {
        let now = Instant::now();
        self.prune(now);
        if self.calls.len() < self.max_calls {
            return Duration::ZERO;
        }
        let oldest = self.calls.iter().min().copied().unwrap_or(now);
        self.window.saturating_sub(now.duration_since(oldest))
    }
}
