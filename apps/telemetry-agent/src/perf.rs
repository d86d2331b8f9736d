//! Scoped performance measurement.
//!
//! The original tracker measures a region with a function decorator
//! (`original_source/.../utils.py`'s `performance_monitor`/`PerformanceMonitor`).
//! Decorators don't translate into idiomatic Rust; the equivalent shape here
//! is a guard whose `Drop` emits the measurement, so the measured region is
//! just "the guard's lifetime" (spec Design Notes §9).

use std::time::Instant;

use tracing::debug;

#[must_use = "ScopedTimer emits its measurement on drop; binding it to `_` measures nothing"]
pub struct ScopedTimer {
    name: &'static str,
    start: Instant,
}

impl ScopedTimer {
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        debug!(region = self.name, elapsed_us = elapsed.as_micros(), "scoped timer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn measures_at_least_the_sleep_duration() {
        let start = Instant::now();
        {
            let _timer = ScopedTimer::start("test-region");
            sleep(Duration::from_millis(5));
        }
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
