//! Exponential backoff with jitter — ported field-for-field from
//! `original_source/.../utils.py`'s `ExponentialBackoff`.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Stateful backoff counter. `next_delay` both returns the delay to wait and
/// advances internal state for the following call, matching the Python
/// `get_delay()` side effect.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    current_delay: Duration,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        let current_delay = config.initial_delay;
        Self {
            config,
            current_delay,
            attempt: 0,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay for the next retry attempt, jittered to 50-100% of the
    /// un-jittered value, then advances `current_delay` by `multiplier`.
    pub fn next_delay(&mut self) -> Duration {
        let capped = self.current_delay.min(self.config.max_delay);
        let delay = if self.config.jitter {
            let factor = 0.5 + rand::thread_rng().gen_range(0.0..0.5);
            capped.mul_f64(factor)
        } else {
            capped
        };

        // current_delay is allowed to grow past max_delay (matching the
        // Python original); next_delay() clamps it at read time. Clamp the
        // stored value at a generous ceiling so repeated retries can't
        // eventually overflow Duration.
        self.current_delay = self
            .current_delay
            .mul_f64(self.config.multiplier)
            .min(Duration::from_secs(3600));
        self.attempt += 1;

        delay
    }

    pub fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_with_multiplier_when_unjittered() {
        let config = BackoffConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: false,
        };
        let mut backoff = ExponentialBackoff::new(config);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        assert_eq!(backoff.attempt(), 3);
    }

    #[test]
    fn delay_never_exceeds_max() {
        let config = BackoffConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            multiplier: 10.0,
            jitter: false,
        };
        let mut backoff = ExponentialBackoff::new(config);
        for _ in 0..5 {
            assert!(backoff.next_delay() <= Duration::from_secs(5));
        }
    }

    #[test]
    fn jittered_delay_stays_within_50_to_100_percent() {
        let config = BackoffConfig {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
            multiplier: 1.0,
            jitter: true,
        };
        let mut backoff = ExponentialBackoff::new(config);
        for _ in 0..50 {
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_secs(5));
            assert!(delay <= Duration::from_secs(10));
        }
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut backoff = ExponentialBackoff::new(BackoffConfig::default());
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
    }
}
