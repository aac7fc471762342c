//! Reconnect delays for the action subscriber

use std::time::Duration;

use rand::Rng;

/// Exponential backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor per failed attempt
    pub multiplier: f64,
    /// Fraction of the delay randomized in either direction (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Delay calculator; grows per consecutive failure, reset after a healthy session
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay to wait before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.attempt.min(32) as i32;
        self.attempt = self.attempt.saturating_add(1);

        let max_ms = self.config.max_delay.as_millis() as f64;
        let base_ms = self.config.initial_delay.as_millis() as f64
            * self.config.multiplier.powi(exponent);
        let capped_ms = base_ms.min(max_ms);

        let jitter_range = capped_ms * self.config.jitter_factor.clamp(0.0, 1.0);
        let delay_ms = if jitter_range > 0.0 {
            capped_ms + rand::rng().random_range(-jitter_range..=jitter_range)
        } else {
            capped_ms
        };

        Duration::from_millis(delay_ms.clamp(1.0, max_ms.max(1.0)) as u64)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Consecutive failures since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
