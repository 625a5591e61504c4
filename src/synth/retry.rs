use std::time::Duration;

use crate::config::RetryConfig;

/// How many times a synthesis request is attempted and how long to wait between tries.
///
/// Attempt numbers are 1-based. The first attempt carries the full voice
/// controls; every later attempt falls back to the plain gender voice.
pub trait RetryPolicy: Send + Sync {
    fn max_attempts(&self) -> u32;

    /// Delay before `attempt` (only consulted for attempt >= 2)
    fn delay_before(&self, attempt: u32) -> Duration;
}

/// Fixed attempt count with a constant delay
#[derive(Debug, Clone)]
pub struct FixedRetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl FixedRetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.backoff_ms))
    }
}

impl Default for FixedRetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::ZERO)
    }
}

impl RetryPolicy for FixedRetryPolicy {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn delay_before(&self, _attempt: u32) -> Duration {
        self.backoff
    }
}

/// Delay doubling after every failed attempt, capped at `max_delay`
#[derive(Debug, Clone)]
pub struct ExponentialRetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy for ExponentialRetryPolicy {
    fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(2).min(16);
        self.initial_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay)
    }
}
