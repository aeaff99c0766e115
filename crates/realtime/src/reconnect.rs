//! Exponential-backoff reconnection policy for the notification socket.
//!
//! After an unexpected closure the [`ConnectionManager`](crate::ConnectionManager)
//! schedules retry `n` after [`ReconnectConfig::delay_for`]`(n)`, up to
//! [`ReconnectConfig::max_attempts`] retries. A successful open resets the
//! attempt counter.

use std::time::Duration;

/// Tunable parameters for the backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub base_interval: Duration,
    /// Factor by which the delay grows with each retry.
    pub multiplier: f64,
    /// Retries allowed after a closure before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(3),
            multiplier: 1.5,
            max_attempts: 5,
        }
    }
}

impl ReconnectConfig {
    /// Delay before retry number `attempt` (1-based):
    /// `base_interval * multiplier^(attempt - 1)`.
    ///
    /// Attempt `0` is treated as the first attempt. Delays too large for a
    /// `Duration` saturate at `Duration::MAX`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_interval.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Whether retry number `attempt` (1-based) is within budget.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt >= 1 && attempt <= self.max_attempts
    }

    /// The full schedule of retry delays, in order.
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..=self.max_attempts).map(|attempt| self.delay_for(attempt))
    }
}
