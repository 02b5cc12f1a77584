//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for one engine instance.
///
/// Every tunable lives here so that several taxpayers or environments can
/// run side by side with independent settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Wait imposed after a run that did not end on a page with documents.
    pub cooldown: chrono::Duration,
    /// Flush the state file every this many pages.
    pub checkpoint_every: u32,
    /// Retry configuration for remote calls.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a configuration with the Authority's defaults.
    pub fn new() -> Self {
        Self {
            cooldown: chrono::Duration::minutes(61),
            checkpoint_every: 10,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the cooldown window.
    pub fn with_cooldown(mut self, cooldown: chrono::Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets the checkpoint interval in pages. Zero is treated as one.
    pub fn with_checkpoint_every(mut self, pages: u32) -> Self {
        self.checkpoint_every = pages;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub(crate) fn checkpoint_interval(&self) -> u32 {
        self.checkpoint_every.max(1)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
///
/// Delays double from `base_delay` with no jitter and no cap. Every error is
/// retried the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
}

impl RetryConfig {
    /// Creates a new retry configuration with a 5 second base delay.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_secs(5),
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Delay after the failed attempt with 0-based index `attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.cooldown, chrono::Duration::minutes(61));
        assert_eq!(config.checkpoint_every, 10);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay, Duration::from_secs(5));
    }

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_cooldown(chrono::Duration::minutes(5))
            .with_checkpoint_every(0)
            .with_retry(RetryConfig::no_retry());

        assert_eq!(config.cooldown, chrono::Duration::minutes(5));
        assert_eq!(config.checkpoint_interval(), 1);
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(10));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(20));
    }

    #[test]
    fn retry_delay_saturates() {
        let config = RetryConfig::new(100).with_base_delay(Duration::from_secs(1));
        assert_eq!(
            config.delay_for_attempt(40),
            Duration::from_secs(u64::from(u32::MAX))
        );
    }
}
