//! Pipeline settings.

use std::time::Duration;

/// Settings for a [`DocSync`](crate::DocSync) pipeline.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Durable watcher name; pipelines sharing a name share a watermark.
    pub watcher_name: String,
    /// Documents per embedder call.
    pub batch_size: usize,
    /// Backoff used by [`DocSync::sync_with_retry`](crate::DocSync::sync_with_retry).
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Settings for the watcher `watcher_name` with a batch size of 100.
    pub fn new(watcher_name: impl Into<String>) -> Self {
        Self {
            watcher_name: watcher_name.into(),
            batch_size: 100,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the batch size. Zero is treated as one.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("embeddocs")
    }
}

/// Exponential backoff between whole-sync attempts.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts in total; 1 disables retrying.
    pub max_attempts: u32,
    /// Wait before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single wait.
    pub delay_cap: Duration,
    /// Growth factor applied per further retry.
    pub multiplier: f64,
}

impl RetryConfig {
    /// `max_attempts` attempts starting at 100ms, doubling, capped at 30s.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(100),
            delay_cap: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    /// A single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            delay_cap: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Sets the wait before the first retry.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the cap on any single wait.
    pub fn with_delay_cap(mut self, cap: Duration) -> Self {
        self.delay_cap = cap;
        self
    }

    /// Sets the growth factor. A negative or NaN factor yields the cap.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Wait before attempt `attempt`, counting the first attempt as 0.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let Some(retry) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };
        let factor = self.multiplier.powi(i32::try_from(retry).unwrap_or(i32::MAX));
        let secs = (self.base_delay.as_secs_f64() * factor).min(self.delay_cap.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(self.delay_cap)
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
        assert_eq!(config.watcher_name, "embeddocs");
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn zero_batch_size_becomes_one() {
        let config = SyncConfig::new("vectors")
            .with_batch_size(0)
            .with_retry(RetryConfig::no_retry());
        assert_eq!(config.watcher_name, "vectors");
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn backoff_doubles() {
        let retry = RetryConfig::new(5).with_base_delay(Duration::from_millis(100));
        let delays: Vec<Duration> = (0..4).map(|a| retry.delay_for_attempt(a)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::ZERO,
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400)
            ]
        );
    }

    #[test]
    fn backoff_is_capped() {
        let retry = RetryConfig::new(10)
            .with_base_delay(Duration::from_secs(1))
            .with_delay_cap(Duration::from_secs(5))
            .with_multiplier(10.0);
        assert_eq!(retry.delay_for_attempt(5), Duration::from_secs(5));
        assert_eq!(RetryConfig::no_retry().delay_for_attempt(3), Duration::ZERO);
    }

    #[test]
    fn bad_multiplier_falls_back_to_cap() {
        let cap = Duration::from_secs(7);
        let negative = RetryConfig::new(4).with_delay_cap(cap).with_multiplier(-3.0);
        assert_eq!(negative.delay_for_attempt(2), cap);
        let nan = RetryConfig::new(4).with_delay_cap(cap).with_multiplier(f64::NAN);
        assert_eq!(nan.delay_for_attempt(2), cap);
    }
}
