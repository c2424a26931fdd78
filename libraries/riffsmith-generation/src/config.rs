//! Scheduler configuration

use crate::error::{GenerationError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Worker threads allowed to run a generation at once
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Retries after the first failed attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff; attempt `n` waits `n` times this before re-queueing
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Answers slower than this count as failed attempts
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// How long shutdown waits for the supervisor thread
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,

    /// Supervisor wake-up interval when idle
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl SchedulerConfig {
    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff_ms = duration_ms(backoff);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = duration_ms(interval);
        self
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_requests == 0 {
            return Err(GenerationError::Config(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(GenerationError::Config(
                "poll_interval_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// Default values
fn default_max_concurrent_requests() -> usize {
    2
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_join_timeout_ms() -> u64 {
    5000
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            join_timeout_ms: default_join_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: SchedulerConfig =
            serde_json::from_str(r#"{ "max_retries": 5 }"#).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.max_concurrent_requests, 2);
        assert_eq!(config.retry_backoff(), Duration::from_secs(1));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.join_timeout(), Duration::from_secs(5));
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = SchedulerConfig::default().with_max_concurrent_requests(0);
        assert!(matches!(config.validate(), Err(GenerationError::Config(_))));
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[test]
    fn builders_store_milliseconds() {
        let config = SchedulerConfig::default()
            .with_retry_backoff(Duration::from_millis(5))
            .with_poll_interval(Duration::from_millis(10));
        assert_eq!(config.retry_backoff_ms, 5);
        assert_eq!(config.poll_interval_ms, 10);
    }
}
