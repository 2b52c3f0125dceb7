use crate::retry::RetryPolicy;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct A2AConfig {
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
    pub user_agent: String,
}

impl Default for A2AConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            user_agent: format!("bench-bridge/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl A2AConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout.is_zero() {
            return Err("Connect timeout must be greater than 0".to_string());
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err("Base retry delay cannot exceed the maximum delay".to_string());
        }

        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err("Jitter factor must be between 0.0 and 1.0".to_string());
        }

        if self.user_agent.is_empty() {
            return Err("User agent cannot be empty".to_string());
        }

        Ok(())
    }
}
