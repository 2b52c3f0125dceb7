use rand::Rng;
use std::time::Duration;

/// Backoff schedule applied between transport attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay for exponential backoff (in milliseconds)
    pub max_delay_ms: u64,
    /// Jitter factor for randomizing retry delays (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 8000,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            ..Default::default()
        }
    }

    /// No waiting between attempts. Useful for tests.
    pub fn immediate() -> Self {
        Self {
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter_factor: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt` (zero-based), exponential with jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_delay = Duration::from_millis(self.base_delay_ms);
        let exponential_delay = base_delay.saturating_mul(2_u32.saturating_pow(attempt));
        let delay = exponential_delay.min(Duration::from_millis(self.max_delay_ms));

        if self.jitter_factor > 0.0 && !delay.is_zero() {
            let jitter = rand::thread_rng().gen_range(0.0..=self.jitter_factor);
            let jitter_ms = (delay.as_millis() as f64 * jitter) as u64;
            delay + Duration::from_millis(jitter_ms)
        } else {
            delay
        }
    }
}
