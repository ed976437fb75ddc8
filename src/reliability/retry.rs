use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Cap on the backoff exponent; delay growth stops here.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Exponential backoff for the given attempt (0 = first retry), capped at
    /// `max_delay`, with optional ±50% jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(self.max_attempts).min(32);
        let millis = (self.base_delay.as_millis() as u64).saturating_mul(1u64 << exponent);
        let capped = Duration::from_millis(millis).min(self.max_delay);

        if self.jitter {
            apply_jitter(capped)
        } else {
            capped
        }
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let mut rng = rand::rng();
    let jitter_factor = rng.random_range(0.5..1.5);
    Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64)
}
