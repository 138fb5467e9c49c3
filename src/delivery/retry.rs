use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Bounded retry policy for outbound sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per delivery, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_jitter")]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff(),
            max_backoff_ms: default_max_backoff(),
            jitter_ms: default_jitter(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    5000
}

fn default_jitter() -> u64 {
    100
}

/// Delay before the retry that follows failed attempt number `attempt` (1-based).
///
/// `base * 2^(attempt - 1)`, capped at `max_backoff_ms`, plus uniform jitter.
pub fn calculate_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.base_backoff_ms as f64;
    let max = config.max_backoff_ms as f64;

    let exponent = attempt.saturating_sub(1).min(31) as i32;
    let capped_backoff = (base * 2_f64.powi(exponent)).min(max);

    let jitter = if config.jitter_ms > 0 {
        rand::thread_rng().gen_range(0..=config.jitter_ms)
    } else {
        0
    };

    Duration::from_millis((capped_backoff as u64) + jitter)
}
