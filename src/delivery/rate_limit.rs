use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::errors::CourierError;
use crate::scheduler::{lock, Scheduler};

/// Absorbs float drift so a wait of exactly the computed length is enough.
const EPSILON: f64 = 1e-9;

/// Token bucket. Tokens stay within `[0, capacity]`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Starts full.
    pub fn new(burst_size: u32, messages_per_minute: u32, now: Instant) -> Self {
        let capacity = f64::from(burst_size.max(1));
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: f64::from(messages_per_minute.max(1)) / 60.0,
            last_refill: now,
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn refill(&mut self, now: Instant) {
        if now <= self.last_refill {
            return;
        }
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Take one token, or report how long until one is available.
    pub fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens + EPSILON >= 1.0 {
            self.tokens = (self.tokens - 1.0).max(0.0);
            return Ok(());
        }
        let missing = 1.0 - self.tokens;
        let micros = (missing / self.refill_per_sec * 1_000_000.0).ceil() as u64;
        Err(Duration::from_micros(micros.max(1)))
    }
}

/// Admission control in front of every outbound send.
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    scheduler: Arc<dyn Scheduler>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        let bucket = TokenBucket::new(
            config.burst_size,
            config.messages_per_minute,
            scheduler.now(),
        );
        Self {
            bucket: Mutex::new(bucket),
            scheduler,
        }
    }

    /// Take a token, waiting on the scheduler until one is due.
    pub async fn acquire(&self) {
        loop {
            let wait = match self.take() {
                Ok(()) => return,
                Err(wait) => wait,
            };
            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limiter: waiting for token");
            self.scheduler.sleep(wait).await;
        }
    }

    /// Take a token without waiting.
    pub fn try_acquire(&self) -> Result<(), CourierError> {
        self.take()
            .map_err(|retry_after| CourierError::WouldBlock { retry_after })
    }

    /// Tokens currently available (after refill).
    pub fn available(&self) -> f64 {
        let mut bucket = lock(&self.bucket);
        bucket.refill(self.scheduler.now());
        bucket.tokens()
    }

    pub fn capacity(&self) -> f64 {
        lock(&self.bucket).capacity()
    }

    fn take(&self) -> Result<(), Duration> {
        let now = self.scheduler.now();
        lock(&self.bucket).try_take(now)
    }
}
