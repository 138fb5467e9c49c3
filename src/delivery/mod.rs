//! Rate-limited, retried delivery through a [`Notifier`].
//!
//! Every outbound send in the service goes through [`Dispatcher::deliver`]:
//! batch flushes and approval acknowledgements alike. Each attempt takes a
//! token from the shared [`RateLimiter`] first.

pub mod rate_limit;
pub mod retry;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::CourierError;
use crate::metrics::Metrics;
use crate::notification::Notifier;
use crate::scheduler::Scheduler;

pub use rate_limit::{RateLimiter, TokenBucket};
pub use retry::{calculate_backoff, RetryConfig};

pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    limiter: Arc<RateLimiter>,
    scheduler: Arc<dyn Scheduler>,
    retry: RetryConfig,
    metrics: Option<Arc<Metrics>>,
}

impl Dispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        limiter: Arc<RateLimiter>,
        scheduler: Arc<dyn Scheduler>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            notifier,
            limiter,
            scheduler,
            retry,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Send `text`, retrying failed attempts with exponential backoff.
    ///
    /// Gives up after `max_attempts` and returns `SendFailure`; the text is
    /// not kept anywhere for a later retry.
    pub async fn deliver(&self, text: &str) -> Result<(), CourierError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            self.limiter.acquire().await;

            match self.notifier.send(text).await {
                Ok(()) => {
                    self.record("ok");
                    debug!(attempt, "notification delivered");
                    return Ok(());
                }
                Err(e) => {
                    self.record("error");
                    last_error = format!("{:#}", e);
                    if attempt == max_attempts {
                        break;
                    }
                    let delay = calculate_backoff(&self.retry, attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %last_error,
                        "notification send failed, retrying"
                    );
                    self.scheduler.sleep(delay).await;
                }
            }
        }

        warn!(
            attempts = max_attempts,
            error = %last_error,
            "notification delivery failed after all attempts, dropping"
        );
        Err(CourierError::SendFailure {
            attempts: max_attempts,
            reason: last_error,
        })
    }

    fn record(&self, result: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_send_attempt(result);
        }
    }
}
