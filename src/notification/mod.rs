//! Outbound transports.
//!
//! The core only needs `send(text)`; each transport makes exactly one
//! attempt per call. Retry and rate limiting live in [`crate::delivery`].

pub mod slack;
pub mod webhook;

use async_trait::async_trait;

/// A destination for already-rendered notification text.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text` once. An `Err` is treated as retryable by the caller.
    async fn send(&self, text: &str) -> anyhow::Result<()>;
}

/// Writes notifications to the log. Used when no transport is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        tracing::info!(chars = text.chars().count(), "notification (no transport configured):\n{}", text);
        Ok(())
    }
}
