use std::time::Instant;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// Outbound text waiting in the batch queue.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub text: String,
    pub enqueued_at: Instant,
}

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Messages delivered in the combined send.
    pub delivered: usize,
    /// Stale messages dropped without sending.
    pub discarded: usize,
}
