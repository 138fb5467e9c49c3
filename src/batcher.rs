//! Time-windowed batching of outbound notification text.
//!
//! Messages accumulate in a bounded queue and go out as one combined send
//! per flush. A flush happens when the window timer fires, when a
//! high-priority message arrives, when the queue fills up, or on demand.
//! Messages that sat in the queue for two windows are dropped unsent.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::bounded::AgedMap;
use crate::config::BatchingConfig;
use crate::delivery::Dispatcher;
use crate::errors::CourierError;
use crate::metrics::Metrics;
use crate::models::message::{FlushReport, Priority, QueuedMessage};
use crate::scheduler::{lock, Scheduler};

struct BatchQueue {
    entries: AgedMap<u64, QueuedMessage>,
    next_id: u64,
}

impl BatchQueue {
    /// Append; returns the oldest message if it had to make room.
    fn push(&mut self, text: String, at: Instant) -> Option<QueuedMessage> {
        let id = self.next_id;
        self.next_id += 1;
        let message = QueuedMessage {
            text,
            enqueued_at: at,
        };
        self.entries.insert(id, message, at).map(|(_, evicted)| evicted)
    }
}

pub struct MessageBatcher {
    config: BatchingConfig,
    scheduler: Arc<dyn Scheduler>,
    dispatcher: Arc<Dispatcher>,
    queue: Mutex<BatchQueue>,
    /// Serializes drain + delivery so batches leave in enqueue order.
    flush_gate: tokio::sync::Mutex<()>,
    window_task: Mutex<Option<JoinHandle<()>>>,
    metrics: Option<Arc<Metrics>>,
}

impl MessageBatcher {
    pub fn new(
        config: BatchingConfig,
        scheduler: Arc<dyn Scheduler>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let queue = BatchQueue {
            entries: AgedMap::with_capacity(config.max_queue_size),
            next_id: 0,
        };
        Self {
            config,
            scheduler,
            dispatcher,
            queue: Mutex::new(queue),
            flush_gate: tokio::sync::Mutex::new(()),
            window_task: Mutex::new(None),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Messages currently queued.
    pub fn len(&self) -> usize {
        lock(&self.queue).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue `text` for the next batch.
    ///
    /// High-priority text flushes the whole queue immediately. A normal add
    /// that fills the queue to `max_queue_size` flushes it before returning.
    pub async fn add(&self, text: impl Into<String>, priority: Priority) -> Result<(), CourierError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(CourierError::validation("message text must not be empty"));
        }

        let (len, overflow) = {
            let mut queue = lock(&self.queue);
            let overflow = queue.push(text, self.scheduler.now());
            (queue.entries.len(), overflow)
        };

        if let Some(dropped) = overflow {
            warn!(
                queued_ms = self
                    .scheduler
                    .now()
                    .saturating_duration_since(dropped.enqueued_at)
                    .as_millis() as u64,
                "batch queue full while a flush is in progress, dropped oldest message"
            );
            self.record_discarded(1);
        }

        if priority == Priority::High {
            debug!(queued = len, "high-priority message, flushing immediately");
            self.flush().await?;
        } else if len >= self.config.max_queue_size {
            debug!(queued = len, "batch queue reached max size, auto-flushing");
            self.flush().await?;
        }
        Ok(())
    }

    /// Drop stale messages, then send the rest as one combined message.
    ///
    /// No-op on an empty queue. On delivery failure the batch is dropped and
    /// the error returned.
    pub async fn flush(&self) -> Result<FlushReport, CourierError> {
        let _gate = self.flush_gate.lock().await;

        let (stale, batch) = {
            let mut queue = lock(&self.queue);
            let stale = queue
                .entries
                .drain_aged(self.scheduler.now(), self.config.stale_after());
            (stale.len(), queue.entries.drain_ordered())
        };

        if stale > 0 {
            warn!(
                discarded = stale,
                max_age_ms = self.config.stale_after().as_millis() as u64,
                "discarding stale queued messages"
            );
            self.record_discarded(stale);
        }

        if batch.is_empty() {
            return Ok(FlushReport {
                delivered: 0,
                discarded: stale,
            });
        }

        let count = batch.len();
        let text = batch
            .iter()
            .map(|(_, message)| message.text.as_str())
            .collect::<Vec<_>>()
            .join(&self.config.separator);

        match self.dispatcher.deliver(&text).await {
            Ok(()) => {
                debug!(messages = count, "batch delivered");
                self.record_batch("delivered");
                Ok(FlushReport {
                    delivered: count,
                    discarded: stale,
                })
            }
            Err(e) => {
                error!(messages = count, error = %e, "batch delivery failed, dropping batch");
                self.record_batch("failed");
                Err(e)
            }
        }
    }

    /// Start the recurring window flush. Replaces any running timer.
    ///
    /// The task holds only a weak reference and stops once the batcher is
    /// dropped.
    pub fn start_window_timer(self: &Arc<Self>) {
        let batcher = Arc::downgrade(self);
        let scheduler = self.scheduler.clone();
        let window = self.config.window();

        let task = tokio::spawn(async move {
            loop {
                scheduler.sleep(window).await;
                let Some(batcher) = batcher.upgrade() else {
                    break;
                };
                if let Err(e) = batcher.flush().await {
                    warn!(error = %e, "window flush failed");
                }
            }
        });

        if let Some(previous) = lock(&self.window_task).replace(task) {
            previous.abort();
        }
    }

    /// Stop the window timer and flush whatever is still queued.
    pub async fn shutdown(&self) -> Result<FlushReport, CourierError> {
        if let Some(task) = lock(&self.window_task).take() {
            task.abort();
        }
        self.flush().await
    }

    fn record_discarded(&self, count: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.record_discarded(count);
        }
    }

    fn record_batch(&self, result: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_batch(result);
        }
    }
}

impl Drop for MessageBatcher {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.window_task).take() {
            task.abort();
        }
    }
}
