//! Prometheus metrics for the courier service.
//!
//! Metrics live in a per-instance [`Registry`] rendered by `GET /metrics`.

use prometheus::{opts, Encoder, IntCounter, IntCounterVec, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    approvals_total: IntCounterVec,
    batches_total: IntCounterVec,
    messages_discarded_total: IntCounter,
    send_attempts_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let approvals_total = IntCounterVec::new(
            opts!("courier_approvals_total", "Approval requests by outcome"),
            &["outcome"],
        )?;
        let batches_total = IntCounterVec::new(
            opts!("courier_batches_total", "Batch flushes by result"),
            &["result"],
        )?;
        let messages_discarded_total = IntCounter::with_opts(opts!(
            "courier_messages_discarded_total",
            "Queued messages dropped as stale or on overflow"
        ))?;
        let send_attempts_total = IntCounterVec::new(
            opts!("courier_send_attempts_total", "Notifier send attempts by result"),
            &["result"],
        )?;

        registry.register(Box::new(approvals_total.clone()))?;
        registry.register(Box::new(batches_total.clone()))?;
        registry.register(Box::new(messages_discarded_total.clone()))?;
        registry.register(Box::new(send_attempts_total.clone()))?;

        Ok(Self {
            registry,
            approvals_total,
            batches_total,
            messages_discarded_total,
            send_attempts_total,
        })
    }

    /// `outcome`: created, resolved, timed_out, evicted, cancelled.
    pub fn record_approval(&self, outcome: &str) {
        self.approvals_total.with_label_values(&[outcome]).inc();
    }

    /// `result`: delivered, failed.
    pub fn record_batch(&self, result: &str) {
        self.batches_total.with_label_values(&[result]).inc();
    }

    pub fn record_discarded(&self, count: usize) {
        self.messages_discarded_total.inc_by(count as u64);
    }

    /// `result`: ok, error.
    pub fn record_send_attempt(&self, result: &str) {
        self.send_attempts_total.with_label_values(&[result]).inc();
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
