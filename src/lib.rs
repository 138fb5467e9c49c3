//! Courier: outbound notification coordination.
//!
//! Human-in-the-loop approvals with timeouts, windowed message batching, and
//! rate-limited retried delivery through a pluggable [`notification::Notifier`].

use std::sync::Arc;

pub mod api;
pub mod approval;
pub mod batcher;
pub mod bounded;
pub mod config;
pub mod delivery;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod notification;
pub mod scheduler;

use approval::ApprovalManager;
use batcher::MessageBatcher;
use delivery::{Dispatcher, RateLimiter};
use metrics::Metrics;
use notification::Notifier;
use scheduler::Scheduler;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub approvals: ApprovalManager,
    pub batcher: Arc<MessageBatcher>,
    pub dispatcher: Arc<Dispatcher>,
    pub scheduler: Arc<dyn Scheduler>,
    pub metrics: Arc<Metrics>,
    pub config: config::Config,
}

impl AppState {
    /// Wire every component around one notifier and one scheduler.
    ///
    /// Approval acknowledgements and batch flushes share the same dispatcher,
    /// so both draw from the same rate limit.
    pub fn build(
        config: config::Config,
        notifier: Arc<dyn Notifier>,
        scheduler: Arc<dyn Scheduler>,
    ) -> anyhow::Result<Self> {
        let metrics = Arc::new(Metrics::new()?);
        let limiter = Arc::new(RateLimiter::new(
            &config.courier.rate_limiting,
            scheduler.clone(),
        ));
        let dispatcher = Arc::new(
            Dispatcher::new(
                notifier,
                limiter,
                scheduler.clone(),
                config.courier.delivery.clone(),
            )
            .with_metrics(metrics.clone()),
        );
        let approvals = ApprovalManager::new(config.courier.approval.clone(), scheduler.clone())
            .with_acknowledgements(dispatcher.clone())
            .with_metrics(metrics.clone());
        let batcher = Arc::new(
            MessageBatcher::new(
                config.courier.batching.clone(),
                scheduler.clone(),
                dispatcher.clone(),
            )
            .with_metrics(metrics.clone()),
        );

        Ok(Self {
            approvals,
            batcher,
            dispatcher,
            scheduler,
            metrics,
            config,
        })
    }
}
