//! Human-in-the-loop approval lifecycle.
//!
//! 1. A caller creates an approval and gets an id back immediately.
//! 2. A timeout is scheduled; if it fires first the approval times out with
//!    an empty response.
//! 3. An external listener submits the remote party's answer.
//! 4. The caller polls (see [`poller::AdaptivePoller`]) until it observes a
//!    terminal state. A terminal result is handed out exactly once.
//!
//! The registry is bounded: creating an approval while `max_concurrent` are
//! pending force-times-out the oldest one.

pub mod poller;

use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::bounded::AgedMap;
use crate::config::ApprovalConfig;
use crate::delivery::Dispatcher;
use crate::errors::CourierError;
use crate::metrics::Metrics;
use crate::models::approval::{
    ApprovalEvent, ApprovalId, ApprovalOption, ApprovalResponse, ApprovalSnapshot,
    ApprovalStatus, PollStatus,
};
use crate::scheduler::{lock, Scheduler, TimerHandle};

pub use poller::{AdaptivePoller, PollerConfig, WaitOutcome};

const EVENT_CAPACITY: usize = 256;
/// Tombstones per unclaimed-result slot.
const TOMBSTONE_FACTOR: usize = 8;

/// One approval request, pending or settled.
#[derive(Debug)]
struct ApprovalRequest {
    id: ApprovalId,
    question: String,
    options: Vec<ApprovalOption>,
    header: Option<String>,
    created_at: DateTime<Utc>,
    timeout: Duration,
    status: ApprovalStatus,
    response: Option<ApprovalResponse>,
    timer: Option<TimerHandle>,
}

impl ApprovalRequest {
    fn snapshot(&self) -> ApprovalSnapshot {
        let expires_at = chrono::Duration::from_std(self.timeout)
            .ok()
            .and_then(|timeout| self.created_at.checked_add_signed(timeout))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        ApprovalSnapshot {
            id: self.id,
            question: self.question.clone(),
            options: self.options.clone(),
            header: self.header.clone(),
            status: self.status,
            created_at: self.created_at,
            expires_at,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

struct Registry {
    /// Live requests, oldest first.
    pending: AgedMap<ApprovalId, ApprovalRequest>,
    /// Resolved or timed-out requests waiting for their one poll.
    settled: AgedMap<ApprovalId, ApprovalRequest>,
    /// Terminal status of results pushed out of `settled`, payload dropped.
    tombstones: AgedMap<ApprovalId, ApprovalStatus>,
}

impl Registry {
    fn settle(&mut self, request: ApprovalRequest, now: Instant) {
        if let Some((dropped, evicted)) = self.settled.insert(request.id, request, now) {
            warn!(
                approval_id = %dropped,
                status = ?evicted.status,
                "unclaimed approval result dropped to make room, keeping its status only"
            );
            self.tombstones.insert(dropped, evicted.status, now);
        }
    }

    fn is_settled(&self, id: &ApprovalId) -> bool {
        self.settled.contains_key(id) || self.tombstones.contains_key(id)
    }
}

struct Shared {
    registry: Mutex<Registry>,
    scheduler: Arc<dyn Scheduler>,
    events: broadcast::Sender<ApprovalEvent>,
    metrics: OnceLock<Arc<Metrics>>,
}

impl Shared {
    /// Timer callback. No-op unless the request is still pending.
    fn expire(&self, id: ApprovalId) {
        {
            let mut registry = lock(&self.registry);
            let Some(mut request) = registry.pending.remove(&id) else {
                return;
            };
            // the handle belongs to the timer that is firing right now
            request.timer = None;
            request.status = ApprovalStatus::TimedOut;
            request.response = Some(ApprovalResponse::default());
            registry.settle(request, self.scheduler.now());
        }
        info!(approval_id = %id, "approval timed out");
        self.publish(ApprovalEvent::TimedOut { id, evicted: false }, "timed_out");
    }

    fn publish(&self, event: ApprovalEvent, outcome: &str) {
        if let Some(metrics) = self.metrics.get() {
            metrics.record_approval(outcome);
        }
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Owns every approval request for one service instance.
pub struct ApprovalManager {
    shared: Arc<Shared>,
    config: ApprovalConfig,
    acknowledger: Option<Arc<Dispatcher>>,
}

impl ApprovalManager {
    pub fn new(config: ApprovalConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        let registry = Registry {
            pending: AgedMap::with_capacity(config.max_concurrent),
            settled: AgedMap::with_capacity(config.max_unclaimed_results),
            tombstones: AgedMap::with_capacity(
                config.max_unclaimed_results.saturating_mul(TOMBSTONE_FACTOR),
            ),
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(registry),
                scheduler,
                events,
                metrics: OnceLock::new(),
            }),
            config,
            acknowledger: None,
        }
    }

    pub fn with_metrics(self, metrics: Arc<Metrics>) -> Self {
        let _ = self.shared.metrics.set(metrics);
        self
    }

    /// Deliver a short acknowledgement through `dispatcher` whenever a
    /// response is accepted.
    pub fn with_acknowledgements(mut self, dispatcher: Arc<Dispatcher>) -> Self {
        self.acknowledger = Some(dispatcher);
        self
    }

    /// Lifecycle events for every approval created after subscribing.
    pub fn subscribe(&self) -> broadcast::Receiver<ApprovalEvent> {
        self.shared.events.subscribe()
    }

    /// Register a new pending approval and start its timeout.
    ///
    /// `timeout` falls back to `approval.timeout_seconds`. Invalid input is
    /// rejected before anything is stored.
    pub fn create_approval(
        &self,
        question: &str,
        options: Vec<ApprovalOption>,
        header: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<ApprovalId, CourierError> {
        let timeout = timeout.unwrap_or_else(|| self.config.default_timeout());
        validate(question, &options, timeout)?;

        let id = ApprovalId::new();
        let request = ApprovalRequest {
            id,
            question: question.trim().to_string(),
            options,
            header: header
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty()),
            created_at: Utc::now(),
            timeout,
            status: ApprovalStatus::Pending,
            response: None,
            timer: None,
        };

        let evicted = {
            let mut registry = lock(&self.shared.registry);
            let now = self.shared.scheduler.now();

            let evicted = registry.pending.insert(id, request, now).map(|(_, mut old)| {
                old.cancel_timer();
                old.status = ApprovalStatus::TimedOut;
                old.response = Some(ApprovalResponse::default());
                let old_id = old.id;
                registry.settle(old, now);
                old_id
            });

            let shared: Weak<Shared> = Arc::downgrade(&self.shared);
            let timer = self.shared.scheduler.schedule_after(
                timeout,
                Box::new(move || {
                    if let Some(shared) = shared.upgrade() {
                        shared.expire(id);
                    }
                }),
            );
            if let Some(request) = registry.pending.get_mut(&id) {
                request.timer = Some(timer);
            }
            evicted
        };

        if let Some(old_id) = evicted {
            warn!(
                approval_id = %old_id,
                max_concurrent = self.config.max_concurrent,
                "approval capacity reached, evicted oldest pending approval"
            );
            self.shared.publish(
                ApprovalEvent::TimedOut {
                    id: old_id,
                    evicted: true,
                },
                "evicted",
            );
        }

        debug!(approval_id = %id, timeout_secs = timeout.as_secs(), "approval created");
        self.shared.publish(ApprovalEvent::Created { id }, "created");
        Ok(id)
    }

    /// Accept the remote party's answer for a pending approval.
    pub fn submit_response(
        &self,
        id: ApprovalId,
        response: ApprovalResponse,
    ) -> Result<(), CourierError> {
        {
            let mut registry = lock(&self.shared.registry);
            let Some(mut request) = registry.pending.remove(&id) else {
                return Err(if registry.is_settled(&id) {
                    CourierError::AlreadyResolved(id)
                } else {
                    CourierError::NotFound(id)
                });
            };
            request.cancel_timer();
            request.status = ApprovalStatus::Resolved;
            request.response = Some(response.clone());
            registry.settle(request, self.shared.scheduler.now());
        }

        info!(approval_id = %id, "approval resolved");
        self.shared.publish(ApprovalEvent::Resolved { id }, "resolved");
        self.acknowledge(id, &response);
        Ok(())
    }

    /// Current state of `id`. A terminal state is returned once, then forgotten.
    pub fn poll_response(&self, id: ApprovalId) -> PollStatus {
        let mut registry = lock(&self.shared.registry);
        if registry.pending.contains_key(&id) {
            return PollStatus::Pending;
        }
        let (status, response) = match registry.settled.remove(&id) {
            Some(request) => (request.status, request.response.unwrap_or_default()),
            None => match registry.tombstones.remove(&id) {
                Some(status) => (status, ApprovalResponse::default()),
                None => return PollStatus::NotFound,
            },
        };
        match status {
            ApprovalStatus::Resolved => PollStatus::Resolved(response),
            ApprovalStatus::TimedOut => PollStatus::TimedOut(response),
            ApprovalStatus::Pending | ApprovalStatus::Cancelled => PollStatus::NotFound,
        }
    }

    /// Withdraw a pending approval. Returns `false` if it was not pending.
    pub fn cancel(&self, id: ApprovalId) -> bool {
        let cancelled = {
            let mut registry = lock(&self.shared.registry);
            registry.pending.remove(&id).map(|mut request| {
                request.cancel_timer();
                request.status = ApprovalStatus::Cancelled;
            })
        };

        if cancelled.is_none() {
            return false;
        }
        info!(approval_id = %id, "approval cancelled");
        self.shared.publish(ApprovalEvent::Cancelled { id }, "cancelled");
        true
    }

    /// Snapshot of a pending approval.
    pub fn get(&self, id: ApprovalId) -> Option<ApprovalSnapshot> {
        lock(&self.shared.registry)
            .pending
            .get(&id)
            .map(ApprovalRequest::snapshot)
    }

    /// Pending approvals, oldest first.
    pub fn list_pending(&self) -> Vec<ApprovalSnapshot> {
        lock(&self.shared.registry)
            .pending
            .iter()
            .map(|(_, request)| request.snapshot())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.shared.registry).pending.len()
    }

    /// Cancel every pending approval and its timer.
    pub fn shutdown(&self) -> usize {
        let drained = {
            let mut registry = lock(&self.shared.registry);
            registry.pending.drain_ordered()
        };
        let count = drained.len();
        for (id, mut request) in drained {
            request.cancel_timer();
            self.shared.publish(ApprovalEvent::Cancelled { id }, "cancelled");
        }
        if count > 0 {
            info!(cancelled = count, "approval manager shut down");
        }
        count
    }

    fn acknowledge(&self, id: ApprovalId, response: &ApprovalResponse) {
        let Some(dispatcher) = self.acknowledger.clone() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(approval_id = %id, "no async runtime, skipping acknowledgement");
            return;
        };
        let text = acknowledgement_text(id, response);
        runtime.spawn(async move {
            if let Err(e) = dispatcher.deliver(&text).await {
                warn!(approval_id = %id, error = %e, "approval acknowledgement not delivered");
            }
        });
    }
}

impl Drop for ApprovalManager {
    fn drop(&mut self) {
        let mut registry = lock(&self.shared.registry);
        for (_, request) in registry.pending.drain_ordered() {
            if let Some(timer) = request.timer {
                timer.cancel();
            }
        }
    }
}

fn validate(question: &str, options: &[ApprovalOption], timeout: Duration) -> Result<(), CourierError> {
    if question.trim().is_empty() {
        return Err(CourierError::validation("question must not be empty"));
    }
    if options.is_empty() {
        return Err(CourierError::validation("at least one option is required"));
    }
    for (i, option) in options.iter().enumerate() {
        if option.label.trim().is_empty() {
            return Err(CourierError::validation(format!("option {} has an empty label", i)));
        }
        if option.description.trim().is_empty() {
            return Err(CourierError::validation(format!(
                "option {} ('{}') has an empty description",
                i, option.label
            )));
        }
    }
    if timeout.is_zero() {
        return Err(CourierError::validation("timeout must be greater than zero"));
    }
    Ok(())
}

fn acknowledgement_text(id: ApprovalId, response: &ApprovalResponse) -> String {
    match (&response.selected_option, &response.custom_input) {
        (Some(option), _) => format!("Response recorded for {}: {}", id, option.label),
        (None, Some(input)) => format!("Response recorded for {}: \"{}\"", id, input),
        (None, None) => format!("Response recorded for {}", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use std::collections::HashMap;

    fn manager(max_concurrent: usize) -> (ManualScheduler, ApprovalManager) {
        let clock = ManualScheduler::new();
        let config = ApprovalConfig {
            timeout_seconds: 5,
            max_concurrent,
            max_unclaimed_results: 16,
        };
        (clock.clone(), ApprovalManager::new(config, Arc::new(clock)))
    }

    fn options() -> Vec<ApprovalOption> {
        vec![
            ApprovalOption::new("Approve", "Run the command"),
            ApprovalOption::new("Deny", "Skip it"),
        ]
    }

    fn create(mgr: &ApprovalManager) -> ApprovalId {
        mgr.create_approval("Run rm -rf build/?", options(), None, None)
            .unwrap()
    }

    #[test]
    fn test_validation_rejects_without_side_effects() {
        let (clock, mgr) = manager(4);
        let bad_option = vec![ApprovalOption::new("Approve", " ")];

        assert!(matches!(
            mgr.create_approval("  ", options(), None, None),
            Err(CourierError::Validation(_))
        ));
        assert!(matches!(
            mgr.create_approval("q", vec![], None, None),
            Err(CourierError::Validation(_))
        ));
        assert!(matches!(
            mgr.create_approval("q", bad_option, None, None),
            Err(CourierError::Validation(_))
        ));
        assert!(matches!(
            mgr.create_approval("q", options(), None, Some(Duration::ZERO)),
            Err(CourierError::Validation(_))
        ));
        assert_eq!(mgr.pending_count(), 0);
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn test_timeout_yields_null_response_once() {
        let (clock, mgr) = manager(4);
        let id = create(&mgr);

        clock.advance(Duration::from_millis(4999));
        assert_eq!(mgr.poll_response(id), PollStatus::Pending);

        clock.advance(Duration::from_millis(1));
        assert_eq!(
            mgr.poll_response(id),
            PollStatus::TimedOut(ApprovalResponse::default())
        );
        assert_eq!(mgr.poll_response(id), PollStatus::NotFound);
    }

    #[test]
    fn test_capacity_evicts_oldest_pending() {
        let (clock, mgr) = manager(2);
        let first = create(&mgr);
        clock.advance(Duration::from_millis(10));
        let second = create(&mgr);
        clock.advance(Duration::from_millis(10));
        let third = create(&mgr);

        assert_eq!(mgr.pending_count(), 2);
        assert_eq!(
            mgr.poll_response(first),
            PollStatus::TimedOut(ApprovalResponse::default())
        );
        assert_eq!(mgr.poll_response(second), PollStatus::Pending);
        assert_eq!(mgr.poll_response(third), PollStatus::Pending);
        // evicted timer was cancelled
        assert_eq!(clock.pending_timers(), 2);
    }

    #[test]
    fn test_submit_resolves_and_cancels_timer() {
        let (clock, mgr) = manager(4);
        let id = create(&mgr);
        let answer = ApprovalResponse::selected(ApprovalOption::new("Approve", "Run the command"));

        mgr.submit_response(id, answer.clone()).unwrap();
        assert_eq!(clock.pending_timers(), 0);

        clock.advance(Duration::from_secs(10));
        assert_eq!(mgr.poll_response(id), PollStatus::Resolved(answer));
        assert_eq!(mgr.poll_response(id), PollStatus::NotFound);
    }

    #[test]
    fn test_submit_twice_or_unknown_is_error() {
        let (_clock, mgr) = manager(4);
        let id = create(&mgr);
        mgr.submit_response(id, ApprovalResponse::custom("yes")).unwrap();

        assert!(matches!(
            mgr.submit_response(id, ApprovalResponse::custom("again")),
            Err(CourierError::AlreadyResolved(e)) if e == id
        ));
        // the first answer wins
        assert_eq!(
            mgr.poll_response(id),
            PollStatus::Resolved(ApprovalResponse::custom("yes"))
        );

        assert!(matches!(
            mgr.submit_response(id, ApprovalResponse::custom("late")),
            Err(CourierError::NotFound(_))
        ));
        assert!(matches!(
            mgr.submit_response(ApprovalId::new(), ApprovalResponse::default()),
            Err(CourierError::NotFound(_))
        ));
    }

    #[test]
    fn test_submit_after_timeout_is_already_resolved() {
        let (clock, mgr) = manager(4);
        let id = create(&mgr);
        clock.advance(Duration::from_secs(5));
        assert!(matches!(
            mgr.submit_response(id, ApprovalResponse::custom("too late")),
            Err(CourierError::AlreadyResolved(_))
        ));
        assert_eq!(
            mgr.poll_response(id),
            PollStatus::TimedOut(ApprovalResponse::default())
        );
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let (clock, mgr) = manager(4);
        let id = create(&mgr);

        assert!(mgr.cancel(id));
        assert!(!mgr.cancel(id));
        assert_eq!(clock.pending_timers(), 0);
        assert_eq!(mgr.poll_response(id), PollStatus::NotFound);

        clock.advance(Duration::from_secs(10));
        assert_eq!(mgr.poll_response(id), PollStatus::NotFound);
    }

    #[test]
    fn test_cancel_after_resolution_is_noop() {
        let (_clock, mgr) = manager(4);
        let id = create(&mgr);
        mgr.submit_response(id, ApprovalResponse::custom("ok")).unwrap();

        assert!(!mgr.cancel(id));
        assert_eq!(
            mgr.poll_response(id),
            PollStatus::Resolved(ApprovalResponse::custom("ok"))
        );
    }

    #[test]
    fn test_each_approval_terminates_exactly_once() {
        let (clock, mgr) = manager(3);
        let mut events = mgr.subscribe();
        let mut ids = Vec::new();

        for round in 0..12 {
            let id = create(&mgr);
            ids.push(id);
            match round % 4 {
                0 => {
                    let _ = mgr.submit_response(id, ApprovalResponse::custom("y"));
                }
                1 => {
                    mgr.cancel(id);
                }
                _ => {}
            }
            // racing operations after the fact must all be no-ops
            let _ = mgr.submit_response(id, ApprovalResponse::custom("dup"));
            mgr.cancel(id);
            clock.advance(Duration::from_millis(1700));
        }
        clock.advance(Duration::from_secs(30));
        for id in &ids {
            mgr.cancel(*id);
            let _ = mgr.submit_response(*id, ApprovalResponse::default());
        }

        let mut terminal: HashMap<ApprovalId, usize> = HashMap::new();
        while let Ok(event) = events.try_recv() {
            if event.is_terminal() {
                *terminal.entry(event.id()).or_default() += 1;
            }
        }
        for id in &ids {
            assert_eq!(terminal.get(id), Some(&1), "approval {} terminal count", id);
        }
        assert_eq!(clock.pending_timers(), 0);
        assert_eq!(mgr.pending_count(), 0);
    }

    #[test]
    fn test_eviction_event_marks_evicted() {
        let (_clock, mgr) = manager(1);
        let mut events = mgr.subscribe();
        let first = create(&mgr);
        let _second = create(&mgr);

        let received: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert!(received.contains(&ApprovalEvent::TimedOut {
            id: first,
            evicted: true
        }));
    }

    #[test]
    fn test_list_pending_in_creation_order() {
        let (_clock, mgr) = manager(4);
        let a = create(&mgr);
        let b = mgr
            .create_approval(
                "Deploy?",
                options(),
                Some("  Production  ".into()),
                Some(Duration::from_secs(60)),
            )
            .unwrap();

        let pending = mgr.list_pending();
        assert_eq!(pending.iter().map(|p| p.id).collect::<Vec<_>>(), vec![a, b]);

        let snap = mgr.get(b).unwrap();
        assert_eq!(snap.header.as_deref(), Some("Production"));
        assert_eq!(snap.status, ApprovalStatus::Pending);
        assert_eq!((snap.expires_at - snap.created_at).num_seconds(), 60);
    }

    #[test]
    fn test_unclaimed_results_are_bounded() {
        let clock = ManualScheduler::new();
        let config = ApprovalConfig {
            timeout_seconds: 1,
            max_concurrent: 10,
            max_unclaimed_results: 2,
        };
        let mgr = ApprovalManager::new(config, Arc::new(clock.clone()));
        let ids: Vec<_> = (0..3).map(|_| create(&mgr)).collect();
        clock.advance(Duration::from_secs(1));

        // the oldest result lost its payload but still reports how it ended
        assert_eq!(
            mgr.poll_response(ids[0]),
            PollStatus::TimedOut(ApprovalResponse::default())
        );
        assert_eq!(mgr.poll_response(ids[0]), PollStatus::NotFound);
        assert!(matches!(mgr.poll_response(ids[1]), PollStatus::TimedOut(_)));
        assert!(matches!(mgr.poll_response(ids[2]), PollStatus::TimedOut(_)));
    }

    #[test]
    fn test_dropped_resolved_result_keeps_its_status() {
        let clock = ManualScheduler::new();
        let config = ApprovalConfig {
            timeout_seconds: 60,
            max_concurrent: 10,
            max_unclaimed_results: 1,
        };
        let mgr = ApprovalManager::new(config, Arc::new(clock));
        let first = create(&mgr);
        let second = create(&mgr);
        mgr.submit_response(first, ApprovalResponse::custom("yes")).unwrap();
        mgr.submit_response(second, ApprovalResponse::custom("no")).unwrap();

        assert!(matches!(
            mgr.submit_response(first, ApprovalResponse::custom("again")),
            Err(CourierError::AlreadyResolved(_))
        ));
        assert_eq!(
            mgr.poll_response(first),
            PollStatus::Resolved(ApprovalResponse::default())
        );
        assert_eq!(
            mgr.poll_response(second),
            PollStatus::Resolved(ApprovalResponse::custom("no"))
        );
    }

    #[test]
    fn test_shutdown_cancels_everything() {
        let (clock, mgr) = manager(4);
        let ids: Vec<_> = (0..3).map(|_| create(&mgr)).collect();

        assert_eq!(mgr.shutdown(), 3);
        assert_eq!(clock.pending_timers(), 0);
        for id in ids {
            assert_eq!(mgr.poll_response(id), PollStatus::NotFound);
        }
    }

    #[test]
    fn test_acknowledgement_text() {
        let id = ApprovalId::new();
        let text = acknowledgement_text(id, &ApprovalResponse::selected(ApprovalOption::new("Deny", "no")));
        assert!(text.ends_with(": Deny"));
        let text = acknowledgement_text(id, &ApprovalResponse::custom("later"));
        assert!(text.ends_with(": \"later\""));
    }

    #[tokio::test]
    async fn test_submit_sends_acknowledgement() {
        use crate::config::RateLimitConfig;
        use crate::delivery::testing::RecordingNotifier;
        use crate::delivery::{RateLimiter, RetryConfig};

        let clock = ManualScheduler::new();
        let scheduler: Arc<dyn Scheduler> = Arc::new(clock.clone());
        let notifier = Arc::new(RecordingNotifier::default());
        let limiter = Arc::new(RateLimiter::new(&RateLimitConfig::default(), scheduler.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            notifier.clone(),
            limiter,
            scheduler.clone(),
            RetryConfig::default(),
        ));
        let mgr = ApprovalManager::new(ApprovalConfig::default(), scheduler)
            .with_acknowledgements(dispatcher);

        let id = create(&mgr);
        mgr.submit_response(id, ApprovalResponse::custom("go")).unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains(&id.to_string()));
    }
}
