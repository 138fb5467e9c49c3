//! Adaptive polling for approval responses.
//!
//! The remote answer arrives out-of-band and usually slowly, so checks start
//! fast and back off geometrically while the approval stays pending.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use super::ApprovalManager;
use crate::models::approval::{ApprovalId, ApprovalResponse, PollStatus};
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(1000),
            multiplier: 2,
        }
    }
}

/// How a wait ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "response", rename_all = "snake_case")]
pub enum WaitOutcome {
    Resolved(ApprovalResponse),
    TimedOut(ApprovalResponse),
    /// The approval is gone: cancelled, or its result was claimed elsewhere.
    Cancelled,
    /// The caller's interrupt fired before a terminal state was seen.
    Interrupted,
}

pub struct AdaptivePoller {
    scheduler: Arc<dyn Scheduler>,
    config: PollerConfig,
    current: Duration,
}

impl AdaptivePoller {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_config(scheduler, PollerConfig::default())
    }

    pub fn with_config(scheduler: Arc<dyn Scheduler>, config: PollerConfig) -> Self {
        let config = PollerConfig {
            max_interval: config.max_interval.max(config.min_interval),
            multiplier: config.multiplier.max(1),
            ..config
        };
        Self {
            scheduler,
            current: config.min_interval,
            config,
        }
    }

    /// Delay the next check would use.
    pub fn current_interval(&self) -> Duration {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.config.min_interval;
    }

    /// Return the delay to sleep now and grow the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .saturating_mul(self.config.multiplier)
            .min(self.config.max_interval);
        delay
    }

    /// Poll `id` until it reaches a terminal state or `interrupt` completes.
    ///
    /// Every call starts over at the minimum interval.
    pub async fn wait<F>(
        &mut self,
        manager: &ApprovalManager,
        id: ApprovalId,
        interrupt: F,
    ) -> WaitOutcome
    where
        F: Future<Output = ()>,
    {
        self.reset();
        tokio::pin!(interrupt);
        let mut checks = 0u32;

        loop {
            checks += 1;
            match manager.poll_response(id) {
                PollStatus::Resolved(response) => return WaitOutcome::Resolved(response),
                PollStatus::TimedOut(response) => return WaitOutcome::TimedOut(response),
                PollStatus::NotFound => return WaitOutcome::Cancelled,
                PollStatus::Pending => {}
            }

            let delay = self.next_delay();
            debug!(approval_id = %id, checks, delay_ms = delay.as_millis() as u64, "approval still pending");

            tokio::select! {
                biased;
                _ = &mut interrupt => return WaitOutcome::Interrupted,
                _ = self.scheduler.sleep(delay) => {}
            }
        }
    }

    /// Poll until terminal, with no way to interrupt other than dropping the
    /// future.
    pub async fn wait_response(&mut self, manager: &ApprovalManager, id: ApprovalId) -> WaitOutcome {
        self.wait(manager, id, futures::future::pending()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApprovalConfig;
    use crate::models::approval::ApprovalOption;
    use crate::scheduler::ManualScheduler;
    use tokio::sync::oneshot;
    use tokio_test::{assert_pending, assert_ready};

    fn setup() -> (ManualScheduler, ApprovalManager, AdaptivePoller) {
        let clock = ManualScheduler::new();
        let scheduler: Arc<dyn Scheduler> = Arc::new(clock.clone());
        let manager = ApprovalManager::new(
            ApprovalConfig {
                timeout_seconds: 5,
                ..ApprovalConfig::default()
            },
            scheduler.clone(),
        );
        (clock, manager, AdaptivePoller::new(scheduler))
    }

    fn create(manager: &ApprovalManager) -> ApprovalId {
        manager
            .create_approval("Proceed?", vec![ApprovalOption::new("Yes", "Go ahead")], None, None)
            .unwrap()
    }

    #[test]
    fn test_delays_double_up_to_cap() {
        let (_clock, _manager, mut poller) = setup();
        let delays: Vec<u64> = (0..7).map(|_| poller.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000, 1000]);

        poller.reset();
        assert_eq!(poller.current_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_wait_checks_on_backoff_schedule() {
        let (clock, manager, mut poller) = setup();
        let id = create(&manager);
        let mut wait = tokio_test::task::spawn(poller.wait_response(&manager, id));

        // checks at t=0, 100, 300, 700
        assert_pending!(wait.poll());
        clock.advance(Duration::from_millis(100));
        assert_pending!(wait.poll());
        clock.advance(Duration::from_millis(200));
        assert_pending!(wait.poll());

        manager
            .submit_response(id, ApprovalResponse::custom("yes"))
            .unwrap();

        // answer is picked up at the next check, not before
        clock.advance(Duration::from_millis(399));
        assert!(!wait.is_woken());
        clock.advance(Duration::from_millis(1));
        assert_eq!(
            assert_ready!(wait.poll()),
            WaitOutcome::Resolved(ApprovalResponse::custom("yes"))
        );
    }

    #[test]
    fn test_wait_sees_timeout() {
        let (clock, manager, mut poller) = setup();
        let id = create(&manager);
        let mut wait = tokio_test::task::spawn(poller.wait_response(&manager, id));

        assert_pending!(wait.poll());
        for _ in 0..10 {
            clock.advance(Duration::from_secs(1));
            if wait.is_woken() {
                if let std::task::Poll::Ready(outcome) = wait.poll() {
                    assert_eq!(outcome, WaitOutcome::TimedOut(ApprovalResponse::default()));
                    return;
                }
            }
        }
        panic!("wait never observed the timeout");
    }

    #[test]
    fn test_wait_reports_timeout_after_result_pushed_out() {
        let clock = ManualScheduler::new();
        let scheduler: Arc<dyn Scheduler> = Arc::new(clock.clone());
        let manager = ApprovalManager::new(
            ApprovalConfig {
                timeout_seconds: 1,
                max_concurrent: 10,
                max_unclaimed_results: 2,
            },
            scheduler.clone(),
        );
        let ids: Vec<_> = (0..3).map(|_| create(&manager)).collect();
        let mut poller = AdaptivePoller::new(scheduler);
        let mut wait = tokio_test::task::spawn(poller.wait_response(&manager, ids[0]));
        assert_pending!(wait.poll());

        clock.advance(Duration::from_secs(2));
        assert_eq!(
            assert_ready!(wait.poll()),
            WaitOutcome::TimedOut(ApprovalResponse::default())
        );
    }

    #[test]
    fn test_wait_on_cancelled_approval() {
        let (_clock, manager, mut poller) = setup();
        let id = create(&manager);
        manager.cancel(id);

        let mut wait = tokio_test::task::spawn(poller.wait_response(&manager, id));
        assert_eq!(assert_ready!(wait.poll()), WaitOutcome::Cancelled);
    }

    #[test]
    fn test_interrupt_stops_waiting() {
        let (clock, manager, mut poller) = setup();
        let id = create(&manager);
        let (tx, rx) = oneshot::channel::<()>();
        let interrupt = async move {
            let _ = rx.await;
        };
        let timers_before = clock.pending_timers();
        let mut wait = tokio_test::task::spawn(poller.wait(&manager, id, interrupt));

        assert_pending!(wait.poll());
        clock.advance(Duration::from_millis(100));
        assert_pending!(wait.poll());
        assert_eq!(clock.pending_timers(), timers_before + 1);

        tx.send(()).unwrap();
        assert_eq!(assert_ready!(wait.poll()), WaitOutcome::Interrupted);
        drop(wait);
        // the in-flight backoff sleep is cancelled, the approval is untouched
        assert_eq!(clock.pending_timers(), timers_before);
        assert_eq!(manager.poll_response(id), PollStatus::Pending);
    }

    #[test]
    fn test_new_wait_resets_interval() {
        let (clock, manager, mut poller) = setup();
        let first = create(&manager);
        {
            let mut wait = tokio_test::task::spawn(poller.wait_response(&manager, first));
            assert_pending!(wait.poll());
            for ms in [100, 200, 400] {
                clock.advance(Duration::from_millis(ms));
                assert_pending!(wait.poll());
            }
        }
        assert_eq!(poller.current_interval(), Duration::from_millis(1000));

        let second = create(&manager);
        let mut wait = tokio_test::task::spawn(poller.wait_response(&manager, second));
        assert_pending!(wait.poll());
        drop(wait);
        assert_eq!(poller.current_interval(), Duration::from_millis(200));
    }
}
