//! Time source and deferred callbacks.
//!
//! Every timing-dependent component (approval timeouts, poll backoff, batch
//! windows, token refill, retry backoff) reads time and sleeps through a
//! [`Scheduler`]. Production wires [`TokioScheduler`]; tests wire
//! [`ManualScheduler`] and move the clock forward explicitly.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::oneshot;

/// Deferred work run once when its timer fires.
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Cancellable handle returned by [`Scheduler::schedule_after`].
///
/// Cancelling an already-fired or already-cancelled timer is a no-op.
/// Dropping the handle does NOT cancel the timer.
pub struct TimerHandle {
    cancel: Box<dyn Fn() + Send + Sync>,
}

impl TimerHandle {
    pub fn new(cancel: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    pub fn cancel(&self) {
        (self.cancel)()
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TimerHandle")
    }
}

#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Current monotonic time.
    fn now(&self) -> Instant;

    /// Run `callback` once after `delay`, unless cancelled first.
    fn schedule_after(&self, delay: Duration, callback: Callback) -> TimerHandle;

    /// Suspend the calling task for `delay`.
    ///
    /// Dropping the returned future before it completes cancels the timer.
    async fn sleep(&self, delay: Duration) {
        let (tx, rx) = oneshot::channel::<()>();
        let _timer = CancelOnDrop(self.schedule_after(
            delay,
            Box::new(move || {
                let _ = tx.send(());
            }),
        ));
        let _ = rx.await;
    }
}

/// Cancels the wrapped timer when dropped.
struct CancelOnDrop(TimerHandle);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

// ── Tokio ─────────────────────────────────────────────────────

/// Real timers on the tokio runtime.
///
/// `schedule_after` spawns a task, so it must be called from within a runtime.
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler;

impl TokioScheduler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn schedule_after(&self, delay: Duration, callback: Callback) -> TimerHandle {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        let abort = task.abort_handle();
        TimerHandle::new(move || abort.abort())
    }

    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

// ── Simulated clock ───────────────────────────────────────────

/// Simulated clock for deterministic tests.
///
/// Time only moves on [`ManualScheduler::advance`]; due callbacks run in
/// deadline order (ties in scheduling order) on the caller's thread, with
/// the clock set to each callback's deadline while it runs.
#[derive(Clone)]
pub struct ManualScheduler {
    base: Instant,
    state: Arc<Mutex<ManualState>>,
}

struct ManualState {
    elapsed: Duration,
    next_seq: u64,
    timers: BTreeMap<(Duration, u64), Callback>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            state: Arc::new(Mutex::new(ManualState {
                elapsed: Duration::ZERO,
                next_seq: 0,
                timers: BTreeMap::new(),
            })),
        }
    }

    /// Time elapsed on the simulated clock since construction.
    pub fn elapsed(&self) -> Duration {
        lock(&self.state).elapsed
    }

    /// Number of timers scheduled and not yet fired or cancelled.
    pub fn pending_timers(&self) -> usize {
        lock(&self.state).timers.len()
    }

    /// Move the clock forward by `by`, firing every timer that falls due.
    ///
    /// Callbacks run outside the internal lock, so they may schedule or
    /// cancel further timers; new timers due within the window also fire.
    pub fn advance(&self, by: Duration) {
        let target = lock(&self.state).elapsed + by;
        loop {
            let due = {
                let mut state = lock(&self.state);
                let next = state.timers.keys().next().copied();
                match next {
                    Some(key) if key.0 <= target => {
                        if key.0 > state.elapsed {
                            state.elapsed = key.0;
                        }
                        state.timers.remove(&key)
                    }
                    _ => None,
                }
            };
            match due {
                Some(callback) => callback(),
                None => break,
            }
        }
        lock(&self.state).elapsed = target;
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for ManualScheduler {
    fn now(&self) -> Instant {
        self.base + lock(&self.state).elapsed
    }

    fn schedule_after(&self, delay: Duration, callback: Callback) -> TimerHandle {
        let key = {
            let mut state = lock(&self.state);
            let key = (state.elapsed + delay, state.next_seq);
            state.next_seq += 1;
            state.timers.insert(key, callback);
            key
        };
        let state: Weak<Mutex<ManualState>> = Arc::downgrade(&self.state);
        TimerHandle::new(move || {
            if let Some(state) = state.upgrade() {
                lock(&state).timers.remove(&key);
            }
        })
    }
}

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
