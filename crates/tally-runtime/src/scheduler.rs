//! Debounced reconciliation scheduler.
//!
//! One timer task per scheduler. Each completed submission pushes the
//! deadline to `now + quiet_delay`; when the deadline passes the pass runs
//! only if no submission is in flight. A submission that starts during the
//! delay turns the pending flush into a no-op and reschedules on completion.
//! Passes never overlap.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Work run by a reconciliation pass.
#[async_trait]
pub trait FlushTarget: Send + Sync + 'static {
    async fn flush(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Ran,
    /// A submission was in flight.
    Busy,
    /// Nothing was recorded since the last pass.
    NothingPending,
}

struct Shared {
    in_flight: AtomicUsize,
    pending: AtomicBool,
    passes: AtomicU64,
    quiet_delay: Duration,
    deadline: watch::Sender<Option<Instant>>,
    pass_lock: Mutex<()>,
    target: Arc<dyn FlushTarget>,
}

impl Shared {
    fn schedule(&self) {
        let at = Instant::now() + self.quiet_delay;
        self.deadline.send_replace(Some(at));
    }

    async fn run_pass(&self, require_pending: bool) -> FlushOutcome {
        if self.in_flight.load(Ordering::SeqCst) != 0 {
            return FlushOutcome::Busy;
        }
        let _pass = self.pass_lock.lock().await;
        // Re-check after waiting for a previous pass.
        if self.in_flight.load(Ordering::SeqCst) != 0 {
            return FlushOutcome::Busy;
        }
        let had_pending = self.pending.swap(false, Ordering::SeqCst);
        if require_pending && !had_pending {
            return FlushOutcome::NothingPending;
        }
        self.passes.fetch_add(1, Ordering::SeqCst);
        self.target.flush().await;
        FlushOutcome::Ran
    }
}

/// Held for the duration of one submission.
#[must_use = "dropping the guard ends the submission"]
pub struct InFlightGuard {
    shared: Arc<Shared>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let left = self.shared.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        if left == 0 && self.shared.pending.load(Ordering::SeqCst) {
            self.shared.schedule();
        }
    }
}

pub struct ReconcileScheduler {
    shared: Arc<Shared>,
    timer: JoinHandle<()>,
}

impl ReconcileScheduler {
    /// Spawn the timer task. Must be called inside a tokio runtime.
    pub fn start(target: Arc<dyn FlushTarget>, quiet_delay: Duration) -> Self {
        let (deadline, rx) = watch::channel(None);
        let shared = Arc::new(Shared {
            in_flight: AtomicUsize::new(0),
            pending: AtomicBool::new(false),
            passes: AtomicU64::new(0),
            quiet_delay,
            deadline,
            pass_lock: Mutex::new(()),
            target,
        });
        let timer = tokio::spawn(timer_loop(Arc::clone(&shared), rx));
        Self { shared, timer }
    }

    pub fn begin(&self) -> InFlightGuard {
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Record that a submission changed game state. Outside a submission the
    /// quiet delay starts immediately; inside one it starts when the last
    /// in-flight guard drops.
    pub fn notify_activity(&self) {
        self.shared.pending.store(true, Ordering::SeqCst);
        if self.shared.in_flight.load(Ordering::SeqCst) == 0 {
            self.shared.schedule();
        }
    }

    /// Run a pass now if anything is pending and nothing is in flight.
    pub async fn flush_when_idle(&self) -> FlushOutcome {
        self.shared.run_pass(true).await
    }

    /// Skip the quiet delay. Still refuses while a submission is in flight.
    pub async fn force_flush(&self) -> FlushOutcome {
        // Cleared before the pass: a submission finishing mid-pass sets a
        // fresh deadline that must still fire. When the pass is refused the
        // in-flight guard reschedules on drop.
        self.shared.deadline.send_replace(None);
        self.shared.run_pass(false).await
    }

    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_pending(&self) -> bool {
        self.shared.pending.load(Ordering::SeqCst)
    }

    pub fn passes_run(&self) -> u64 {
        self.shared.passes.load(Ordering::SeqCst)
    }
}

impl Drop for ReconcileScheduler {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

async fn timer_loop(shared: Arc<Shared>, mut rx: watch::Receiver<Option<Instant>>) {
    loop {
        let deadline = *rx.borrow_and_update();
        match deadline {
            None => {
                if rx.changed().await.is_err() {
                    return;
                }
            }
            Some(at) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(at) => {
                        // Only clear the deadline we slept on; a newer one stays.
                        shared.deadline.send_if_modified(|d| {
                            if *d == Some(at) {
                                *d = None;
                                true
                            } else {
                                false
                            }
                        });
                        let outcome = shared.run_pass(true).await;
                        tracing::trace!(?outcome, "debounced flush fired");
                    }
                    changed = rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}
