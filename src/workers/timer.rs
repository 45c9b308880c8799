//! # One-shot timers on a bounded pool.
//!
//! [`TimerService::create_timer`] returns a pair:
//! - [`TimerHandle`]: resolves to the delivered message, or `None` when the
//!   timer was cancelled.
//! - [`TimerCancel`]: `cancel()` suppresses delivery; it returns `false` if the
//!   timer has already fired.
//!
//! ```text
//! create_timer(delay, to, msg)
//!   └─► pool unit:
//!         sleep(delay) ◄─ select ─► cancelled (per-timer or pool shutdown)
//!           │                          └─► state = Cancelled, resolve None
//!           └─► CAS Pending → Fired ─► to.send(msg), resolve Some(msg)
//! ```
//!
//! Fire and cancel race on a single atomic state, so exactly one of them wins.
//! Timers hold a worker for their whole delay: with `workers` timers pending,
//! further timers start counting only once a worker frees up.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::select;
use tokio::task::JoinHandle;
use tokio::time::error::Elapsed;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::actor::Recipient;
use crate::error::RuntimeError;
use crate::messages::Message;
use crate::workers::pool::WorkerPool;

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// Schedules one-shot deliveries.
#[derive(Clone, Debug)]
pub struct TimerService {
    pool: WorkerPool,
}

impl TimerService {
    /// Creates a service with its own pool of `workers` workers.
    pub fn new(workers: usize) -> Self {
        Self::with_pool(WorkerPool::new("timer", workers))
    }

    /// Creates a service on an existing pool.
    pub fn with_pool(pool: WorkerPool) -> Self {
        Self { pool }
    }

    /// Arms a timer that delivers `msg` to `to` after `delay`.
    ///
    /// With `to == None` nothing is sent; the message is only returned through
    /// the handle.
    pub fn create_timer(
        &self,
        delay: Duration,
        to: Option<Arc<dyn Recipient>>,
        msg: Message,
    ) -> Result<(TimerHandle, TimerCancel), RuntimeError> {
        if self.pool.is_shutdown() {
            return Err(RuntimeError::TimerShutdown);
        }

        let state = Arc::new(AtomicU8::new(PENDING));
        let token = self.pool.child_token();
        let cancel = TimerCancel {
            state: Arc::clone(&state),
            token: token.clone(),
        };

        let unit_state = Arc::clone(&state);
        let join = self
            .pool
            .spawn(async move {
                select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = token.cancelled() => {
                        let _ = unit_state.compare_exchange(
                            PENDING,
                            CANCELLED,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        );
                        return None;
                    }
                }

                if unit_state
                    .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    return None;
                }

                if let Some(to) = to {
                    if let Err(e) = to.send(msg.clone()) {
                        debug!(to = to.name(), kind = msg.kind.name(), error = %e, "timer delivery dropped");
                    }
                }
                Some(msg)
            })
            .map_err(|_| RuntimeError::TimerShutdown)?;

        Ok((TimerHandle { join, state }, cancel))
    }

    /// Cancels every outstanding timer and rejects new ones. Idempotent.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    /// Waits until every timer unit has exited. Only completes after `shutdown`.
    pub async fn join(&self) {
        self.pool.join().await;
    }

    /// True once the service was shut down.
    pub fn is_shutdown(&self) -> bool {
        self.pool.is_shutdown()
    }

    /// Number of armed (or queued) timers.
    pub fn pending(&self) -> usize {
        self.pool.pending()
    }
}

/// Completion side of a timer.
pub struct TimerHandle {
    join: JoinHandle<Option<Option<Message>>>,
    state: Arc<AtomicU8>,
}

impl TimerHandle {
    /// Waits for the timer: `Some(msg)` if it fired, `None` if cancelled.
    pub async fn wait(self) -> Option<Message> {
        self.join.await.ok().flatten().flatten()
    }

    /// Like [`wait`](Self::wait), bounded by `timeout`.
    pub async fn result(self, timeout: Duration) -> Result<Option<Message>, Elapsed> {
        tokio::time::timeout(timeout, self.wait()).await
    }

    /// True once the message was handed over.
    pub fn is_fired(&self) -> bool {
        self.state.load(Ordering::Acquire) == FIRED
    }
}

/// Cancellation side of a timer. Cheap to clone.
#[derive(Clone, Debug)]
pub struct TimerCancel {
    state: Arc<AtomicU8>,
    token: CancellationToken,
}

impl TimerCancel {
    /// Suppresses delivery. Returns `false` if the timer already fired or was
    /// already cancelled.
    pub fn cancel(&self) -> bool {
        let won = self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.token.cancel();
        }
        won
    }

    /// True if the timer was cancelled before firing.
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }
}
