//! # Asynchronous work with completion messages.
//!
//! [`FutureSource`] submits one unit of work to a [`WorkerPool`] and turns its
//! outcome into a message for a fixed completion recipient.
//!
//! ## Flow
//! ```text
//! submit(work, continuation) ─► CancelRequest
//!   └─► pool unit:
//!         work(child token) under catch_unwind
//!           ├─ Ok(v)      ─► Completion { outcome: Ok(v) }
//!           ├─ Err(e)     ─► Completion { outcome: Err(e) }
//!           └─ panic      ─► Completion { outcome: Err(Panicked) }
//!         mark done (records whether cancel was requested)
//!         continuation(completion) ─► Some(msg) ─► completion.send(msg)
//! ```
//!
//! ## Rules
//! - Cancellation is cooperative: the work receives a `CancellationToken` and
//!   is expected to poll it. Nothing is interrupted.
//! - [`CancelRequest::cancel`] returns `true` only for the first request made
//!   while the work was still outstanding.
//! - A unit dropped by pool shutdown before it started delivers nothing.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::actor::Recipient;
use crate::error::{RuntimeError, WorkError, panic_message};
use crate::messages::Message;
use crate::workers::pool::WorkerPool;

const RUNNING: u8 = 0;
const CANCEL_REQUESTED: u8 = 1;
const DONE: u8 = 2;

/// Outcome handed to a continuation.
#[derive(Debug)]
pub struct Completion<T> {
    /// True if cancellation was requested before the work finished.
    pub cancelled: bool,
    /// Value or failure of the work.
    pub outcome: Result<T, WorkError>,
}

/// Cancellation side of one submission. Cheap to clone.
#[derive(Clone, Debug)]
pub struct CancelRequest {
    state: Arc<AtomicU8>,
    token: CancellationToken,
}

impl CancelRequest {
    /// Requests cancellation.
    ///
    /// Returns `false` if the work already finished or cancellation was
    /// requested before.
    pub fn cancel(&self) -> bool {
        let won = self
            .state
            .compare_exchange(RUNNING, CANCEL_REQUESTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.token.cancel();
        }
        won
    }

    /// True once the work has finished (successfully or not).
    pub fn is_done(&self) -> bool {
        self.state.load(Ordering::Acquire) == DONE
    }

    /// True if cancellation was requested while the work was running.
    pub fn is_cancel_requested(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Submits work to a pool and delivers completions to one recipient.
#[derive(Clone)]
pub struct FutureSource {
    completion: Arc<dyn Recipient>,
    pool: WorkerPool,
}

impl FutureSource {
    /// Creates a source delivering to `completion`, running work on `pool`.
    pub fn new(completion: Arc<dyn Recipient>, pool: WorkerPool) -> Self {
        Self { completion, pool }
    }

    /// Name of the completion recipient.
    pub fn recipient(&self) -> &str {
        self.completion.name()
    }

    /// Submits `work`. When it finishes, `continuation` maps the outcome to an
    /// optional message that is sent to the completion recipient.
    pub fn submit<T, W, Fut, C>(&self, work: W, continuation: C) -> Result<CancelRequest, RuntimeError>
    where
        T: Send + 'static,
        W: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, WorkError>> + Send + 'static,
        C: FnOnce(Completion<T>) -> Option<Message> + Send + 'static,
    {
        let state = Arc::new(AtomicU8::new(RUNNING));
        let token = self.pool.child_token();
        let request = CancelRequest {
            state: Arc::clone(&state),
            token: token.clone(),
        };
        let completion = Arc::clone(&self.completion);

        self.pool.spawn(async move {
            let outcome = match AssertUnwindSafe(work(token)).catch_unwind().await {
                Ok(res) => res,
                Err(p) => Err(WorkError::Panicked(panic_message(p.as_ref()))),
            };
            let cancelled = state.swap(DONE, Ordering::AcqRel) == CANCEL_REQUESTED;

            let Some(msg) = continuation(Completion { cancelled, outcome }) else {
                return;
            };
            if let Err(e) = completion.send(msg) {
                debug!(to = completion.name(), error = %e, "completion dropped");
            }
        })?;

        Ok(request)
    }

    /// Underlying pool.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}

impl std::fmt::Debug for FutureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FutureSource")
            .field("completion", &self.completion.name())
            .field("pool", &self.pool)
            .finish()
    }
}
