//! # Active-plugin record.
//!
//! One [`ActivePlugin`] exists per currently scheduled plugin (per timeslot in
//! the scheduler, per track in the playlist layer). It mediates every piece of
//! asynchronous work and every alarm the plugin asks for.
//!
//! ## States
//! ```text
//!            submit_async                 mark_processing             mark_idle
//!   Idle ───────────────► AwaitingResult ───────────────► Processing ─────────► Idle
//!    │  ▲                                                    │ submit_async
//!    │  │ check_alarm(now >= wake)                           └──────────► AwaitingResult
//!    │  │
//!    └──┴──► Sleeping     (set_alarm from Idle or Processing)
//!
//!   any ──shutdown──► Terminated   (no transition accepted afterwards)
//! ```
//!
//! ## Staleness
//! Each record carries a generation number chosen by its owner. A completion
//! is accepted only if it names this record's plugin and generation, carries
//! the token of the outstanding submission, and arrives while the record is
//! awaiting a result. Anything else is stale.
//!
//! ## Rules
//! - At most one outstanding submission.
//! - Protocol violations return [`StateError`]; they are bugs in the plugin
//!   and must not be silently ignored.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{StateError, WorkError};
use crate::messages::{FutureCompleted, Message, MessageKind, Payload};
use crate::workers::{CancelRequest, FutureSource, TimerCancel};

/// State of an [`ActivePlugin`] record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivityState {
    /// Ready to run or submit work.
    Idle,
    /// Waiting for a wake time.
    Sleeping,
    /// One submission is outstanding.
    AwaitingResult,
    /// A delivered result is being handled.
    ProcessingResult,
    /// Shut down; terminal.
    Terminated,
}

impl ActivityState {
    /// Short stable name (snake_case) for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityState::Idle => "idle",
            ActivityState::Sleeping => "sleeping",
            ActivityState::AwaitingResult => "awaiting_result",
            ActivityState::ProcessingResult => "processing_result",
            ActivityState::Terminated => "terminated",
        }
    }
}

struct Pending {
    token: Arc<str>,
    cancel: CancelRequest,
}

/// Per-plugin activity record.
pub struct ActivePlugin {
    plugin: Arc<str>,
    generation: u64,
    state: ActivityState,
    wake: Option<NaiveDateTime>,
    pending: Option<Pending>,
    timer: Option<TimerCancel>,
    futures: FutureSource,
}

impl ActivePlugin {
    /// Creates an idle record. Completions are delivered through `futures`.
    pub fn new(plugin: impl Into<Arc<str>>, generation: u64, futures: FutureSource) -> Self {
        Self {
            plugin: plugin.into(),
            generation,
            state: ActivityState::Idle,
            wake: None,
            pending: None,
            timer: None,
            futures,
        }
    }

    /// Plugin identity.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Generation chosen by the owner.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current state.
    pub fn state(&self) -> ActivityState {
        self.state
    }

    /// Wake time while sleeping.
    pub fn wake_time(&self) -> Option<NaiveDateTime> {
        self.wake
    }

    /// True when the plugin may be run.
    pub fn is_idle(&self) -> bool {
        self.state == ActivityState::Idle
    }

    /// Token of the outstanding submission.
    pub fn pending_token(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| &*p.token)
    }

    /// Submits asynchronous work under `token`.
    ///
    /// Allowed while idle or processing a result. The completion arrives as a
    /// [`FutureCompleted`] carrying this record's plugin, generation and token.
    pub fn submit_async<T, W, Fut>(&mut self, token: impl Into<Arc<str>>, work: W) -> Result<(), StateError>
    where
        T: Any + Send + Sync,
        W: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, WorkError>> + Send + 'static,
    {
        const OP: &str = "submit_async";
        match self.state {
            ActivityState::Idle | ActivityState::ProcessingResult => {}
            ActivityState::Terminated => return Err(StateError::Terminated { op: OP }),
            other => {
                return Err(StateError::InvalidState {
                    op: OP,
                    state: other.as_str(),
                });
            }
        }

        let token: Arc<str> = token.into();
        let plugin = Arc::clone(&self.plugin);
        let generation = self.generation;
        let reply_token = Arc::clone(&token);

        let cancel = self.futures.submit(work, move |done| {
            Some(Message::now(MessageKind::FutureCompleted(FutureCompleted {
                plugin,
                generation,
                token: reply_token,
                outcome: done.outcome.map(Payload::new),
            })))
        })?;

        debug!(plugin = %self.plugin, generation, token = %token, "work submitted");
        self.pending = Some(Pending { token, cancel });
        self.state = ActivityState::AwaitingResult;
        Ok(())
    }

    /// Puts the record to sleep until `wake`.
    ///
    /// Allowed while idle, sleeping (re-arms) or processing a result.
    pub fn set_alarm(&mut self, wake: NaiveDateTime) -> Result<(), StateError> {
        const OP: &str = "set_alarm";
        match self.state {
            ActivityState::Terminated => Err(StateError::Terminated { op: OP }),
            ActivityState::AwaitingResult => Err(StateError::InvalidState {
                op: OP,
                state: ActivityState::AwaitingResult.as_str(),
            }),
            _ => {
                self.cancel_timer();
                self.state = ActivityState::Sleeping;
                self.wake = Some(wake);
                Ok(())
            }
        }
    }

    /// Attaches a timer that is cancelled when the record leaves the state it
    /// was armed for (wake-up or shutdown). Replaces a previous timer.
    pub fn arm_timer(&mut self, timer: TimerCancel) {
        self.cancel_timer();
        if self.state == ActivityState::Terminated {
            timer.cancel();
        } else {
            self.timer = Some(timer);
        }
    }

    /// Wakes a sleeping record whose wake time is at or before `now`.
    ///
    /// Returns `true` if the record transitioned to idle.
    pub fn check_alarm(&mut self, now: NaiveDateTime) -> bool {
        if self.state != ActivityState::Sleeping {
            return false;
        }
        match self.wake {
            Some(wake) if now < wake => false,
            _ => {
                self.state = ActivityState::Idle;
                self.wake = None;
                self.cancel_timer();
                true
            }
        }
    }

    /// True if `done` is the completion this record is waiting for.
    pub fn expects(&self, done: &FutureCompleted) -> bool {
        self.state == ActivityState::AwaitingResult
            && done.generation == self.generation
            && *done.plugin == *self.plugin
            && self.pending.as_ref().is_some_and(|p| p.token == done.token)
    }

    /// Marks the expected completion as being processed.
    pub fn mark_processing(&mut self) -> Result<(), StateError> {
        match self.state {
            ActivityState::AwaitingResult => {
                self.pending = None;
                self.state = ActivityState::ProcessingResult;
                Ok(())
            }
            ActivityState::Terminated => Err(StateError::Terminated { op: "mark_processing" }),
            other => Err(StateError::InvalidState {
                op: "mark_processing",
                state: other.as_str(),
            }),
        }
    }

    /// Returns to idle after a result was processed.
    ///
    /// A no-op unless processing: the handler may have submitted more work or
    /// gone to sleep.
    pub fn mark_idle(&mut self) {
        if self.state == ActivityState::ProcessingResult {
            self.state = ActivityState::Idle;
        }
    }

    /// Terminates the record. Outstanding work is asked to cancel when
    /// `cancel_pending` is set. Idempotent.
    pub fn shutdown(&mut self, cancel_pending: bool) {
        if self.state == ActivityState::Terminated {
            return;
        }
        if let Some(p) = self.pending.take() {
            if cancel_pending && p.cancel.cancel() {
                debug!(plugin = %self.plugin, generation = self.generation, token = %p.token, "work cancel requested");
            }
        }
        self.cancel_timer();
        self.wake = None;
        self.state = ActivityState::Terminated;
    }

    fn cancel_timer(&mut self) {
        if let Some(t) = self.timer.take() {
            t.cancel();
        }
    }
}

impl std::fmt::Debug for ActivePlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivePlugin")
            .field("plugin", &self.plugin)
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("wake", &self.wake)
            .field("pending", &self.pending_token())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;

    use super::*;
    use crate::actor::{ActorRef, Mailbox};
    use crate::workers::WorkerPool;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap()
    }

    fn record(generation: u64) -> (ActivePlugin, Mailbox) {
        let (to, mail) = ActorRef::detached("scheduler");
        let futures = FutureSource::new(Arc::new(to), WorkerPool::new("futures", 1));
        (ActivePlugin::new("weather", generation, futures), mail)
    }

    async fn completion(mail: &mut Mailbox) -> FutureCompleted {
        match mail.recv_timeout(Duration::from_secs(5)).await.map(|m| m.kind) {
            Some(MessageKind::FutureCompleted(c)) => c,
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn submit_deliver_process_idle() {
        let (mut rec, mut mail) = record(3);
        rec.submit_async("fetch", |_| async { Ok::<_, WorkError>(21u32) }).unwrap();
        assert_eq!(rec.state(), ActivityState::AwaitingResult);
        assert_eq!(rec.pending_token(), Some("fetch"));

        let done = completion(&mut mail).await;
        assert!(rec.expects(&done));
        assert_eq!(done.generation, 3);
        assert_eq!(done.result().and_then(|p| p.downcast_ref::<u32>()), Some(&21));

        rec.mark_processing().unwrap();
        assert!(!rec.expects(&done));
        rec.mark_idle();
        assert!(rec.is_idle());
    }

    #[tokio::test]
    async fn second_submission_is_rejected() {
        let (mut rec, _mail) = record(1);
        rec.submit_async("a", |t: CancellationToken| async move {
            t.cancelled().await;
            Err::<(), _>(WorkError::Cancelled)
        })
        .unwrap();

        let err = rec.submit_async("b", |_| async { Ok::<_, WorkError>(()) }).unwrap_err();
        assert_eq!(
            err,
            StateError::InvalidState { op: "submit_async", state: "awaiting_result" }
        );
        rec.shutdown(true);
    }

    #[test]
    fn sleeping_rejects_work_and_wakes_on_time() {
        let (mut rec, _mail) = record(1);
        rec.set_alarm(at(10, 5)).unwrap();
        assert_eq!(rec.state(), ActivityState::Sleeping);

        let err = rec.submit_async("x", |_| async { Ok::<_, WorkError>(()) }).unwrap_err();
        assert_eq!(err, StateError::InvalidState { op: "submit_async", state: "sleeping" });

        assert!(!rec.check_alarm(at(10, 4)));
        assert!(rec.check_alarm(at(10, 5)));
        assert!(rec.is_idle());
        assert_eq!(rec.wake_time(), None);
    }

    #[tokio::test]
    async fn alarm_rejected_while_awaiting() {
        let (mut rec, _mail) = record(1);
        rec.submit_async("a", |_| std::future::pending::<Result<(), WorkError>>()).unwrap();
        let err = rec.set_alarm(at(11, 0)).unwrap_err();
        assert_eq!(err, StateError::InvalidState { op: "set_alarm", state: "awaiting_result" });
        rec.shutdown(true);
    }

    #[tokio::test]
    async fn terminated_is_terminal() {
        let (mut rec, _mail) = record(1);
        rec.shutdown(false);
        rec.shutdown(true);
        assert_eq!(rec.state(), ActivityState::Terminated);
        assert_eq!(
            rec.set_alarm(at(1, 0)).unwrap_err(),
            StateError::Terminated { op: "set_alarm" }
        );
        assert_eq!(
            rec.submit_async("x", |_| async { Ok::<_, WorkError>(()) }).unwrap_err(),
            StateError::Terminated { op: "submit_async" }
        );
        assert!(!rec.check_alarm(at(23, 0)));
    }

    #[tokio::test]
    async fn completion_from_other_generation_is_stale() {
        let (mut old, mut mail) = record(1);
        old.submit_async("fetch", |_| async { Ok::<_, WorkError>(()) }).unwrap();
        let done = completion(&mut mail).await;
        old.shutdown(true);

        let (mut new, _mail2) = record(2);
        new.submit_async("fetch", |_| std::future::pending::<Result<(), WorkError>>()).unwrap();
        assert!(!old.expects(&done));
        assert!(!new.expects(&done));
        new.shutdown(true);
    }

    #[tokio::test]
    async fn shutdown_requests_cancellation() {
        let (mut rec, mut mail) = record(1);
        rec.submit_async("slow", |t: CancellationToken| async move {
            t.cancelled().await;
            Err::<(), _>(WorkError::Cancelled)
        })
        .unwrap();
        rec.shutdown(true);

        let done = completion(&mut mail).await;
        assert_eq!(done.error(), Some(&WorkError::Cancelled));
        assert!(!rec.expects(&done));
    }
}
