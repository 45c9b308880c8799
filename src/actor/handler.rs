//! # Actor handler trait
//!
//! `Handler` is the extension point of an actor task. The task's loop feeds it
//! one message at a time from a private inbox; no two messages are ever
//! processed concurrently by the same handler, so handler state needs no locks.
//!
//! ## Contract
//! - `execute` receives every message except `Quit`.
//! - `on_quit` runs once when `Quit` is dequeued; the loop then terminates and
//!   queued messages are not drained.
//! - Errors and panics from either hook are logged by the loop. They never stop
//!   the loop, except that `Quit` still terminates it.

use async_trait::async_trait;

use crate::actor::actor_ref::ActorRef;
use crate::messages::Message;

/// Per-task information handed to every hook call.
pub struct ActorContext {
    myself: ActorRef,
}

impl ActorContext {
    /// Creates a context for the task addressed by `myself`.
    pub fn new(myself: ActorRef) -> Self {
        Self { myself }
    }

    /// Reference to the task's own inbox.
    pub fn myself(&self) -> &ActorRef {
        &self.myself
    }

    /// Task name.
    pub fn name(&self) -> &str {
        self.myself.name()
    }
}

/// Contract for actor task behaviour.
#[async_trait]
pub trait Handler: Send + 'static {
    /// Handles one work or configure message.
    async fn execute(&mut self, ctx: &ActorContext, msg: Message) -> anyhow::Result<()>;

    /// Handles `Quit`. The loop terminates afterwards regardless of the result.
    async fn on_quit(&mut self, ctx: &ActorContext, _msg: &Message) -> anyhow::Result<()> {
        tracing::info!(actor = ctx.name(), "quit");
        Ok(())
    }
}
