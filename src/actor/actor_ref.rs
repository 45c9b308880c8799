//! # Addresses of actor tasks.
//!
//! [`Recipient`] is anything that can accept a [`Message`] without blocking.
//! [`ActorRef`] is the recipient side of an actor task's private inbox.
//! [`Mailbox`] is the receiving side when a test or harness wants to act as a
//! recipient itself (see [`ActorRef::detached`]).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::RuntimeError;
use crate::messages::Message;

/// Contract for message recipients.
///
/// `send` must never block the caller.
pub trait Recipient: Send + Sync + 'static {
    /// Human-readable name (for logs).
    fn name(&self) -> &str;

    /// Enqueues a message.
    fn send(&self, msg: Message) -> Result<(), RuntimeError>;
}

/// Cloneable handle to an actor task's inbox.
///
/// ### Rules
/// - `send` enqueues without blocking.
/// - After the task has processed `Quit`, `send` fails with
///   [`RuntimeError::IllegalState`].
#[derive(Clone)]
pub struct ActorRef {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<Message>,
    terminated: Arc<AtomicBool>,
}

impl ActorRef {
    pub(crate) fn new(
        name: Arc<str>,
        tx: mpsc::UnboundedSender<Message>,
        terminated: Arc<AtomicBool>,
    ) -> Self {
        Self {
            name,
            tx,
            terminated,
        }
    }

    /// Creates a reference whose inbox is read through the returned [`Mailbox`]
    /// instead of an actor loop.
    ///
    /// Dropping the mailbox makes every later `send` fail.
    pub fn detached(name: impl Into<Arc<str>>) -> (Self, Mailbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let me = Self::new(name.into(), tx, Arc::new(AtomicBool::new(false)));
        (me, Mailbox { rx })
    }

    /// Task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueues a message without blocking.
    pub fn send(&self, msg: Message) -> Result<(), RuntimeError> {
        if self.is_terminated() {
            return Err(self.illegal_state());
        }
        self.tx.send(msg).map_err(|_| self.illegal_state())
    }

    /// True once the task has processed `Quit` (or its inbox is gone).
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire) || self.tx.is_closed()
    }

    pub(crate) fn mark_terminated(&self) {
        self.terminated.store(true, Ordering::Release);
    }

    fn illegal_state(&self) -> RuntimeError {
        RuntimeError::IllegalState {
            task: self.name.to_string(),
        }
    }
}

impl std::fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRef")
            .field("name", &self.name)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

impl Recipient for ActorRef {
    fn name(&self) -> &str {
        ActorRef::name(self)
    }

    fn send(&self, msg: Message) -> Result<(), RuntimeError> {
        ActorRef::send(self, msg)
    }
}

/// Receiving side of a detached [`ActorRef`].
pub struct Mailbox {
    rx: mpsc::UnboundedReceiver<Message>,
}

impl Mailbox {
    /// Waits for the next message.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Waits for the next message, at most `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Message> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Returns a queued message, if any.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Drains every queued message.
    pub fn drain(&mut self) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(m) = self.rx.try_recv() {
            out.push(m);
        }
        out
    }
}
