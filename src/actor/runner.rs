//! # Actor task loop.
//!
//! [`spawn_actor`] creates a private unbounded inbox and one worker task that
//! drains it.
//!
//! ## Loop
//! ```text
//! loop {
//!   msg = inbox.recv()           (waits while empty)
//!   ├─ Quit  ─► mark terminated ─► on_quit(msg) ─► exit (queue not drained)
//!   └─ other ─► execute(msg)
//!                  ├─ Ok     ─► continue
//!                  ├─ Err    ─► log, continue
//!                  └─ panic  ─► log, continue
//! }
//! ```
//!
//! ## Panic handling
//! Hook futures run under `catch_unwind` so one bad message cannot wedge the
//! task. `AssertUnwindSafe` is used: a handler that panics mid-update may leave
//! its own state half-modified.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::actor::actor_ref::ActorRef;
use crate::actor::handler::{ActorContext, Handler};
use crate::error::panic_message;
use crate::messages::Message;

/// A spawned actor task: its address plus the join handle of its loop.
pub struct ActorTask {
    /// Address of the task.
    pub actor: ActorRef,
    /// Completes when the loop has exited.
    pub join: JoinHandle<()>,
}

/// Spawns `handler` as an actor task named `name`.
///
/// Must be called from within a tokio runtime.
pub fn spawn_actor<H: Handler>(name: impl Into<Arc<str>>, handler: H) -> ActorTask {
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let actor = ActorRef::new(name.into(), tx, Arc::new(AtomicBool::new(false)));
    let ctx = ActorContext::new(actor.clone());
    let join = tokio::spawn(run_loop(handler, ctx, rx));
    ActorTask { actor, join }
}

async fn run_loop<H: Handler>(
    mut handler: H,
    ctx: ActorContext,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    info!(actor = ctx.name(), "starting");

    while let Some(msg) = rx.recv().await {
        if msg.is_quit() {
            ctx.myself().mark_terminated();
            let fut = handler.on_quit(&ctx, &msg);
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(actor = ctx.name(), error = %e, "quit.unhandled"),
                Err(p) => {
                    error!(actor = ctx.name(), panic = %panic_message(p.as_ref()), "quit.panicked")
                }
            }
            break;
        }

        let kind = msg.kind.name();
        let seq = msg.seq;
        debug!(actor = ctx.name(), kind, seq, "receive");

        let fut = handler.execute(&ctx, msg);
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(actor = ctx.name(), kind, seq, error = %e, "execute.unhandled"),
            Err(p) => error!(
                actor = ctx.name(),
                kind,
                seq,
                panic = %panic_message(p.as_ref()),
                "execute.panicked"
            ),
        }
    }

    rx.close();
    info!(actor = ctx.name(), "stopped");
}
