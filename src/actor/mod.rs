//! Actor task primitives.
//!
//! An actor task is a worker with a private, ordered inbox and a single
//! processing loop; other components talk to it only through messages.
//!
//! - [`Recipient`] / [`ActorRef`]: non-blocking `send`
//! - [`Handler`] / [`ActorContext`]: per-task behaviour
//! - [`spawn_actor`] / [`ActorTask`]: the loop
//! - [`Mailbox`]: receive side of a detached reference (tests, harnesses)

mod actor_ref;
mod handler;
mod runner;

pub use actor_ref::{ActorRef, Mailbox, Recipient};
pub use handler::{ActorContext, Handler};
pub use runner::{ActorTask, spawn_actor};
