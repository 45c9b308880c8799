//! # Named-route message router.
//!
//! [`Router`] maps a route name to an ordered list of recipients. Publishing to
//! a route fans the message out to every recipient, independent of who sent it.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                    Recipients (per route, ordered):
//!   TickSource ──┐                     ┌──► scheduler
//!   Scheduler  ──┼──► Router.send("tick") ──► playlist layer
//!   Plugins    ──┘                     └──► ...
//! ```
//!
//! ## Rules
//! - **First writer wins**: a route is registered at most once per name.
//! - **Unknown routes**: sending to an unregistered name is a no-op.
//! - **Isolation**: a failing recipient (e.g. terminated task) does not stop
//!   delivery to the recipients after it.
//! - **Short lock**: the route table lock is held only to look up the route,
//!   never while recipients enqueue.
//! - **Order**: recipients receive in registration order; a single recipient
//!   sees messages from one sender in send order.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::actor::Recipient;
use crate::messages::message::Message;

/// Route name of the minute tick.
pub const ROUTE_TICK: &str = "tick";
/// Route name of the display sink.
pub const ROUTE_DISPLAY: &str = "display";
/// Route name of telemetry consumers.
pub const ROUTE_TELEMETRY: &str = "telemetry";

/// Process-wide registry of routes.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
#[derive(Default)]
pub struct Router {
    routes: Mutex<HashMap<String, Arc<[Arc<dyn Recipient>]>>>,
}

impl Router {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route.
    ///
    /// Returns `false` (and leaves the existing route untouched) if the name
    /// is already registered.
    pub fn add_route(&self, name: impl Into<String>, recipients: Vec<Arc<dyn Recipient>>) -> bool {
        let name = name.into();
        let mut routes = self.routes.lock();
        if routes.contains_key(&name) {
            debug!(route = %name, "route already registered; keeping first");
            return false;
        }
        routes.insert(name, recipients.into());
        true
    }

    /// True if a route with this name exists.
    pub fn has_route(&self, name: &str) -> bool {
        self.routes.lock().contains_key(name)
    }

    /// Publishes a message to every recipient of `route`.
    ///
    /// Returns the number of recipients that accepted the message.
    pub fn send(&self, route: &str, msg: Message) -> usize {
        let recipients = match self.routes.lock().get(route) {
            Some(r) => Arc::clone(r),
            None => return 0,
        };

        let mut delivered = 0;
        for r in recipients.iter() {
            match r.send(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(route, recipient = r.name(), error = %e, "recipient rejected message");
                }
            }
        }
        delivered
    }
}
