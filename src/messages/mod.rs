//! Messages: types, opaque payloads and the named-route router.
//!
//! ## Contents
//! - [`Message`], [`MessageKind`] and the per-kind structs
//! - [`Payload`] type-erased content
//! - [`Router`] route name → ordered recipients
//!
//! ## Quick reference
//! - **Publishers**: the tick source, the scheduler and playlist layer
//!   (telemetry, display), plugins (display), timers, the future source.
//! - **Consumers**: actor tasks registered on routes or addressed directly.

mod message;
mod payload;
mod router;

pub use message::{
    AlarmExpired, ConfigureNotify, ConfigureRequest, CustomMessage, DisplayImage, DisplaySettings,
    FutureCompleted, Message, MessageKind, Telemetry, Tick,
};
pub use payload::Payload;
pub use router::{ROUTE_DISPLAY, ROUTE_TELEMETRY, ROUTE_TICK, Router};
