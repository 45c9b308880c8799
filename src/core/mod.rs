//! Composition root: wiring, configuration entry points and shutdown.
//!
//! - [`RuntimeBuilder`]: chooses sinks and optional tasks, then spawns them
//! - [`Runtime`]: handles to the running tasks, configuration, ticks and
//!   graceful shutdown
//! - `shutdown`: cross-platform termination signals

mod builder;
mod runtime;
mod shutdown;

pub use builder::RuntimeBuilder;
pub use runtime::Runtime;
