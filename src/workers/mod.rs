//! Worker pools and the services built on them.
//!
//! - [`WorkerPool`]: bounded, explicitly owned pool of tokio tasks
//! - [`TimerService`]: one-shot delayed deliveries with cancellation
//! - [`FutureSource`]: cancellable asynchronous work with completion messages
//! - [`TickSource`]: minute-aligned ticks on the `"tick"` route

mod future;
mod pool;
mod ticker;
mod timer;

pub use future::{CancelRequest, Completion, FutureSource};
pub use pool::WorkerPool;
pub use ticker::{Clock, TickSource, TickerHandle, local_clock};
pub use timer::{TimerCancel, TimerHandle, TimerService};
