//! Trigger-based slot scheduling.
//!
//! - [`evaluate`]: master table + timed schedules → [`Evaluation`]
//! - [`TriggerScheduler`]: the actor handler driving slot plugins from ticks

mod evaluation;
mod trigger;


pub use evaluation::{Evaluation, SelectionKey, evaluate, truncate_to_minute};
pub use trigger::{SchedulerState, TriggerScheduler};
