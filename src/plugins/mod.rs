//! Plugins and their per-activation state.
//!
//! ## Contents
//! - [`SlotPlugin`] / [`SlotContext`]: capability used by the trigger scheduler
//! - [`TrackPlugin`] / [`TrackContext`]: capability used by the playlist layer
//! - [`PluginRegistry`] / [`PluginHandle`]: identifier → capabilities
//! - [`ActivePlugin`] / [`ActivityState`]: the record mediating asynchronous
//!   work and alarms for the currently scheduled plugin
//! - [`KeyValueStore`] / [`MemoryStore`]: per-plugin persistent storage

mod active;
mod hook;
mod registry;
mod slot;
mod store;
mod track;

pub use active::{ActivePlugin, ActivityState};
pub(crate) use hook::call_hook;
pub use registry::{PluginHandle, PluginRegistry};
pub use slot::{SlotContext, SlotPlugin};
pub use store::{KeyValueStore, MemoryStore};
pub use track::{TrackContext, TrackPlugin};
