//! Configuration providers.
//!
//! A [`ConfigProvider`] is handed to the scheduling tasks inside a `Configure`
//! message. It supplies the schedule documents, resolves plugin identifiers and
//! owns the per-plugin stores.
//!
//! Errors distinguish a missing document ([`ConfigError::NotFound`]) from a
//! broken one ([`ConfigError::Malformed`]).

mod static_provider;

use std::sync::Arc;

pub use static_provider::StaticProvider;

use crate::error::ConfigError;
use crate::plugins::{KeyValueStore, PluginHandle};
use crate::schedule::{MasterTable, Playlist, TimedSchedule};

/// Source of configuration documents and plugins.
pub trait ConfigProvider: Send + Sync + 'static {
    /// Loads the master trigger table.
    fn load_master_schedule(&self) -> Result<MasterTable, ConfigError>;

    /// Loads every timed schedule.
    fn load_schedules(&self) -> Result<Vec<TimedSchedule>, ConfigError>;

    /// Loads every playlist.
    fn load_playlists(&self) -> Result<Vec<Playlist>, ConfigError>;

    /// Resolves a plugin identifier. `Ok(None)` means the plugin is unknown.
    fn resolve_plugin(&self, id: &str) -> Result<Option<PluginHandle>, ConfigError>;

    /// Persistent store of a plugin. Repeated calls return the same store.
    fn plugin_store(&self, id: &str) -> Arc<dyn KeyValueStore>;
}
