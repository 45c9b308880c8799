//! In-memory configuration provider.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ConfigError;
use crate::plugins::{KeyValueStore, MemoryStore, PluginHandle, PluginRegistry};
use crate::provider::ConfigProvider;
use crate::schedule::{MasterTable, Playlist, TimedSchedule};

/// Provider holding documents in memory.
///
/// ## Example
/// ```rust
/// use billboard::{ConfigProvider, MasterTable, PluginRegistry, StaticProvider, TimedSchedule};
///
/// let provider = StaticProvider::new(PluginRegistry::new())
///     .with_master(MasterTable::new("weekday"))
///     .with_schedule(TimedSchedule::new("s1", "weekday"));
///
/// assert_eq!(provider.load_schedules().unwrap().len(), 1);
/// assert!(provider.load_playlists().unwrap().is_empty());
/// ```
pub struct StaticProvider {
    master: Option<MasterTable>,
    schedules: Vec<TimedSchedule>,
    playlists: Vec<Playlist>,
    registry: PluginRegistry,
    stores: Mutex<HashMap<String, Arc<MemoryStore>>>,
}

impl StaticProvider {
    /// Creates a provider with no documents.
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            master: None,
            schedules: Vec::new(),
            playlists: Vec::new(),
            registry,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the master trigger table.
    pub fn with_master(mut self, master: MasterTable) -> Self {
        self.master = Some(master);
        self
    }

    /// Adds a timed schedule.
    pub fn with_schedule(mut self, schedule: TimedSchedule) -> Self {
        self.schedules.push(schedule);
        self
    }

    /// Adds a playlist.
    pub fn with_playlist(mut self, playlist: Playlist) -> Self {
        self.playlists.push(playlist);
        self
    }

    /// Parses and sets the master trigger table from JSON.
    pub fn with_master_json(self, text: &str) -> Result<Self, ConfigError> {
        Ok(self.with_master(MasterTable::from_json(text)?))
    }

    /// Parses and adds a timed schedule from JSON.
    pub fn with_schedule_json(self, text: &str) -> Result<Self, ConfigError> {
        Ok(self.with_schedule(TimedSchedule::from_json(text)?))
    }

    /// Parses and adds a playlist from JSON.
    pub fn with_playlist_json(self, text: &str) -> Result<Self, ConfigError> {
        Ok(self.with_playlist(Playlist::from_json(text)?))
    }

    /// The plugin registry.
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }
}

impl ConfigProvider for StaticProvider {
    fn load_master_schedule(&self) -> Result<MasterTable, ConfigError> {
        self.master.clone().ok_or_else(|| ConfigError::NotFound {
            what: "master schedule".into(),
        })
    }

    fn load_schedules(&self) -> Result<Vec<TimedSchedule>, ConfigError> {
        Ok(self.schedules.clone())
    }

    fn load_playlists(&self) -> Result<Vec<Playlist>, ConfigError> {
        Ok(self.playlists.clone())
    }

    fn resolve_plugin(&self, id: &str) -> Result<Option<PluginHandle>, ConfigError> {
        Ok(self.registry.resolve(id))
    }

    fn plugin_store(&self, id: &str) -> Arc<dyn KeyValueStore> {
        let mut stores = self.stores.lock();
        let store = stores.entry(id.to_string()).or_default();
        Arc::clone(store) as Arc<dyn KeyValueStore>
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_master_is_not_found() {
        let p = StaticProvider::new(PluginRegistry::new());
        let err = p.load_master_schedule().unwrap_err();
        assert_eq!(err.as_label(), "config_not_found");
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = StaticProvider::new(PluginRegistry::new())
            .with_master_json("{ \"schedules\": 3 }")
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "config_malformed");
    }

    #[test]
    fn store_is_shared_per_plugin() {
        let p = StaticProvider::new(PluginRegistry::new());
        p.plugin_store("clock").set("face", json!("analog"));
        assert_eq!(p.plugin_store("clock").get("face"), Some(json!("analog")));
        assert!(p.plugin_store("weather").get("face").is_none());
    }
}
