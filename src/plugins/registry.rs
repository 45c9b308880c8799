//! # Plugin registry
//!
//! [`PluginRegistry`] maps a plugin identifier to factories for its
//! capabilities. A plugin may offer the slot capability, the track capability,
//! or both; [`PluginRegistry::resolve`] builds a [`PluginHandle`] with a fresh
//! instance of each.
//!
//! ## Example
//! ```rust
//! use billboard::{PluginError, PluginRegistry, SlotContext, SlotPlugin};
//!
//! struct Blank;
//! impl SlotPlugin for Blank {
//!     fn on_slot_start(&self, _ctx: &mut SlotContext<'_>) -> Result<(), PluginError> {
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = PluginRegistry::new();
//! registry.register_slot("blank", || Blank);
//! let handle = registry.resolve("blank").expect("registered");
//! assert!(handle.slot().is_some());
//! assert!(handle.track().is_none());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::plugins::slot::SlotPlugin;
use crate::plugins::track::TrackPlugin;

type SlotFactory = Arc<dyn Fn() -> Arc<dyn SlotPlugin> + Send + Sync>;
type TrackFactory = Arc<dyn Fn() -> Arc<dyn TrackPlugin> + Send + Sync>;

/// A resolved plugin: its identifier and the capabilities it offers.
#[derive(Clone)]
pub struct PluginHandle {
    id: Arc<str>,
    slot: Option<Arc<dyn SlotPlugin>>,
    track: Option<Arc<dyn TrackPlugin>>,
}

impl PluginHandle {
    /// Plugin identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Slot capability, if offered.
    pub fn slot(&self) -> Option<&Arc<dyn SlotPlugin>> {
        self.slot.as_ref()
    }

    /// Track capability, if offered.
    pub fn track(&self) -> Option<&Arc<dyn TrackPlugin>> {
        self.track.as_ref()
    }
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("id", &self.id)
            .field("slot", &self.slot.is_some())
            .field("track", &self.track.is_some())
            .finish()
    }
}

/// Identifier → capability factories.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    slot: BTreeMap<String, SlotFactory>,
    track: BTreeMap<String, TrackFactory>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a slot factory. A later registration replaces an earlier one.
    pub fn register_slot<P, F>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
    where
        P: SlotPlugin,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.slot
            .insert(id.into(), Arc::new(move || Arc::new(factory()) as Arc<dyn SlotPlugin>));
        self
    }

    /// Registers a track factory. A later registration replaces an earlier one.
    pub fn register_track<P, F>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
    where
        P: TrackPlugin,
        F: Fn() -> P + Send + Sync + 'static,
    {
        self.track
            .insert(id.into(), Arc::new(move || Arc::new(factory()) as Arc<dyn TrackPlugin>));
        self
    }

    /// Registers one shared slot instance; every resolve returns it.
    pub fn register_slot_instance(&mut self, id: impl Into<String>, plugin: Arc<dyn SlotPlugin>) -> &mut Self {
        self.slot.insert(id.into(), Arc::new(move || Arc::clone(&plugin)));
        self
    }

    /// Registers one shared track instance; every resolve returns it.
    pub fn register_track_instance(&mut self, id: impl Into<String>, plugin: Arc<dyn TrackPlugin>) -> &mut Self {
        self.track.insert(id.into(), Arc::new(move || Arc::clone(&plugin)));
        self
    }

    /// True if any capability is registered under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.slot.contains_key(id) || self.track.contains_key(id)
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.slot.keys().chain(self.track.keys()).map(String::as_str).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Builds a handle with fresh capability instances.
    pub fn resolve(&self, id: &str) -> Option<PluginHandle> {
        let slot = self.slot.get(id).map(|f| f());
        let track = self.track.get(id).map(|f| f());
        if slot.is_none() && track.is_none() {
            return None;
        }
        Some(PluginHandle {
            id: id.into(),
            slot,
            track,
        })
    }
}
