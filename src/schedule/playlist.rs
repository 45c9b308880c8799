//! Playlists: ordered, cyclic track lists.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One entry of a playlist.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Identifier, unique within its playlist.
    pub id: String,
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Identifier of the plugin that plays the track.
    pub plugin_name: String,
    /// Opaque plugin content.
    #[serde(default)]
    pub content: serde_json::Value,
}

impl Track {
    /// Creates a track with empty content.
    pub fn new(id: impl Into<String>, plugin_name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            plugin_name: plugin_name.into(),
            content: serde_json::Value::Null,
        }
    }

    /// Sets the plugin content.
    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.content = content;
        self
    }
}

/// An ordered list of tracks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    /// Identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Tracks in play order.
    #[serde(default)]
    pub items: Vec<Track>,
}

impl Playlist {
    /// Creates an empty playlist.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            items: Vec::new(),
        }
    }

    /// Appends a track.
    pub fn with_track(mut self, track: Track) -> Self {
        self.items.push(track);
        self
    }

    /// Parses a playlist document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::malformed("playlist", e))
    }

    /// Returns every issue found; an empty playlist cannot be played.
    pub fn validate(&self) -> Vec<String> {
        if self.items.is_empty() {
            vec![format!("playlist '{}' has no tracks", self.name)]
        } else {
            Vec::new()
        }
    }
}

/// Position `(playlist index, track index)` following `pos`.
///
/// Advances to the next track, wrapping to the next playlist (and from the
/// last playlist back to the first). Returns `None` when there is nothing to
/// play.
pub fn next_position(playlists: &[Playlist], pos: (usize, usize)) -> Option<(usize, usize)> {
    let (p, t) = pos;
    let current = playlists.get(p)?;
    if t + 1 < current.items.len() {
        return Some((p, t + 1));
    }
    let next = (p + 1) % playlists.len();
    if playlists[next].items.is_empty() {
        return None;
    }
    Some((next, 0))
}
