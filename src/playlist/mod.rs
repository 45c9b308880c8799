//! Continuous playback: tracks advanced by `NextTrack` messages.

mod layer;

pub use layer::{LayerState, PlaylistLayer};
