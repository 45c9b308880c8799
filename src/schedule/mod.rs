//! Schedule documents and their evaluation.
//!
//! - [`MasterTable`] / [`MasterEntry`] / [`Trigger`]: which timed schedule is
//!   active on a given day
//! - [`TimedSchedule`] / [`TimeSlot`]: which plugin runs at a given minute
//! - [`Playlist`] / [`Track`]: ordered content for the playlist layer
//!
//! All documents are plain serde types; `from_json` helpers map parser errors
//! to [`ConfigError::Malformed`](crate::ConfigError::Malformed).

mod master;
mod playlist;
mod timed;
mod validate;

pub use master::{MasterEntry, MasterTable, Trigger};
pub use playlist::{Playlist, Track, next_position};
pub use timed::{Overlap, TimeSlot, TimedSchedule};
pub use validate::{validate_playlists, validate_schedules};
