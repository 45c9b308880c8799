//! # Messages exchanged between actor tasks.
//!
//! The [`MessageKind`] enum classifies messages in two groups:
//! - **Control**: `Quit` (terminates the receiving loop) and `Configure`.
//! - **Work**: ticks, asynchronous completions, alarms, display and playlist
//!   commands, telemetry, and an open `Custom` kind.
//!
//! A [`Message`] is an immutable envelope: it is created by the sender, cloned
//! once per recipient by the router, and consumed exactly once by each
//! recipient's loop.
//!
//! ## Ordering
//! Each message has a process-wide sequence number (`seq`) that increases
//! monotonically, which makes send order visible in logs.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use chrono::NaiveDateTime;

use crate::actor::Recipient;
use crate::error::WorkError;
use crate::messages::payload::Payload;
use crate::provider::ConfigProvider;

/// Global sequence counter for message ordering.
static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Minute heartbeat driving the trigger scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tick {
    /// Wall-clock (naive, local) instant of the tick.
    pub ts: NaiveDateTime,
    /// Sequence number assigned by the tick source.
    pub seq: u64,
}

/// Request to (re)load configuration from a provider.
#[derive(Clone)]
pub struct ConfigureRequest {
    /// Correlation token echoed in the [`ConfigureNotify`] reply.
    pub token: Arc<str>,
    /// Source of schedules, playlists and plugins.
    pub provider: Arc<dyn ConfigProvider>,
    /// Where to send the reply, if anywhere.
    pub notify: Option<Arc<dyn Recipient>>,
}

impl ConfigureRequest {
    /// Creates a request without a reply recipient.
    pub fn new(token: impl Into<Arc<str>>, provider: Arc<dyn ConfigProvider>) -> Self {
        Self {
            token: token.into(),
            provider,
            notify: None,
        }
    }

    /// Sets the recipient of the [`ConfigureNotify`] reply.
    pub fn with_notify(mut self, notify: Arc<dyn Recipient>) -> Self {
        self.notify = Some(notify);
        self
    }

    /// Sends the reply, if a recipient was given. Failures are ignored.
    pub(crate) fn reply(&self, source: &str, error: Option<String>) {
        if let Some(to) = &self.notify {
            let _ = to.send(Message::now(MessageKind::ConfigureNotify(ConfigureNotify {
                token: self.token.clone(),
                source: source.into(),
                error,
            })));
        }
    }
}

/// Outcome of a [`ConfigureRequest`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigureNotify {
    /// Token of the originating request.
    pub token: Arc<str>,
    /// Name of the task that processed the request.
    pub source: Arc<str>,
    /// Error description when loading or validation failed.
    pub error: Option<String>,
}

impl ConfigureNotify {
    /// True if configuration was accepted.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Completion of one unit of asynchronous work submitted by a plugin.
#[derive(Clone, Debug)]
pub struct FutureCompleted {
    /// Plugin identity that submitted the work.
    pub plugin: Arc<str>,
    /// Generation of the active-plugin record that submitted the work.
    pub generation: u64,
    /// Logical token chosen by the plugin.
    pub token: Arc<str>,
    /// Result or failure of the work.
    pub outcome: Result<Payload, WorkError>,
}

impl FutureCompleted {
    /// True if the work returned normally.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Returns the result, if the work succeeded.
    pub fn result(&self) -> Option<&Payload> {
        self.outcome.as_ref().ok()
    }

    /// Returns the error, if the work failed.
    pub fn error(&self) -> Option<&WorkError> {
        self.outcome.as_ref().err()
    }
}

/// A plugin-requested wake-up delivered by the timer service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlarmExpired {
    /// Plugin identity that armed the alarm.
    pub plugin: Arc<str>,
    /// Generation of the record that armed the alarm.
    pub generation: u64,
    /// Wake time that was requested.
    pub wake: NaiveDateTime,
}

/// Image handed to the display sink. The image itself is opaque.
#[derive(Clone, Debug)]
pub struct DisplayImage {
    /// Human-readable title.
    pub title: String,
    /// Rendered image, passed through untouched.
    pub image: Payload,
}

/// Display properties announced by the display side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplaySettings {
    /// Driver name.
    pub name: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Operational data published on the `"telemetry"` route.
#[derive(Clone, Debug, PartialEq)]
pub struct Telemetry {
    /// Name of the publishing task.
    pub source: Arc<str>,
    /// Ordered key/value pairs.
    pub values: BTreeMap<String, serde_json::Value>,
}

impl Telemetry {
    /// Creates an empty telemetry record.
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self {
            source: source.into(),
            values: BTreeMap::new(),
        }
    }

    /// Adds a value.
    #[inline]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Returns a value by key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }
}

/// Application-defined message.
#[derive(Clone, Debug)]
pub struct CustomMessage {
    /// Discriminating name.
    pub name: Arc<str>,
    /// Opaque content.
    pub payload: Payload,
}

/// Classification of messages.
#[derive(Clone)]
pub enum MessageKind {
    // === Control ===
    /// Terminates the receiving task after its quit hook runs.
    Quit,
    /// Load configuration from a provider.
    Configure(ConfigureRequest),

    // === Work ===
    /// Reply to `Configure`.
    ConfigureNotify(ConfigureNotify),
    /// Minute heartbeat.
    Tick(Tick),
    /// Asynchronous work finished.
    FutureCompleted(FutureCompleted),
    /// A plugin alarm fired.
    AlarmExpired(AlarmExpired),
    /// Image for the display sink.
    DisplayImage(DisplayImage),
    /// Display resolution update.
    DisplaySettings(DisplaySettings),
    /// Start the playlist from its first track.
    StartPlayback,
    /// Advance the playlist by one track. An advance requested by a track
    /// carries that track's record generation and is dropped once the track
    /// is no longer current.
    NextTrack(Option<u64>),
    /// Operational data.
    Telemetry(Telemetry),
    /// Application-defined message.
    Custom(CustomMessage),
}

impl MessageKind {
    /// Short stable name (snake_case) for logs.
    pub fn name(&self) -> &'static str {
        match self {
            MessageKind::Quit => "quit",
            MessageKind::Configure(_) => "configure",
            MessageKind::ConfigureNotify(_) => "configure_notify",
            MessageKind::Tick(_) => "tick",
            MessageKind::FutureCompleted(_) => "future_completed",
            MessageKind::AlarmExpired(_) => "alarm_expired",
            MessageKind::DisplayImage(_) => "display_image",
            MessageKind::DisplaySettings(_) => "display_settings",
            MessageKind::StartPlayback => "start_playback",
            MessageKind::NextTrack(_) => "next_track",
            MessageKind::Telemetry(_) => "telemetry",
            MessageKind::Custom(_) => "custom",
        }
    }

    /// True for `Quit` and `Configure`.
    pub fn is_control(&self) -> bool {
        matches!(self, MessageKind::Quit | MessageKind::Configure(_))
    }
}

impl fmt::Debug for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Tick(t) => write!(f, "Tick({}, #{})", t.ts, t.seq),
            MessageKind::FutureCompleted(c) => write!(
                f,
                "FutureCompleted({}#{} {} ok={})",
                c.plugin,
                c.generation,
                c.token,
                c.is_success()
            ),
            MessageKind::Configure(c) => write!(f, "Configure({})", c.token),
            MessageKind::Custom(c) => write!(f, "Custom({})", c.name),
            other => f.write_str(other.name()),
        }
    }
}

/// Immutable message envelope.
///
/// - `seq`: monotonic global sequence
/// - `at`: wall-clock creation time
#[derive(Clone, Debug)]
pub struct Message {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Creation timestamp.
    pub at: SystemTime,
    /// Payload.
    pub kind: MessageKind,
}

impl Message {
    /// Creates a message with the current timestamp and the next sequence number.
    pub fn now(kind: MessageKind) -> Self {
        Self {
            seq: MESSAGE_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
        }
    }

    /// `Quit` message.
    #[inline]
    pub fn quit() -> Self {
        Self::now(MessageKind::Quit)
    }

    /// `Tick` message.
    #[inline]
    pub fn tick(ts: NaiveDateTime, seq: u64) -> Self {
        Self::now(MessageKind::Tick(Tick { ts, seq }))
    }

    /// `Configure` message.
    #[inline]
    pub fn configure(request: ConfigureRequest) -> Self {
        Self::now(MessageKind::Configure(request))
    }

    /// `NextTrack` message.
    #[inline]
    pub fn next_track() -> Self {
        Self::now(MessageKind::NextTrack(None))
    }

    /// `NextTrack` message bound to the track record with `generation`.
    #[inline]
    pub fn next_track_from(generation: u64) -> Self {
        Self::now(MessageKind::NextTrack(Some(generation)))
    }

    /// `StartPlayback` message.
    #[inline]
    pub fn start_playback() -> Self {
        Self::now(MessageKind::StartPlayback)
    }

    /// `DisplayImage` message.
    #[inline]
    pub fn display_image(title: impl Into<String>, image: Payload) -> Self {
        Self::now(MessageKind::DisplayImage(DisplayImage {
            title: title.into(),
            image,
        }))
    }

    /// `DisplaySettings` message.
    #[inline]
    pub fn display_settings(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self::now(MessageKind::DisplaySettings(DisplaySettings {
            name: name.into(),
            width,
            height,
        }))
    }

    /// `Telemetry` message.
    #[inline]
    pub fn telemetry(t: Telemetry) -> Self {
        Self::now(MessageKind::Telemetry(t))
    }

    /// `Custom` message.
    #[inline]
    pub fn custom(name: impl Into<Arc<str>>, payload: Payload) -> Self {
        Self::now(MessageKind::Custom(CustomMessage {
            name: name.into(),
            payload,
        }))
    }

    #[inline]
    pub fn is_quit(&self) -> bool {
        matches!(self.kind, MessageKind::Quit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Message::quit();
        let b = Message::next_track();
        assert!(b.seq > a.seq);
    }

    #[test]
    fn control_kinds() {
        assert!(Message::quit().kind.is_control());
        assert!(!Message::next_track().kind.is_control());
        assert_eq!(Message::start_playback().kind.name(), "start_playback");
    }

    #[test]
    fn future_completed_accessors() {
        let ok = FutureCompleted {
            plugin: "clock".into(),
            generation: 1,
            token: "fetch".into(),
            outcome: Ok(Payload::new(7u32)),
        };
        assert!(ok.is_success());
        assert_eq!(ok.result().and_then(|p| p.downcast_ref::<u32>()), Some(&7));

        let failed = FutureCompleted {
            outcome: Err(WorkError::Failed("offline".into())),
            ..ok
        };
        assert!(!failed.is_success());
        assert!(failed.result().is_none());
        assert_eq!(failed.error(), Some(&WorkError::Failed("offline".into())));
    }

    #[test]
    fn telemetry_builder() {
        let t = Telemetry::new("layer").with("current_track_index", 2);
        assert_eq!(t.get("current_track_index"), Some(&serde_json::json!(2)));
        assert!(t.get("missing").is_none());
    }
}
