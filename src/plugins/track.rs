//! Track capability: plugins driven by the playlist layer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio_util::sync::CancellationToken;

use crate::actor::Recipient;
use crate::error::{PluginError, RuntimeError, StateError, WorkError};
use crate::messages::{Message, Payload, ROUTE_DISPLAY, Router};
use crate::plugins::active::{ActivePlugin, ActivityState};
use crate::plugins::store::KeyValueStore;
use crate::schedule::Track;
use crate::workers::{TimerCancel, TimerService};

/// Contract of a plugin that plays playlist tracks.
///
/// A track ends when the plugin (or a timer it armed) sends `NextTrack` to the
/// layer; see [`TrackContext::next_track`] and [`TrackContext::next_track_in`].
pub trait TrackPlugin: Send + Sync + 'static {
    /// The track became current.
    fn start(&self, ctx: &mut TrackContext<'_>, track: &Track) -> Result<(), PluginError>;

    /// A completion or custom message for the current track.
    fn receive(&self, _ctx: &mut TrackContext<'_>, _track: &Track, _msg: &Message) -> Result<(), PluginError> {
        Ok(())
    }

    /// The track is being replaced. Errors are logged only.
    fn stop(&self, _ctx: &mut TrackContext<'_>, _track: &Track) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Everything a track hook may use.
pub struct TrackContext<'a> {
    store: &'a dyn KeyValueStore,
    resolution: (u32, u32),
    now: NaiveDateTime,
    router: &'a Router,
    timers: &'a TimerService,
    layer: &'a Arc<dyn Recipient>,
    record: &'a mut ActivePlugin,
    advance: &'a mut Option<TimerCancel>,
}

impl<'a> TrackContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        store: &'a dyn KeyValueStore,
        resolution: (u32, u32),
        now: NaiveDateTime,
        router: &'a Router,
        timers: &'a TimerService,
        layer: &'a Arc<dyn Recipient>,
        record: &'a mut ActivePlugin,
        advance: &'a mut Option<TimerCancel>,
    ) -> Self {
        Self {
            store,
            resolution,
            now,
            router,
            timers,
            layer,
            record,
            advance,
        }
    }

    /// The plugin's persistent store.
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store
    }

    /// Display resolution `(width, height)`.
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    /// Wall-clock time of the hook call.
    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// State of the track's activity record.
    pub fn state(&self) -> ActivityState {
        self.record.state()
    }

    /// Router, for publishing on any route.
    pub fn router(&self) -> &Router {
        self.router
    }

    /// Sends an image to the display sink.
    pub fn display(&self, title: impl Into<String>, image: Payload) -> usize {
        self.router.send(ROUTE_DISPLAY, Message::display_image(title, image))
    }

    /// Submits asynchronous work; the outcome arrives through
    /// [`TrackPlugin::receive`].
    pub fn future<T, W, Fut>(&mut self, token: impl Into<Arc<str>>, work: W) -> Result<(), StateError>
    where
        T: std::any::Any + Send + Sync,
        W: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, WorkError>> + Send + 'static,
    {
        self.record.submit_async(token, work)
    }

    /// Ends the current track now.
    pub fn next_track(&self) -> Result<(), RuntimeError> {
        self.layer.send(Message::next_track_from(self.record.generation()))
    }

    /// Ends the current track after `delay`. Replaces a previously armed
    /// advance; cancelled if the track is stopped first.
    pub fn next_track_in(&mut self, delay: Duration) -> Result<(), PluginError> {
        let (_handle, cancel) = self
            .timers
            .create_timer(
                delay,
                Some(Arc::clone(self.layer)),
                Message::next_track_from(self.record.generation()),
            )?;
        if let Some(prev) = self.advance.replace(cancel) {
            prev.cancel();
        }
        Ok(())
    }
}
