//! # Playlist layer.
//!
//! [`PlaylistLayer`] plays tracks in order, one at a time, advancing on
//! `NextTrack` instead of minute ticks.
//!
//! ```text
//! Configure ok ─► loaded ─► (self) StartPlayback ─► start P0T0 ─► playing
//! NextTrack    ─► stop current (best effort) ─► advance with wraparound ─► start
//! hook error / unknown plugin ─► error   (NextTrack still advances)
//! ```
//!
//! A `NextTrack` sent by a track (directly or from its timer) names the
//! generation of that track's record; once another track is current it is
//! discarded, so one track never advances the playlist twice.
//!
//! Position `(playlist, track)` only moves forward. After the last track of a
//! playlist comes the first track of the next playlist; after the last
//! playlist comes playlist 0.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::actor::{ActorContext, Handler, Recipient};
use crate::error::{ConfigError, PluginError};
use crate::messages::{ConfigureRequest, Message, MessageKind, ROUTE_TELEMETRY, Router, Telemetry};
use crate::plugins::{
    ActivePlugin, ActivityState, KeyValueStore, MemoryStore, PluginHandle, TrackContext, TrackPlugin, call_hook,
};
use crate::provider::ConfigProvider;
use crate::schedule::{Playlist, Track, next_position, validate_playlists};
use crate::workers::{Clock, FutureSource, TimerCancel, TimerService, WorkerPool, local_clock};

/// Lifecycle state of the layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerState {
    /// No configuration received yet.
    Uninitialized,
    /// Playlists loaded; playback not started.
    Loaded,
    /// A track is playing.
    Playing,
    /// Configuration or the current track failed.
    Error,
}

impl LayerState {
    /// Short stable name (snake_case) for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerState::Uninitialized => "uninitialized",
            LayerState::Loaded => "loaded",
            LayerState::Playing => "playing",
            LayerState::Error => "error",
        }
    }
}

struct Current {
    track: Track,
    plugin: Option<Arc<dyn TrackPlugin>>,
    store: Arc<dyn KeyValueStore>,
    record: ActivePlugin,
    advance: Option<TimerCancel>,
}

struct Env<'a> {
    router: &'a Router,
    timers: &'a TimerService,
    me: &'a Arc<dyn Recipient>,
    resolution: (u32, u32),
    clock: &'a Clock,
}

impl Env<'_> {
    fn run<F>(&self, cur: &mut Current, hook: &'static str, f: F) -> Result<(), String>
    where
        F: FnOnce(&dyn TrackPlugin, &mut TrackContext<'_>, &Track) -> Result<(), PluginError>,
    {
        let Some(plugin) = cur.plugin.clone() else {
            return Err(format!("no plugin bound to track '{}'", cur.track.id));
        };
        let mut ctx = TrackContext::new(
            cur.store.as_ref(),
            self.resolution,
            (self.clock)(),
            self.router,
            self.timers,
            self.me,
            &mut cur.record,
            &mut cur.advance,
        );
        let track = &cur.track;
        call_hook(&track.plugin_name, hook, || f(plugin.as_ref(), &mut ctx, track))
    }
}

/// Message-driven track player.
pub struct PlaylistLayer {
    router: Arc<Router>,
    timers: TimerService,
    futures: WorkerPool,
    resolution: (u32, u32),
    clock: Clock,
    state: LayerState,
    provider: Option<Arc<dyn ConfigProvider>>,
    playlists: Vec<Playlist>,
    plugins: HashMap<String, PluginHandle>,
    position: Option<(usize, usize)>,
    current: Option<Current>,
    generation: u64,
}

impl PlaylistLayer {
    /// Creates an unconfigured layer.
    pub fn new(router: Arc<Router>, timers: TimerService, futures: WorkerPool, resolution: (u32, u32)) -> Self {
        Self {
            router,
            timers,
            futures,
            resolution,
            clock: local_clock(),
            state: LayerState::Uninitialized,
            provider: None,
            playlists: Vec::new(),
            plugins: HashMap::new(),
            position: None,
            current: None,
            generation: 0,
        }
    }

    /// Replaces the wall clock handed to track contexts.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LayerState {
        self.state
    }

    /// Current `(playlist index, track index)`.
    pub fn position(&self) -> Option<(usize, usize)> {
        self.position
    }

    /// Current track.
    pub fn current_track(&self) -> Option<&Track> {
        self.current.as_ref().map(|c| &c.track)
    }

    /// State of the current track's record.
    pub fn active_state(&self) -> Option<ActivityState> {
        self.current.as_ref().map(|c| c.record.state())
    }

    fn configure(&mut self, ctx: &ActorContext, req: &ConfigureRequest) {
        let actor = ctx.name();
        let loaded = req
            .provider
            .load_playlists()
            .and_then(|p| validate_playlists(&p).map(|()| p));

        match loaded {
            Ok(playlists) => {
                let me: Arc<dyn Recipient> = Arc::new(ctx.myself().clone());
                self.stop_current(actor, &me);
                info!(actor, playlists = playlists.len(), "playlists loaded");
                self.playlists = playlists;
                self.provider = Some(Arc::clone(&req.provider));
                self.plugins.clear();
                self.position = None;
                self.state = LayerState::Loaded;
                req.reply(actor, None);
                if let Err(e) = ctx.myself().send(Message::start_playback()) {
                    error!(actor, error = %e, "cannot schedule playback start");
                }
            }
            Err(e) => self.config_failed(actor, req, e),
        }
    }

    fn config_failed(&mut self, actor: &str, req: &ConfigureRequest, e: ConfigError) {
        error!(actor, error = %e, label = e.as_label(), "failed to load playlists");
        self.state = LayerState::Error;
        publish(
            &self.router,
            Telemetry::new(actor)
                .with("event", "configure")
                .with("state", self.state.as_str())
                .with("error", e.to_string()),
        );
        req.reply(actor, Some(e.to_string()));
    }

    fn next(&mut self, actor: &str, me: &Arc<dyn Recipient>, from: Option<u64>) {
        if let Some(generation) = from {
            let current = self.current.as_ref().map(|c| c.record.generation());
            if current != Some(generation) {
                debug!(actor, generation, current = ?current, "stale next track discarded");
                return;
            }
        }
        if self.playlists.is_empty() {
            warn!(actor, state = self.state.as_str(), "no playlists; next track ignored");
            return;
        }
        self.stop_current(actor, me);

        let next = match self.position {
            Some(pos) => next_position(&self.playlists, pos),
            None => Some((0, 0)),
        };
        match next {
            Some(pos) => self.start_at(actor, me, pos),
            None => {
                error!(actor, position = ?self.position, "nothing to play");
                self.state = LayerState::Error;
            }
        }
    }

    fn start_at(&mut self, actor: &str, me: &Arc<dyn Recipient>, pos: (usize, usize)) {
        self.position = Some(pos);
        let Some(track) = self.playlists.get(pos.0).and_then(|p| p.items.get(pos.1)).cloned() else {
            error!(actor, ?pos, "position out of range");
            self.state = LayerState::Error;
            return;
        };

        self.generation += 1;
        let generation = self.generation;
        let plugin = self.resolve_track_plugin(&track.plugin_name);
        let store: Arc<dyn KeyValueStore> = match &self.provider {
            Some(p) => p.plugin_store(&track.plugin_name),
            None => Arc::new(MemoryStore::new()),
        };
        let record = ActivePlugin::new(
            track.plugin_name.as_str(),
            generation,
            FutureSource::new(Arc::clone(me), self.futures.clone()),
        );
        info!(actor, playlist = pos.0, track = pos.1, track_id = %track.id, plugin = %track.plugin_name, generation, "track starting");

        let env = Env {
            router: &self.router,
            timers: &self.timers,
            me,
            resolution: self.resolution,
            clock: &self.clock,
        };
        let cur = self.current.insert(Current {
            track,
            plugin: plugin.as_ref().ok().cloned(),
            store,
            record,
            advance: None,
        });

        self.state = match plugin {
            Err(e) => {
                error!(actor, track_id = %cur.track.id, error = %e, "track cannot play");
                LayerState::Error
            }
            Ok(_) => match env.run(cur, "start", |p, c, t| p.start(c, t)) {
                Ok(()) => LayerState::Playing,
                Err(_) => LayerState::Error,
            },
        };

        publish(
            &self.router,
            Telemetry::new(actor)
                .with("event", "track_started")
                .with("current_playlist_index", pos.0)
                .with("current_track_index", pos.1)
                .with("track_id", cur.track.id.clone())
                .with("state", self.state.as_str()),
        );
    }

    fn stop_current(&mut self, actor: &str, me: &Arc<dyn Recipient>) {
        let Some(mut cur) = self.current.take() else {
            return;
        };
        cur.record.shutdown(true);
        if let Some(t) = cur.advance.take() {
            t.cancel();
        }
        debug!(actor, track_id = %cur.track.id, "track stopping");
        if cur.plugin.is_some() {
            let env = Env {
                router: &self.router,
                timers: &self.timers,
                me,
                resolution: self.resolution,
                clock: &self.clock,
            };
            let _ = env.run(&mut cur, "stop", |p, c, t| p.stop(c, t));
        }
    }

    fn deliver(&mut self, actor: &str, me: &Arc<dyn Recipient>, msg: &Message) {
        let env = Env {
            router: &self.router,
            timers: &self.timers,
            me,
            resolution: self.resolution,
            clock: &self.clock,
        };
        let Some(cur) = self.current.as_mut() else {
            debug!(actor, kind = msg.kind.name(), "no current track; message dropped");
            return;
        };
        if cur.plugin.is_none() {
            return;
        }

        let result = match &msg.kind {
            MessageKind::FutureCompleted(done) => {
                if !cur.record.expects(done) {
                    warn!(actor, plugin = %done.plugin, generation = done.generation, token = %done.token, "stale completion discarded");
                    return;
                }
                if let Err(e) = cur.record.mark_processing() {
                    error!(actor, error = %e, "cannot process completion");
                    return;
                }
                let r = env.run(cur, "receive", |p, c, t| p.receive(c, t, msg));
                cur.record.mark_idle();
                r
            }
            _ => env.run(cur, "receive", |p, c, t| p.receive(c, t, msg)),
        };
        if result.is_err() {
            self.state = LayerState::Error;
        }
    }

    fn resolve_track_plugin(&mut self, id: &str) -> Result<Arc<dyn TrackPlugin>, String> {
        if !self.plugins.contains_key(id) {
            let provider = self.provider.as_ref().ok_or("no configuration provider")?;
            match provider.resolve_plugin(id) {
                Ok(Some(handle)) => {
                    self.plugins.insert(id.to_string(), handle);
                }
                Ok(None) => return Err(format!("plugin '{id}' is not available")),
                Err(e) => return Err(format!("plugin '{id}': {e}")),
            }
        }
        self.plugins
            .get(id)
            .and_then(|h| h.track().cloned())
            .ok_or_else(|| format!("plugin '{id}' has no track capability"))
    }
}

fn publish(router: &Router, t: Telemetry) {
    router.send(ROUTE_TELEMETRY, Message::telemetry(t));
}

#[async_trait]
impl Handler for PlaylistLayer {
    async fn execute(&mut self, ctx: &ActorContext, msg: Message) -> anyhow::Result<()> {
        let actor = ctx.name();
        let me: Arc<dyn Recipient> = Arc::new(ctx.myself().clone());

        match &msg.kind {
            MessageKind::Configure(req) => self.configure(ctx, req),
            MessageKind::StartPlayback => match self.state {
                LayerState::Loaded => self.start_at(actor, &me, (0, 0)),
                other => debug!(actor, state = other.as_str(), "start playback ignored"),
            },
            MessageKind::NextTrack(from) => self.next(actor, &me, *from),
            MessageKind::DisplaySettings(s) => {
                info!(actor, display = %s.name, width = s.width, height = s.height, "display settings");
                self.resolution = (s.width, s.height);
            }
            MessageKind::FutureCompleted(_) | MessageKind::Custom(_) => self.deliver(actor, &me, &msg),
            other => debug!(actor, kind = other.name(), "ignored"),
        }
        Ok(())
    }

    async fn on_quit(&mut self, ctx: &ActorContext, _msg: &Message) -> anyhow::Result<()> {
        let me: Arc<dyn Recipient> = Arc::new(ctx.myself().clone());
        self.stop_current(ctx.name(), &me);
        info!(actor = ctx.name(), "quit");
        Ok(())
    }
}
