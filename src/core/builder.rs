use std::sync::Arc;

use crate::actor::{Recipient, spawn_actor};
use crate::config::RuntimeConfig;
use crate::core::runtime::Runtime;
use crate::messages::{ROUTE_DISPLAY, ROUTE_TELEMETRY, ROUTE_TICK, Router};
use crate::playlist::PlaylistLayer;
use crate::scheduler::TriggerScheduler;
use crate::sinks::{DisplayDriver, DisplaySink, TelemetryLog};
use crate::workers::{Clock, TimerService, WorkerPool, local_clock};

/// Task names used by the runtime.
pub(crate) const SCHEDULER: &str = "scheduler";
pub(crate) const PLAYLIST: &str = "playlist";
pub(crate) const DISPLAY: &str = "display";
pub(crate) const TELEMETRY: &str = "telemetry";

/// Builder for a [`Runtime`].
///
/// ## Example
/// ```rust
/// use billboard::{RecordingDriver, Runtime, RuntimeConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let driver = RecordingDriver::new();
/// let rt = Runtime::builder(RuntimeConfig::default())
///     .with_display_driver(driver.clone())
///     .with_playlist_layer()
///     .build();
///
/// assert!(rt.playlist().is_some());
/// rt.shutdown().await.unwrap();
/// # }
/// ```
pub struct RuntimeBuilder {
    cfg: RuntimeConfig,
    display: DisplaySink,
    playlist: bool,
    telemetry: Vec<Arc<dyn Recipient>>,
    telemetry_log: bool,
    clock: Clock,
}

impl RuntimeBuilder {
    /// Creates a builder: scheduler and a driverless display sink only.
    pub fn new(cfg: RuntimeConfig) -> Self {
        Self {
            cfg,
            display: DisplaySink::new(),
            playlist: false,
            telemetry: Vec::new(),
            telemetry_log: false,
            clock: local_clock(),
        }
    }

    /// Attaches a driver to the display sink.
    pub fn with_display_driver(mut self, driver: impl DisplayDriver) -> Self {
        self.display = self.display.with_driver(driver);
        self
    }

    /// Also spawns the playlist layer.
    pub fn with_playlist_layer(mut self) -> Self {
        self.playlist = true;
        self
    }

    /// Adds a recipient to the `"telemetry"` route.
    pub fn with_telemetry(mut self, recipient: Arc<dyn Recipient>) -> Self {
        self.telemetry.push(recipient);
        self
    }

    /// Spawns a [`TelemetryLog`] task on the `"telemetry"` route.
    pub fn with_telemetry_log(mut self) -> Self {
        self.telemetry_log = true;
        self
    }

    /// Replaces the wall clock used by the tick source and the playlist layer.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Creates the pools, spawns every task and registers the routes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Runtime {
        let router = Arc::new(Router::new());
        let timers = TimerService::with_pool(WorkerPool::new("timers", self.cfg.timer_workers_clamped()));
        let futures = WorkerPool::new("futures", self.cfg.future_workers_clamped());
        let resolution = self.cfg.resolution;

        let scheduler = spawn_actor(
            SCHEDULER,
            TriggerScheduler::new(Arc::clone(&router), timers.clone(), futures.clone(), resolution),
        );
        let display = spawn_actor(DISPLAY, self.display);
        let playlist = self.playlist.then(|| {
            let layer = PlaylistLayer::new(Arc::clone(&router), timers.clone(), futures.clone(), resolution)
                .with_clock(Arc::clone(&self.clock));
            spawn_actor(PLAYLIST, layer)
        });
        let telemetry = self.telemetry_log.then(|| spawn_actor(TELEMETRY, TelemetryLog::new()));

        router.add_route(ROUTE_TICK, vec![Arc::new(scheduler.actor.clone())]);
        router.add_route(ROUTE_DISPLAY, vec![Arc::new(display.actor.clone())]);

        let mut sinks = self.telemetry;
        if let Some(t) = &telemetry {
            sinks.push(Arc::new(t.actor.clone()));
        }
        if !sinks.is_empty() {
            router.add_route(ROUTE_TELEMETRY, sinks);
        }

        Runtime::new(self.cfg, router, timers, futures, scheduler, display, playlist, telemetry, self.clock)
    }
}
