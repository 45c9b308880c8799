//! # Runtime: running tasks, configuration and graceful shutdown.
//!
//! ## Wiring
//! ```text
//! TickSource ──► Router("tick") ─────► scheduler ──┐
//!                                                  ├─► Router("display")   ─► display sink
//!        (optional) playlist layer ────────────────┤
//!                                                  └─► Router("telemetry") ─► telemetry sinks
//!
//! scheduler / playlist ──► futures pool (plugin work) ──► FutureCompleted ──► back to the task
//!                     └──► timers pool  (alarms, next-track) ──► back to the task
//! ```
//!
//! ## Shutdown path
//! ```text
//! shutdown()
//!   ├─► stop tick source
//!   ├─► Quit to every actor task (each runs its quit hook, then exits)
//!   ├─► shut down timer and work pools (cancels plugin work)
//!   └─► wait up to cfg.grace for task loops and pools:
//!          ├─ all done  ─► Ok(())
//!          └─ timeout   ─► Err(GraceExceeded { stuck })
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{join, join_all};
use tracing::{info, warn};

use crate::actor::{ActorRef, ActorTask, Recipient};
use crate::config::RuntimeConfig;
use crate::core::builder::RuntimeBuilder;
use crate::core::shutdown;
use crate::error::RuntimeError;
use crate::messages::{ConfigureRequest, Message, Router};
use crate::provider::ConfigProvider;
use crate::workers::{Clock, TickSource, TickerHandle, TimerService, WorkerPool};

/// A running billboard: actor tasks, pools and routes.
pub struct Runtime {
    cfg: RuntimeConfig,
    router: Arc<Router>,
    timers: TimerService,
    futures: WorkerPool,
    scheduler: ActorTask,
    display: ActorTask,
    playlist: Option<ActorTask>,
    telemetry: Option<ActorTask>,
    ticker: Option<TickerHandle>,
    clock: Clock,
    configure_seq: AtomicU64,
}

impl Runtime {
    /// Starts building a runtime.
    pub fn builder(cfg: RuntimeConfig) -> RuntimeBuilder {
        RuntimeBuilder::new(cfg)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        cfg: RuntimeConfig,
        router: Arc<Router>,
        timers: TimerService,
        futures: WorkerPool,
        scheduler: ActorTask,
        display: ActorTask,
        playlist: Option<ActorTask>,
        telemetry: Option<ActorTask>,
        clock: Clock,
    ) -> Self {
        Self {
            cfg,
            router,
            timers,
            futures,
            scheduler,
            display,
            playlist,
            telemetry,
            ticker: None,
            clock,
            configure_seq: AtomicU64::new(0),
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.cfg
    }

    /// Shared router.
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Address of the trigger scheduler.
    pub fn scheduler(&self) -> &ActorRef {
        &self.scheduler.actor
    }

    /// Address of the playlist layer, if spawned.
    pub fn playlist(&self) -> Option<&ActorRef> {
        self.playlist.as_ref().map(|t| &t.actor)
    }

    /// Address of the display sink.
    pub fn display(&self) -> &ActorRef {
        &self.display.actor
    }

    /// Timer service shared by the scheduling tasks.
    pub fn timers(&self) -> &TimerService {
        &self.timers
    }

    /// Sends `Configure` to the scheduler and, if present, the playlist layer.
    ///
    /// Each task replies `ConfigureNotify` to `notify` once it has loaded
    /// (or failed to load) its documents. Returns the request token.
    pub fn configure(
        &self,
        provider: Arc<dyn ConfigProvider>,
        notify: Option<Arc<dyn Recipient>>,
    ) -> Result<Arc<str>, RuntimeError> {
        let n = self.configure_seq.fetch_add(1, Ordering::Relaxed);
        let token: Arc<str> = format!("configure-{n}").into();
        let mut req = ConfigureRequest::new(Arc::clone(&token), provider);
        if let Some(to) = notify {
            req = req.with_notify(to);
        }

        info!(token = %token, "configuration requested");
        for task in self.scheduling_tasks() {
            task.send(Message::configure(req.clone()))?;
        }
        Ok(token)
    }

    /// Announces the display resolution to the scheduling tasks.
    pub fn display_settings(&self, name: &str, width: u32, height: u32) -> Result<(), RuntimeError> {
        for task in self.scheduling_tasks() {
            task.send(Message::display_settings(name, width, height))?;
        }
        Ok(())
    }

    /// Starts the tick source. A second call is a no-op.
    pub fn start_ticks(&mut self) {
        if self.ticker.is_some() {
            return;
        }
        let source = TickSource::new(Arc::clone(&self.router), &self.cfg).with_clock(Arc::clone(&self.clock));
        self.ticker = Some(source.spawn());
    }

    /// Waits for a termination signal, then shuts down.
    pub async fn run_until_signal(self) -> Result<(), RuntimeError> {
        match shutdown::wait_for_signal().await {
            Ok(signal) => info!(signal, "shutdown requested"),
            Err(e) => warn!(error = %e, "cannot listen for signals; shutting down"),
        }
        self.shutdown().await
    }

    /// Stops ticks, quits every task, shuts the pools down and waits up to
    /// the configured grace period.
    pub async fn shutdown(mut self) -> Result<(), RuntimeError> {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop().await;
        }

        let mut tasks: Vec<ActorTask> = [Some(self.scheduler), self.playlist, Some(self.display), self.telemetry]
            .into_iter()
            .flatten()
            .collect();
        for task in &tasks {
            if let Err(e) = task.actor.send(Message::quit()) {
                warn!(task = task.actor.name(), error = %e, "quit not delivered");
            }
        }
        self.timers.shutdown();
        self.futures.shutdown();

        let grace = self.cfg.grace;
        let loops = join_all(tasks.iter_mut().map(|t| &mut t.join));
        let pools = join(self.timers.join(), self.futures.join());

        let outcome = tokio::time::timeout(grace, join(loops, pools)).await;
        match outcome {
            Ok(_) => {
                info!("all tasks stopped within grace");
                Ok(())
            }
            Err(_) => {
                let mut stuck: Vec<String> = tasks
                    .iter()
                    .filter(|t| !t.join.is_finished())
                    .map(|t| t.actor.name().to_string())
                    .collect();
                if self.timers.pending() > 0 {
                    stuck.push("timers".into());
                }
                if self.futures.pending() > 0 {
                    stuck.push(self.futures.name().to_string());
                }
                warn!(?grace, ?stuck, "grace exceeded");
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    fn scheduling_tasks(&self) -> impl Iterator<Item = &ActorRef> {
        std::iter::once(&self.scheduler.actor).chain(self.playlist.as_ref().map(|t| &t.actor))
    }
}
