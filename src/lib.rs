//! # billboard
//!
//! **Billboard** is the runtime of an e-ink billboard: it decides which display
//! plugin runs at any given minute and drives that plugin through its
//! lifecycle, or plays content from playlists one track after another.
//!
//! Everything is built from actor tasks: each task owns a private ordered
//! inbox and processes one message at a time, so task state needs no locks.
//! Tasks talk only through messages, addressed directly or published on named
//! routes.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌────────────┐  "tick"  ┌──────────────────────────────────────────┐
//!  │ TickSource ├─────────►│ TriggerScheduler (actor task)            │
//!  └────────────┘          │ - MasterTable ─► TimedSchedule ─► slot   │
//!                          │ - ActivePlugin record per slot           │
//!                          └──┬─────────────┬───────────────┬─────────┘
//!                             │ hooks       │ work / alarms │ telemetry
//!                             ▼             ▼               ▼
//!                       SlotPlugin    FutureSource     Router("telemetry")
//!                             │       TimerService
//!                             ▼             │
//!                     Router("display")     └─► FutureCompleted / AlarmExpired
//!                             │                 back to the scheduler inbox
//!                             ▼
//!                        DisplaySink ─► DisplayDriver
//!
//!  PlaylistLayer (optional actor task): StartPlayback / NextTrack
//!    ─► TrackPlugin start / receive / stop, same records, pools and routes
//! ```
//!
//! ### Slot lifecycle
//! ```text
//! tick ─► evaluate(master, schedules, minute)
//!   ├─ new (schedule, slot) ─► end previous: shutdown record, on_slot_end
//!   │                          start: new record, on_slot_start, on_slot_run if idle
//!   ├─ same slot            ─► wake if alarm passed, on_slot_run if idle
//!   └─ nothing selected     ─► hold
//!
//! ActivePlugin: idle ─submit─► awaiting-result ─completion─► processing-result ─► idle
//!               idle ─alarm──► sleeping ─wake────► idle
//!               any  ─end────► terminated
//! ```
//!
//! ## Features
//! | Area               | Description                                           | Key types / traits                             |
//! |--------------------|-------------------------------------------------------|------------------------------------------------|
//! | **Actor tasks**    | Private inboxes, one message at a time, `Quit`.       | [`Handler`], [`ActorRef`], [`spawn_actor`]     |
//! | **Routing**        | Named fan-out routes.                                 | [`Router`], [`Message`], [`MessageKind`]       |
//! | **Workers**        | Bounded pools, one-shot timers, async work.           | [`WorkerPool`], [`TimerService`], [`FutureSource`] |
//! | **Scheduling**     | Triggers, timed schedules, per-minute evaluation.     | [`TriggerScheduler`], [`MasterTable`], [`TimedSchedule`] |
//! | **Playback**       | Cyclic playlists advanced by messages.                | [`PlaylistLayer`], [`Playlist`]                |
//! | **Plugins**        | Slot and track capabilities, activity records.        | [`SlotPlugin`], [`TrackPlugin`], [`ActivePlugin`] |
//! | **Configuration**  | Runtime settings and document providers.              | [`RuntimeConfig`], [`ConfigProvider`]          |
//! | **Errors**         | Typed errors per layer.                               | [`RuntimeError`], [`StateError`], [`ConfigError`] |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use billboard::{
//!     MasterEntry, MasterTable, PluginError, PluginRegistry, RecordingDriver, Runtime,
//!     RuntimeConfig, SlotContext, SlotPlugin, StaticProvider, TimeSlot, TimedSchedule, Trigger,
//!     Payload,
//! };
//!
//! struct Clock;
//!
//! impl SlotPlugin for Clock {
//!     fn on_slot_start(&self, _ctx: &mut SlotContext<'_>) -> Result<(), PluginError> {
//!         Ok(())
//!     }
//!
//!     fn on_slot_run(&self, ctx: &mut SlotContext<'_>) -> Result<(), PluginError> {
//!         let face = ctx.now().format("%H:%M").to_string();
//!         ctx.display(face, Payload::new(()));
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = PluginRegistry::new();
//!     registry.register_slot("clock", || Clock);
//!
//!     let provider = StaticProvider::new(registry)
//!         .with_master(MasterTable::new("daily").with_entry(MasterEntry::new(
//!             "every-day",
//!             Trigger::DayOfWeek { days: (0..7).collect() },
//!             "daily",
//!         )))
//!         .with_schedule(
//!             TimedSchedule::new("s1", "daily").with_slot(TimeSlot::new("all-day", "Clock", 0, 1440, "clock")),
//!         );
//!
//!     let driver = RecordingDriver::new();
//!     let mut rt = Runtime::builder(RuntimeConfig::default())
//!         .with_display_driver(driver.clone())
//!         .build();
//!     rt.configure(Arc::new(provider), None)?;
//!     rt.start_ticks();
//!
//!     // rt.run_until_signal().await?;
//!     rt.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod actor;
mod config;
mod core;
mod error;
mod messages;
mod playlist;
mod plugins;
mod provider;
mod schedule;
mod scheduler;
mod sinks;
mod workers;

// ---- Public re-exports ----

pub use actor::{ActorContext, ActorRef, ActorTask, Handler, Mailbox, Recipient, spawn_actor};
pub use config::RuntimeConfig;
pub use self::core::{Runtime, RuntimeBuilder};
pub use error::{ConfigError, PluginError, RuntimeError, StateError, WorkError};
pub use messages::{
    AlarmExpired, ConfigureNotify, ConfigureRequest, CustomMessage, DisplayImage, DisplaySettings,
    FutureCompleted, Message, MessageKind, Payload, ROUTE_DISPLAY, ROUTE_TELEMETRY, ROUTE_TICK, Router,
    Telemetry, Tick,
};
pub use playlist::{LayerState, PlaylistLayer};
pub use plugins::{
    ActivePlugin, ActivityState, KeyValueStore, MemoryStore, PluginHandle, PluginRegistry, SlotContext,
    SlotPlugin, TrackContext, TrackPlugin,
};
pub use provider::{ConfigProvider, StaticProvider};
pub use schedule::{
    MasterEntry, MasterTable, Overlap, Playlist, TimeSlot, TimedSchedule, Track, Trigger, next_position,
    validate_playlists, validate_schedules,
};
pub use scheduler::{Evaluation, SchedulerState, SelectionKey, TriggerScheduler, evaluate, truncate_to_minute};
pub use sinks::{DisplayDriver, DisplaySink, RecordingDriver, TelemetryBuffer, TelemetryLog};
pub use workers::{
    CancelRequest, Clock, Completion, FutureSource, TickSource, TickerHandle, TimerCancel, TimerHandle, TimerService,
    WorkerPool, local_clock,
};
