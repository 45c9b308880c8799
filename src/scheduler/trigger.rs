//! # Trigger scheduler.
//!
//! [`TriggerScheduler`] is the actor handler that, on every tick, evaluates the
//! master table and timed schedules, and drives the selected slot's plugin
//! through its lifecycle.
//!
//! ## Per tick
//! ```text
//! tick ─► truncate to minute ─► evaluate
//!   ├─ nothing selected            ─► hold (current slot keeps running)
//!   ├─ first selection             ─► start: on_slot_start, on_slot_run if idle
//!   ├─ same (schedule, slot) key   ─► check alarm, on_slot_run if idle
//!   └─ different key               ─► end: shutdown record, on_slot_end
//!                                     start: new record, on_slot_start, on_slot_run if idle
//! ```
//!
//! ## Results and alarms
//! - `FutureCompleted` is delivered to `on_result` only if the current record
//!   expects it; everything else is stale and discarded.
//! - `AlarmExpired` for the current record wakes it and runs `on_slot_run`.
//!
//! ## States
//! `uninitialized` ─configure ok─► `loaded`; any configure failure ─► `error`.
//! A failed configure ends the running slot. Ticks, completions and alarms are
//! ignored outside `loaded`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::{debug, error, info, warn};

use crate::actor::{ActorContext, Handler, Recipient};
use crate::error::{ConfigError, PluginError};
use crate::messages::{
    AlarmExpired, ConfigureRequest, FutureCompleted, Message, MessageKind, ROUTE_TELEMETRY, Router, Telemetry, Tick,
};
use crate::plugins::{
    ActivePlugin, ActivityState, KeyValueStore, MemoryStore, PluginHandle, SlotContext, SlotPlugin, call_hook,
};
use crate::provider::ConfigProvider;
use crate::scheduler::evaluation::{Evaluation, SelectionKey, evaluate, truncate_to_minute};
use crate::schedule::{MasterTable, TimeSlot, TimedSchedule, validate_schedules};
use crate::workers::{FutureSource, TimerService, WorkerPool};

/// Lifecycle state of the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// No configuration received yet.
    Uninitialized,
    /// Schedules loaded and validated.
    Loaded,
    /// The last configuration failed.
    Error,
}

impl SchedulerState {
    /// Short stable name (snake_case) for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerState::Uninitialized => "uninitialized",
            SchedulerState::Loaded => "loaded",
            SchedulerState::Error => "error",
        }
    }
}

/// The running slot.
struct ActiveSlot {
    key: SelectionKey,
    timeslot: TimeSlot,
    plugin: Option<Arc<dyn SlotPlugin>>,
    store: Arc<dyn KeyValueStore>,
    record: ActivePlugin,
    since: NaiveDateTime,
}

/// Borrowed pieces every hook context needs.
struct Env<'a> {
    router: &'a Router,
    timers: &'a TimerService,
    me: &'a Arc<dyn Recipient>,
    resolution: (u32, u32),
}

impl Env<'_> {
    fn run<F>(&self, slot: &mut ActiveSlot, now: NaiveDateTime, hook: &'static str, f: F) -> Result<(), String>
    where
        F: FnOnce(&dyn SlotPlugin, &mut SlotContext<'_>) -> Result<(), PluginError>,
    {
        let Some(plugin) = slot.plugin.clone() else {
            return Err(format!("no plugin bound to '{}'", slot.key));
        };
        let mut ctx = SlotContext::new(
            &slot.timeslot,
            slot.store.as_ref(),
            self.resolution,
            now,
            self.router,
            self.timers,
            self.me,
            &mut slot.record,
        );
        call_hook(&slot.timeslot.plugin_name, hook, || f(plugin.as_ref(), &mut ctx))
    }
}

/// Tick-driven slot scheduler.
pub struct TriggerScheduler {
    router: Arc<Router>,
    timers: TimerService,
    futures: WorkerPool,
    resolution: (u32, u32),
    state: SchedulerState,
    provider: Option<Arc<dyn ConfigProvider>>,
    master: Option<MasterTable>,
    schedules: Vec<Arc<TimedSchedule>>,
    plugins: HashMap<String, PluginHandle>,
    current: Option<ActiveSlot>,
    generation: u64,
    last_tick: Option<NaiveDateTime>,
}

impl TriggerScheduler {
    /// Creates an unconfigured scheduler.
    pub fn new(router: Arc<Router>, timers: TimerService, futures: WorkerPool, resolution: (u32, u32)) -> Self {
        Self {
            router,
            timers,
            futures,
            resolution,
            state: SchedulerState::Uninitialized,
            provider: None,
            master: None,
            schedules: Vec::new(),
            plugins: HashMap::new(),
            current: None,
            generation: 0,
            last_tick: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Key of the running slot.
    pub fn current_selection(&self) -> Option<&SelectionKey> {
        self.current.as_ref().map(|c| &c.key)
    }

    /// State of the running slot's record.
    pub fn active_state(&self) -> Option<ActivityState> {
        self.current.as_ref().map(|c| c.record.state())
    }

    /// Display resolution handed to plugins.
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn configure(&mut self, actor: &str, me: &Arc<dyn Recipient>, req: &ConfigureRequest) {
        match load(req.provider.as_ref()) {
            Ok((master, schedules)) => {
                info!(
                    actor,
                    triggers = master.entries.len(),
                    schedules = schedules.len(),
                    "schedule loaded"
                );
                self.master = Some(master);
                self.schedules = schedules.into_iter().map(Arc::new).collect();
                self.provider = Some(Arc::clone(&req.provider));
                self.plugins.clear();
                self.state = SchedulerState::Loaded;
                publish(&self.router, Telemetry::new(actor).with("event", "configure").with("state", "loaded"));
                req.reply(actor, None);
            }
            Err(e) => {
                error!(actor, error = %e, label = e.as_label(), "failed to load schedules");
                self.state = SchedulerState::Error;
                if let Some(at) = self.current.as_ref().map(|c| self.last_tick.unwrap_or(c.since)) {
                    self.end_slot(actor, me, at);
                }
                publish(
                    &self.router,
                    Telemetry::new(actor)
                        .with("event", "configure")
                        .with("state", "error")
                        .with("error", e.to_string()),
                );
                req.reply(actor, Some(e.to_string()));
            }
        }
    }

    fn on_tick(&mut self, actor: &str, me: &Arc<dyn Recipient>, tick: &Tick) {
        let at = truncate_to_minute(tick.ts);
        self.last_tick = Some(at);

        if self.state != SchedulerState::Loaded {
            warn!(actor, state = self.state.as_str(), "waiting for configuration; tick ignored");
            return;
        }
        let Some(master) = self.master.as_ref() else {
            error!(actor, "no master schedule loaded");
            return;
        };

        debug!(actor, tick = tick.seq, %at, "evaluating");
        let evaluation = evaluate(master, &self.schedules, at);
        self.apply(actor, me, at, evaluation);
    }

    fn apply(&mut self, actor: &str, me: &Arc<dyn Recipient>, at: NaiveDateTime, evaluation: Option<Evaluation>) {
        if let Some(err) = evaluation.as_ref().and_then(|e| e.error.as_deref()) {
            warn!(actor, %at, error = err, "evaluation error");
        }

        let Some((key, evaluation)) = evaluation.and_then(|e| e.selection().map(|k| (k, e))) else {
            match &self.current {
                Some(cur) => debug!(actor, current = %cur.key, "no timeslot selected; holding"),
                None => debug!(actor, "no timeslot selected"),
            }
            return;
        };

        match self.current.as_ref().map(|c| c.key == key) {
            Some(true) => self.continue_slot(actor, me, at),
            Some(false) => {
                self.end_slot(actor, me, at);
                self.start_slot(actor, me, at, key, evaluation);
            }
            None => self.start_slot(actor, me, at, key, evaluation),
        }
    }

    fn start_slot(
        &mut self,
        actor: &str,
        me: &Arc<dyn Recipient>,
        at: NaiveDateTime,
        key: SelectionKey,
        evaluation: Evaluation,
    ) {
        let Some(timeslot) = evaluation.timeslot else {
            return;
        };
        self.generation += 1;
        let generation = self.generation;

        let resolved = match evaluation.error {
            Some(e) => Err(e),
            None => self.resolve_slot_plugin(&timeslot.plugin_name),
        };
        let (plugin, problem) = match resolved {
            Ok(p) => (Some(p), None),
            Err(e) => (None, Some(e)),
        };
        let store: Arc<dyn KeyValueStore> = match &self.provider {
            Some(p) => p.plugin_store(&timeslot.plugin_name),
            None => Arc::new(MemoryStore::new()),
        };
        let record = ActivePlugin::new(
            timeslot.plugin_name.as_str(),
            generation,
            FutureSource::new(Arc::clone(me), self.futures.clone()),
        );

        info!(actor, timeslot = %key, plugin = %timeslot.plugin_name, generation, trigger = %evaluation.trigger, "timeslot starting");
        publish(
            &self.router,
            Telemetry::new(actor)
                .with("event", "slot_started")
                .with("timeslot", key.to_string())
                .with("plugin", timeslot.plugin_name.clone())
                .with("generation", generation),
        );

        if let Some(err) = &problem {
            error!(actor, timeslot = %key, plugin = %timeslot.plugin_name, error = %err, "timeslot cannot run");
            publish(
                &self.router,
                Telemetry::new(actor)
                    .with("event", "slot_error")
                    .with("timeslot", key.to_string())
                    .with("error", err.clone()),
            );
        }

        let env = Env {
            router: &self.router,
            timers: &self.timers,
            me,
            resolution: self.resolution,
        };
        let slot = self.current.insert(ActiveSlot {
            key,
            timeslot,
            plugin,
            store,
            record,
            since: at,
        });
        if slot.plugin.is_none() {
            return;
        }

        if env.run(slot, at, "on_slot_start", |p, c| p.on_slot_start(c)).is_ok() && slot.record.is_idle() {
            let _ = env.run(slot, at, "on_slot_run", |p, c| p.on_slot_run(c));
        }
    }

    fn continue_slot(&mut self, actor: &str, me: &Arc<dyn Recipient>, at: NaiveDateTime) {
        let env = Env {
            router: &self.router,
            timers: &self.timers,
            me,
            resolution: self.resolution,
        };
        let Some(slot) = self.current.as_mut() else {
            return;
        };
        if slot.plugin.is_none() {
            return;
        }

        if slot.record.check_alarm(at) {
            debug!(actor, timeslot = %slot.key, "plugin woke up");
        }
        if slot.record.is_idle() {
            let _ = env.run(slot, at, "on_slot_run", |p, c| p.on_slot_run(c));
        } else {
            debug!(actor, timeslot = %slot.key, state = slot.record.state().as_str(), "plugin busy; run skipped");
        }
    }

    fn end_slot(&mut self, actor: &str, me: &Arc<dyn Recipient>, at: NaiveDateTime) {
        let Some(mut slot) = self.current.take() else {
            return;
        };
        slot.record.shutdown(true);
        info!(actor, timeslot = %slot.key, plugin = %slot.timeslot.plugin_name, since = %slot.since, "timeslot ending");

        if slot.plugin.is_some() {
            let env = Env {
                router: &self.router,
                timers: &self.timers,
                me,
                resolution: self.resolution,
            };
            let _ = env.run(&mut slot, at, "on_slot_end", |p, c| p.on_slot_end(c));
        }
        publish(
            &self.router,
            Telemetry::new(actor)
                .with("event", "slot_ended")
                .with("timeslot", slot.key.to_string())
                .with("plugin", slot.timeslot.plugin_name.clone()),
        );
    }

    fn on_completed(&mut self, actor: &str, me: &Arc<dyn Recipient>, done: &FutureCompleted) {
        info!(actor, plugin = %done.plugin, generation = done.generation, token = %done.token, success = done.is_success(), "future completed");
        if self.state != SchedulerState::Loaded {
            warn!(actor, state = self.state.as_str(), token = %done.token, "completion discarded");
            return;
        }
        let now = self.last_tick;
        let env = Env {
            router: &self.router,
            timers: &self.timers,
            me,
            resolution: self.resolution,
        };
        let Some(slot) = self.current.as_mut() else {
            warn!(actor, plugin = %done.plugin, token = %done.token, "completion arrived late; no active plugin");
            return;
        };
        if !slot.record.expects(done) {
            warn!(
                actor,
                plugin = %done.plugin,
                generation = done.generation,
                token = %done.token,
                active = slot.record.plugin(),
                active_generation = slot.record.generation(),
                state = slot.record.state().as_str(),
                "stale completion discarded"
            );
            return;
        }
        if let Err(e) = slot.record.mark_processing() {
            error!(actor, error = %e, "cannot process completion");
            return;
        }

        let now = now.unwrap_or(slot.since);
        let _ = env.run(slot, now, "on_result", |p, c| p.on_result(c, done));
        slot.record.mark_idle();
    }

    fn on_alarm(&mut self, actor: &str, me: &Arc<dyn Recipient>, alarm: &AlarmExpired) {
        if self.state != SchedulerState::Loaded {
            debug!(actor, state = self.state.as_str(), plugin = %alarm.plugin, "alarm discarded");
            return;
        }
        let now = self.last_tick;
        let env = Env {
            router: &self.router,
            timers: &self.timers,
            me,
            resolution: self.resolution,
        };
        let Some(slot) = self.current.as_mut() else {
            debug!(actor, plugin = %alarm.plugin, "alarm without active plugin");
            return;
        };
        if slot.record.plugin() != &*alarm.plugin || slot.record.generation() != alarm.generation {
            debug!(actor, plugin = %alarm.plugin, generation = alarm.generation, "stale alarm discarded");
            return;
        }
        if !slot.record.check_alarm(alarm.wake) {
            debug!(actor, state = slot.record.state().as_str(), "alarm no longer relevant");
            return;
        }

        debug!(actor, timeslot = %slot.key, wake = %alarm.wake, "plugin woke up");
        let now = now.map_or(alarm.wake, |t| t.max(alarm.wake));
        let _ = env.run(slot, now, "on_slot_run", |p, c| p.on_slot_run(c));
    }

    fn resolve_slot_plugin(&mut self, id: &str) -> Result<Arc<dyn SlotPlugin>, String> {
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
            .and_then(|h| h.slot().cloned())
            .ok_or_else(|| format!("plugin '{id}' has no slot capability"))
    }
}

fn load(provider: &dyn ConfigProvider) -> Result<(MasterTable, Vec<TimedSchedule>), ConfigError> {
    let master = provider.load_master_schedule()?;
    let schedules = provider.load_schedules()?;
    validate_schedules(&master, &schedules)?;
    Ok((master, schedules))
}

fn publish(router: &Router, t: Telemetry) {
    router.send(ROUTE_TELEMETRY, Message::telemetry(t));
}

#[async_trait]
impl Handler for TriggerScheduler {
    async fn execute(&mut self, ctx: &ActorContext, msg: Message) -> anyhow::Result<()> {
        let actor = ctx.name();
        let me: Arc<dyn Recipient> = Arc::new(ctx.myself().clone());

        match &msg.kind {
            MessageKind::Configure(req) => self.configure(actor, &me, req),
            MessageKind::DisplaySettings(s) => {
                info!(actor, display = %s.name, width = s.width, height = s.height, "display settings");
                self.resolution = (s.width, s.height);
            }
            MessageKind::Tick(tick) => self.on_tick(actor, &me, tick),
            MessageKind::FutureCompleted(done) => self.on_completed(actor, &me, done),
            MessageKind::AlarmExpired(alarm) => self.on_alarm(actor, &me, alarm),
            other => debug!(actor, kind = other.name(), "ignored"),
        }
        Ok(())
    }

    async fn on_quit(&mut self, ctx: &ActorContext, _msg: &Message) -> anyhow::Result<()> {
        if let Some(mut slot) = self.current.take() {
            slot.record.shutdown(true);
            info!(actor = ctx.name(), timeslot = %slot.key, "active plugin shut down");
        }
        info!(actor = ctx.name(), "quit");
        Ok(())
    }
}
