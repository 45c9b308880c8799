//! Slot capability: plugins driven by the trigger scheduler.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio_util::sync::CancellationToken;

use crate::actor::Recipient;
use crate::error::{PluginError, StateError, WorkError};
use crate::messages::{AlarmExpired, FutureCompleted, Message, MessageKind, Payload, ROUTE_DISPLAY, Router};
use crate::plugins::active::{ActivePlugin, ActivityState};
use crate::plugins::store::KeyValueStore;
use crate::schedule::TimeSlot;
use crate::workers::TimerService;

/// Contract of a plugin that runs inside timeslots.
///
/// Hooks are called from the scheduler's task, one at a time. They must not
/// block: slow work goes through [`SlotContext::future`].
///
/// ## Lifecycle per slot
/// ```text
/// on_slot_start ─► on_slot_run (if idle) ─► [on_slot_run | on_result]* ─► on_slot_end
/// ```
pub trait SlotPlugin: Send + Sync + 'static {
    /// The slot became active.
    fn on_slot_start(&self, ctx: &mut SlotContext<'_>) -> Result<(), PluginError>;

    /// The slot is over. The record is already terminated.
    fn on_slot_end(&self, _ctx: &mut SlotContext<'_>) -> Result<(), PluginError> {
        Ok(())
    }

    /// A tick arrived while the plugin was idle.
    fn on_slot_run(&self, _ctx: &mut SlotContext<'_>) -> Result<(), PluginError> {
        Ok(())
    }

    /// Submitted work completed (successfully or not).
    fn on_result(&self, _ctx: &mut SlotContext<'_>, _done: &FutureCompleted) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Everything a slot hook may use.
pub struct SlotContext<'a> {
    timeslot: &'a TimeSlot,
    store: &'a dyn KeyValueStore,
    resolution: (u32, u32),
    now: NaiveDateTime,
    router: &'a Router,
    timers: &'a TimerService,
    scheduler: &'a Arc<dyn Recipient>,
    record: &'a mut ActivePlugin,
}

impl<'a> SlotContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        timeslot: &'a TimeSlot,
        store: &'a dyn KeyValueStore,
        resolution: (u32, u32),
        now: NaiveDateTime,
        router: &'a Router,
        timers: &'a TimerService,
        scheduler: &'a Arc<dyn Recipient>,
        record: &'a mut ActivePlugin,
    ) -> Self {
        Self {
            timeslot,
            store,
            resolution,
            now,
            router,
            timers,
            scheduler,
            record,
        }
    }

    /// The active timeslot.
    pub fn timeslot(&self) -> &TimeSlot {
        self.timeslot
    }

    /// The plugin's persistent store.
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store
    }

    /// Display resolution `(width, height)`.
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    /// Timestamp of the tick being processed (truncated to the minute).
    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// State of the plugin's activity record.
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
    /// [`SlotPlugin::on_result`].
    pub fn future<T, W, Fut>(&mut self, token: impl Into<Arc<str>>, work: W) -> Result<(), StateError>
    where
        T: std::any::Any + Send + Sync,
        W: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, WorkError>> + Send + 'static,
    {
        self.record.submit_async(token, work)
    }

    /// Sleeps until `wake`; idle runs resume on the first tick at or after it.
    pub fn alarm(&mut self, wake: NaiveDateTime) -> Result<(), StateError> {
        self.record.set_alarm(wake)
    }

    /// Sleeps for `delay` and arms a timer that wakes the plugin without
    /// waiting for the next tick.
    pub fn alarm_in(&mut self, delay: Duration) -> Result<(), PluginError> {
        let wake = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|step| self.now.checked_add_signed(step))
            .ok_or_else(|| PluginError::failed(format!("alarm in {delay:?} is out of range")))?;
        self.record.set_alarm(wake)?;

        let msg = Message::now(MessageKind::AlarmExpired(AlarmExpired {
            plugin: self.record.plugin().into(),
            generation: self.record.generation(),
            wake,
        }));
        let (_handle, cancel) = self
            .timers
            .create_timer(delay, Some(Arc::clone(self.scheduler)), msg)?;
        self.record.arm_timer(cancel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::actor::ActorRef;
    use crate::plugins::store::MemoryStore;
    use crate::workers::{FutureSource, WorkerPool};

    #[tokio::test]
    async fn alarm_beyond_the_calendar_is_rejected() {
        let (me, mut inbox) = ActorRef::detached("scheduler");
        let me: Arc<dyn Recipient> = Arc::new(me);
        let router = Router::new();
        let timers = TimerService::new(1);
        let store = MemoryStore::new();
        let slot = TimeSlot::new("news", "News", 600, 60, "rec");
        let mut record = ActivePlugin::new("rec", 1, FutureSource::new(Arc::clone(&me), WorkerPool::new("futures", 1)));
        let now = NaiveDate::from_ymd_opt(2024, 6, 3)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .unwrap();

        let mut ctx = SlotContext::new(&slot, &store, (800, 480), now, &router, &timers, &me, &mut record);
        let err = ctx
            .alarm_in(Duration::from_secs(300_000 * 365 * 86_400))
            .unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
        assert_eq!(ctx.state(), ActivityState::Idle);

        ctx.alarm_in(Duration::from_secs(60)).unwrap();
        assert_eq!(ctx.state(), ActivityState::Sleeping);
        assert!(inbox.try_recv().is_none());
    }
}
