//! End-to-end scenarios driving a full runtime with synthetic ticks.

use std::sync::Arc;
use std::time::Duration;

use billboard::{
    ActorRef, ConfigureNotify, FutureCompleted, Mailbox, MasterEntry, MasterTable, Message, MessageKind, Payload,
    PluginError, PluginRegistry, ROUTE_TICK, RecordingDriver, Runtime, RuntimeConfig, RuntimeError, SlotContext,
    SlotPlugin, StaticProvider, TelemetryBuffer, TimeSlot, TimedSchedule, Trigger, WorkError,
};
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;

type Log = Arc<Mutex<Vec<String>>>;

/// Fetches a forecast on start and displays it when the result arrives.
struct Weather {
    log: Log,
    work: Duration,
}

impl SlotPlugin for Weather {
    fn on_slot_start(&self, ctx: &mut SlotContext<'_>) -> Result<(), PluginError> {
        self.log.lock().push("start".into());
        let work = self.work;
        ctx.future("forecast", move |_cancel| async move {
            tokio::time::sleep(work).await;
            Ok::<_, WorkError>("sunny".to_string())
        })?;
        Ok(())
    }

    fn on_slot_run(&self, _ctx: &mut SlotContext<'_>) -> Result<(), PluginError> {
        self.log.lock().push("run".into());
        Ok(())
    }

    fn on_result(&self, ctx: &mut SlotContext<'_>, done: &FutureCompleted) -> Result<(), PluginError> {
        self.log.lock().push("result".into());
        let text = done.result().and_then(|p| p.downcast_ref::<String>()).cloned();
        ctx.display(text.unwrap_or_default(), Payload::new(()));
        Ok(())
    }

    fn on_slot_end(&self, _ctx: &mut SlotContext<'_>) -> Result<(), PluginError> {
        self.log.lock().push("end".into());
        Ok(())
    }
}

/// Displays a fixed title on every run.
struct Banner(&'static str);

impl SlotPlugin for Banner {
    fn on_slot_start(&self, _ctx: &mut SlotContext<'_>) -> Result<(), PluginError> {
        Ok(())
    }

    fn on_slot_run(&self, ctx: &mut SlotContext<'_>) -> Result<(), PluginError> {
        ctx.display(self.0, Payload::new(()));
        Ok(())
    }
}

/// Submits work that never finishes and ignores cancellation.
struct Stuck(Log);

impl SlotPlugin for Stuck {
    fn on_slot_start(&self, ctx: &mut SlotContext<'_>) -> Result<(), PluginError> {
        ctx.future("forever", |_cancel| std::future::pending::<Result<(), WorkError>>())?;
        self.0.lock().push("submitted".into());
        Ok(())
    }
}

fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, day)
        .and_then(|d| d.and_hms_opt(h, m, 0))
        .unwrap()
}

fn every_day(id: &str, target: &str) -> MasterEntry {
    MasterEntry::new(id, Trigger::DayOfWeek { days: (0..7).collect() }, target)
}

struct Setup {
    rt: Runtime,
    driver: RecordingDriver,
    telemetry: TelemetryBuffer,
}

fn setup(cfg: RuntimeConfig) -> Setup {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let driver = RecordingDriver::new();
    let telemetry = TelemetryBuffer::new();
    let rt = Runtime::builder(cfg)
        .with_display_driver(driver.clone())
        .with_telemetry(Arc::new(telemetry.clone()))
        .build();
    Setup { rt, driver, telemetry }
}

async fn configure(rt: &Runtime, provider: StaticProvider) -> ConfigureNotify {
    let (notify, mut mail) = ActorRef::detached("notify");
    rt.configure(Arc::new(provider), Some(Arc::new(notify))).unwrap();
    next_notify(&mut mail).await
}

async fn next_notify(mail: &mut Mailbox) -> ConfigureNotify {
    match mail.recv_timeout(Duration::from_secs(5)).await.map(|m| m.kind) {
        Some(MessageKind::ConfigureNotify(n)) => n,
        other => panic!("expected configure reply, got {other:?}"),
    }
}

fn tick(rt: &Runtime, ts: NaiveDateTime) {
    assert_eq!(rt.router().send(ROUTE_TICK, Message::tick(ts, 0)), 1);
}

async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn slot_runs_start_result_end_once() {
    let log: Log = Arc::default();
    let mut registry = PluginRegistry::new();
    registry.register_slot_instance(
        "weather",
        Arc::new(Weather {
            log: Arc::clone(&log),
            work: Duration::from_millis(10),
        }),
    );
    registry.register_slot("banner", || Banner("idle"));

    let provider = StaticProvider::new(registry)
        .with_master(MasterTable::new("weekday").with_entry(every_day("all", "weekday")))
        .with_schedule(
            TimedSchedule::new("s1", "weekday")
                .with_slot(TimeSlot::new("forecast", "Forecast", 600, 60, "weather"))
                .with_slot(TimeSlot::new("rest", "Rest", 660, 60, "banner")),
        );

    let s = setup(RuntimeConfig::default());
    let reply = configure(&s.rt, provider).await;
    assert!(reply.is_success(), "{:?}", reply.error);
    assert_eq!(&*reply.source, "scheduler");

    tick(&s.rt, at(3, 10, 0));
    eventually("forecast displayed", || s.driver.titles() == ["sunny"]).await;

    tick(&s.rt, at(3, 10, 1));
    tick(&s.rt, at(3, 11, 0));
    eventually("banner displayed", || s.driver.titles() == ["sunny", "idle"]).await;

    assert_eq!(*log.lock(), vec!["start", "result", "run", "end"]);
    assert_eq!(s.telemetry.events("slot_started").len(), 2);
    assert_eq!(s.telemetry.events("slot_ended").len(), 1);

    s.rt.shutdown().await.unwrap();
}

#[tokio::test]
async fn result_after_slot_change_is_discarded() {
    let log: Log = Arc::default();
    let mut registry = PluginRegistry::new();
    registry.register_slot_instance(
        "weather",
        Arc::new(Weather {
            log: Arc::clone(&log),
            work: Duration::from_millis(100),
        }),
    );
    registry.register_slot("banner", || Banner("idle"));

    let provider = StaticProvider::new(registry)
        .with_master(MasterTable::new("weekday").with_entry(every_day("all", "weekday")))
        .with_schedule(
            TimedSchedule::new("s1", "weekday")
                .with_slot(TimeSlot::new("forecast", "Forecast", 600, 60, "weather"))
                .with_slot(TimeSlot::new("rest", "Rest", 660, 60, "banner")),
        );

    let s = setup(RuntimeConfig::default());
    configure(&s.rt, provider).await;

    tick(&s.rt, at(3, 10, 59));
    tick(&s.rt, at(3, 11, 0));
    eventually("banner displayed", || s.driver.titles() == ["idle"]).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(*log.lock(), vec!["start", "end"]);
    assert_eq!(s.driver.titles(), vec!["idle"]);

    s.rt.shutdown().await.unwrap();
}

#[tokio::test]
async fn last_matching_trigger_wins() {
    let mut registry = PluginRegistry::new();
    registry.register_slot("weekday", || Banner("weekday"));
    registry.register_slot("holiday", || Banner("holiday"));

    let holiday = MasterEntry::new(
        "christmas",
        Trigger::DayAndMonth { day: 25, month: 12 },
        "holiday",
    );
    let provider = StaticProvider::new(registry)
        .with_master(
            MasterTable::new("weekday")
                .with_entry(every_day("all", "weekday"))
                .with_entry(holiday),
        )
        .with_schedule(TimedSchedule::new("s1", "weekday").with_slot(TimeSlot::new("a", "A", 0, 1440, "weekday")))
        .with_schedule(TimedSchedule::new("s2", "holiday").with_slot(TimeSlot::new("b", "B", 0, 1440, "holiday")));

    let s = setup(RuntimeConfig::default());
    assert!(configure(&s.rt, provider).await.is_success());

    tick(&s.rt, NaiveDate::from_ymd_opt(2024, 12, 24).and_then(|d| d.and_hms_opt(9, 0, 0)).unwrap());
    tick(&s.rt, NaiveDate::from_ymd_opt(2024, 12, 25).and_then(|d| d.and_hms_opt(9, 0, 0)).unwrap());
    eventually("both days displayed", || s.driver.titles().len() == 2).await;
    assert_eq!(s.driver.titles(), vec!["weekday", "holiday"]);

    s.rt.shutdown().await.unwrap();
}

#[tokio::test]
async fn overlapping_slots_reject_configuration() {
    let provider = StaticProvider::new(PluginRegistry::new())
        .with_master(MasterTable::new("weekday").with_entry(every_day("all", "weekday")))
        .with_schedule(
            TimedSchedule::new("s1", "weekday")
                .with_slot(TimeSlot::new("a", "A", 600, 60, "x"))
                .with_slot(TimeSlot::new("b", "B", 630, 60, "x")),
        );

    let s = setup(RuntimeConfig::default());
    let reply = configure(&s.rt, provider).await;
    let err = reply.error.expect("configuration must fail");
    assert!(err.contains("'a' overlaps 'b'"), "{err}");

    eventually("configure telemetry", || !s.telemetry.events("configure").is_empty()).await;
    let t = &s.telemetry.events("configure")[0];
    assert_eq!(t.get("state").and_then(|v| v.as_str()), Some("error"));

    tick(&s.rt, at(3, 10, 0));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(s.driver.titles().is_empty());

    s.rt.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_reports_work_that_ignores_cancellation() {
    let log: Log = Arc::default();
    let mut registry = PluginRegistry::new();
    registry.register_slot_instance("stuck", Arc::new(Stuck(Arc::clone(&log))));
    let provider = StaticProvider::new(registry)
        .with_master(MasterTable::new("weekday").with_entry(every_day("all", "weekday")))
        .with_schedule(TimedSchedule::new("s1", "weekday").with_slot(TimeSlot::new("a", "A", 0, 1440, "stuck")));

    let cfg = RuntimeConfig {
        grace: Duration::from_millis(200),
        ..RuntimeConfig::default()
    };
    let s = setup(cfg);
    configure(&s.rt, provider).await;
    tick(&s.rt, at(3, 10, 0));
    eventually("work submitted", || !log.lock().is_empty()).await;

    match s.rt.shutdown().await {
        Err(RuntimeError::GraceExceeded { grace, stuck }) => {
            assert_eq!(grace, Duration::from_millis(200));
            assert_eq!(stuck, vec!["futures".to_string()]);
        }
        other => panic!("expected grace exceeded, got {other:?}"),
    }
}

#[tokio::test]
async fn sends_after_shutdown_are_rejected() {
    let s = setup(RuntimeConfig::default());
    let scheduler = s.rt.scheduler().clone();
    s.rt.shutdown().await.unwrap();

    let err = scheduler.send(Message::next_track()).unwrap_err();
    assert_eq!(err, RuntimeError::IllegalState { task: "scheduler".into() });
}
