//! Playlist playback through a full runtime.

use std::sync::Arc;
use std::time::Duration;

use billboard::{
    ActorRef, Message, MessageKind, Payload, Playlist, PluginError, PluginRegistry, RecordingDriver, Runtime,
    RuntimeConfig, StaticProvider, TelemetryBuffer, Track, TrackContext, TrackPlugin,
};

/// Shows the track id; advances on its own after `hold`, if set.
struct Slide {
    hold: Option<Duration>,
}

impl TrackPlugin for Slide {
    fn start(&self, ctx: &mut TrackContext<'_>, track: &Track) -> Result<(), PluginError> {
        ctx.display(track.id.clone(), Payload::new(track.content.clone()));
        if let Some(hold) = self.hold {
            ctx.next_track_in(hold)?;
        }
        Ok(())
    }
}

fn playlists() -> Vec<Playlist> {
    vec![
        Playlist::new("p0", "morning").with_track(Track::new("p0t0", "slide")),
        Playlist::new("p1", "evening")
            .with_track(Track::new("p1t0", "slide"))
            .with_track(Track::new("p1t1", "slide")),
    ]
}

async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn start(hold: Option<Duration>) -> (Runtime, RecordingDriver, TelemetryBuffer) {
    let mut registry = PluginRegistry::new();
    registry.register_track("slide", move || Slide { hold });
    let provider = playlists()
        .into_iter()
        .fold(StaticProvider::new(registry), StaticProvider::with_playlist);

    let driver = RecordingDriver::new();
    let telemetry = TelemetryBuffer::new();
    let rt = Runtime::builder(RuntimeConfig::default())
        .with_display_driver(driver.clone())
        .with_playlist_layer()
        .with_telemetry(Arc::new(telemetry.clone()))
        .build();

    let (notify, mut mail) = ActorRef::detached("notify");
    rt.configure(Arc::new(provider), Some(Arc::new(notify))).unwrap();

    // The scheduler has no master table and rejects the configuration; the
    // playlist layer accepts it.
    let mut replies = Vec::new();
    while replies.len() < 2 {
        match mail.recv_timeout(Duration::from_secs(5)).await.map(|m| m.kind) {
            Some(MessageKind::ConfigureNotify(n)) => replies.push(n),
            other => panic!("expected configure reply, got {other:?}"),
        }
    }
    replies.sort_by(|a, b| a.source.cmp(&b.source));
    assert!(replies[0].is_success(), "playlist: {:?}", replies[0].error);
    assert!(!replies[1].is_success());

    (rt, driver, telemetry)
}

#[tokio::test]
async fn next_track_wraps_across_playlists() {
    let (rt, driver, telemetry) = start(None).await;
    eventually("first track", || driver.titles() == ["p0t0"]).await;

    let layer = rt.playlist().expect("playlist layer").clone();
    for _ in 0..4 {
        layer.send(Message::next_track()).unwrap();
    }
    eventually("five tracks", || driver.titles().len() == 5).await;
    assert_eq!(driver.titles(), vec!["p0t0", "p1t0", "p1t1", "p0t0", "p1t0"]);

    let positions: Vec<(u64, u64)> = telemetry
        .events("track_started")
        .iter()
        .filter_map(|t| {
            Some((
                t.get("current_playlist_index")?.as_u64()?,
                t.get("current_track_index")?.as_u64()?,
            ))
        })
        .collect();
    assert_eq!(positions, vec![(0, 0), (1, 0), (1, 1), (0, 0), (1, 0)]);

    rt.shutdown().await.unwrap();
}

#[tokio::test]
async fn tracks_advance_on_their_own_timers() {
    let (rt, driver, _telemetry) = start(Some(Duration::from_millis(20))).await;
    eventually("four tracks", || driver.titles().len() >= 4).await;
    assert_eq!(driver.titles()[..4], ["p0t0", "p1t0", "p1t1", "p0t0"]);
    rt.shutdown().await.unwrap();
}
