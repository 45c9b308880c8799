//! # Minute-aligned tick source.
//!
//! [`TickSource`] publishes [`Tick`](crate::messages::Tick) messages on the
//! `"tick"` route.
//!
//! ```text
//! align_to_minute:
//!   tick #0 (pre-align, immediately) ─► sleep to next hh:mm:00
//! loop:
//!   tick #n ─► sleep(interval - overage)
//!                 overage = time past the minute   (interval >= 60s)
//!                         = time past the second   (interval >= 1s)
//!                         = 0                      (otherwise)
//! ```
//!
//! Stopping cancels the token; a sleep in progress ends immediately. Ticks are
//! fire-and-forget: a slow recipient never delays the source.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, Timelike};
use tokio::select;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::RuntimeConfig;
use crate::messages::{Message, ROUTE_TICK, Router};

/// Wall-clock source used by the tick source.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Local naive wall clock.
pub fn local_clock() -> Clock {
    Arc::new(|| Local::now().naive_local())
}

/// Produces minute ticks on a router.
pub struct TickSource {
    router: Arc<Router>,
    interval: Duration,
    align: bool,
    clock: Clock,
}

/// Handle to a running tick source.
pub struct TickerHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl TickerHandle {
    /// Stops the source and waits for it to exit.
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.join.await;
    }

    /// Requests the source to stop without waiting.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl TickSource {
    /// Creates a tick source from the runtime configuration.
    pub fn new(router: Arc<Router>, cfg: &RuntimeConfig) -> Self {
        Self {
            router,
            interval: cfg.tick_interval_clamped(),
            align: cfg.align_to_minute,
            clock: local_clock(),
        }
    }

    /// Replaces the wall clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Spawns the source on the current tokio runtime.
    pub fn spawn(self) -> TickerHandle {
        let token = CancellationToken::new();
        let join = tokio::spawn(self.run(token.clone()));
        TickerHandle { token, join }
    }

    async fn run(self, token: CancellationToken) {
        info!(interval = ?self.interval, align = self.align, "tick source starting");
        let mut seq = 0u64;

        if self.align {
            let now = (self.clock)();
            self.publish(now, &mut seq);
            let wait = until_next_minute(now);
            debug!(?wait, "aligning to next minute");
            if !sleep_or_cancel(wait, &token).await {
                info!("tick source stopped");
                return;
            }
        }

        loop {
            let now = (self.clock)();
            self.publish(now, &mut seq);
            let wait = next_sleep(now, self.interval);
            if !sleep_or_cancel(wait, &token).await {
                break;
            }
        }
        info!("tick source stopped");
    }

    fn publish(&self, now: NaiveDateTime, seq: &mut u64) {
        debug!(tick = *seq, ts = %now, "tick");
        self.router.send(ROUTE_TICK, Message::tick(now, *seq));
        *seq += 1;
    }
}

/// Returns `false` if cancelled before `dur` elapsed.
async fn sleep_or_cancel(dur: Duration, token: &CancellationToken) -> bool {
    select! {
        _ = tokio::time::sleep(dur) => true,
        _ = token.cancelled() => false,
    }
}

/// Time from `now` to the next top of minute.
pub(crate) fn until_next_minute(now: NaiveDateTime) -> Duration {
    let past = past_minute(now);
    Duration::from_secs(60).saturating_sub(past)
}

/// Sleep after a tick at `now` so the next one lands on the interval boundary.
pub(crate) fn next_sleep(now: NaiveDateTime, interval: Duration) -> Duration {
    if interval >= Duration::from_secs(60) {
        interval.saturating_sub(past_minute(now))
    } else if interval >= Duration::from_secs(1) {
        interval.saturating_sub(Duration::from_nanos(u64::from(now.nanosecond() % 1_000_000_000)))
    } else {
        interval
    }
}

fn past_minute(now: NaiveDateTime) -> Duration {
    Duration::from_secs(u64::from(now.second()))
        + Duration::from_nanos(u64::from(now.nanosecond() % 1_000_000_000))
}
