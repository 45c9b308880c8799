//! # Global runtime configuration.
//!
//! Provides [`RuntimeConfig`], centralized settings for the composition root
//! ([`Runtime`](crate::Runtime)).
//!
//! ## Sentinel values
//! - `timer_workers = 0` / `future_workers = 0` → clamped to 1
//! - `tick_interval = 0s` → clamped to 1s

use std::time::Duration;

/// Global configuration for the runtime.
///
/// ## Field semantics
/// - `grace`: maximum wait for actor loops to stop after `Quit`
/// - `timer_workers`: timers that may be pending at the same time
/// - `future_workers`: units of plugin work that may run at the same time
/// - `resolution`: display resolution handed to plugins until a `DisplaySettings` arrives
/// - `tick_interval`: spacing between ticks produced by the tick source
/// - `align_to_minute`: align ticks to the top of the wall-clock minute
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Maximum time to wait for graceful shutdown.
    pub grace: Duration,

    /// Size of the timer service pool.
    pub timer_workers: usize,

    /// Size of the asynchronous work pool.
    pub future_workers: usize,

    /// Default display resolution `(width, height)`.
    pub resolution: (u32, u32),

    /// Interval between ticks.
    pub tick_interval: Duration,

    /// Align the first tick to the next minute boundary.
    pub align_to_minute: bool,
}

impl RuntimeConfig {
    /// Returns the timer pool size, clamped to a minimum of 1.
    #[inline]
    pub fn timer_workers_clamped(&self) -> usize {
        self.timer_workers.max(1)
    }

    /// Returns the work pool size, clamped to a minimum of 1.
    #[inline]
    pub fn future_workers_clamped(&self) -> usize {
        self.future_workers.max(1)
    }

    /// Returns the tick interval, clamped to a minimum of one second.
    #[inline]
    pub fn tick_interval_clamped(&self) -> Duration {
        self.tick_interval.max(Duration::from_secs(1))
    }
}

impl Default for RuntimeConfig {
    /// Default configuration:
    ///
    /// - `grace = 60s`
    /// - `timer_workers = 4`
    /// - `future_workers = 4`
    /// - `resolution = 800x480`
    /// - `tick_interval = 60s`
    /// - `align_to_minute = true`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            timer_workers: 4,
            future_workers: 4,
            resolution: (800, 480),
            tick_interval: Duration::from_secs(60),
            align_to_minute: true,
        }
    }
}
