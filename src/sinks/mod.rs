//! Terminal recipients: the display and telemetry consumers.
//!
//! - [`DisplaySink`] / [`DisplayDriver`]: renders `DisplayImage` messages
//! - [`TelemetryLog`]: writes telemetry through `tracing`
//! - [`TelemetryBuffer`]: keeps telemetry in memory (tests, diagnostics)

mod display;
mod telemetry;

pub use display::{DisplayDriver, DisplaySink, RecordingDriver};
pub use telemetry::{TelemetryBuffer, TelemetryLog};
