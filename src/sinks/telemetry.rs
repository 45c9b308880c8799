//! # Telemetry consumers.
//!
//! [`TelemetryLog`] is an actor handler that writes each telemetry record as a
//! structured `tracing` event. [`TelemetryBuffer`] is a [`Recipient`] that keeps
//! records in memory; it needs no task of its own.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::actor::{ActorContext, Handler, Recipient};
use crate::error::RuntimeError;
use crate::messages::{Message, MessageKind, Telemetry};

/// Logs telemetry through `tracing`.
#[derive(Default)]
pub struct TelemetryLog {
    seen: u64,
}

impl TelemetryLog {
    /// Creates the handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records logged so far.
    pub fn seen(&self) -> u64 {
        self.seen
    }
}

#[async_trait]
impl Handler for TelemetryLog {
    async fn execute(&mut self, ctx: &ActorContext, msg: Message) -> anyhow::Result<()> {
        let MessageKind::Telemetry(t) = &msg.kind else {
            debug!(actor = ctx.name(), kind = msg.kind.name(), "ignored");
            return Ok(());
        };
        self.seen += 1;
        let values = serde_json::to_string(&t.values)?;
        info!(actor = ctx.name(), source = %t.source, seq = msg.seq, %values, "telemetry");
        Ok(())
    }
}

/// In-memory telemetry recipient.
#[derive(Clone, Default)]
pub struct TelemetryBuffer {
    records: Arc<Mutex<Vec<Telemetry>>>,
}

impl TelemetryBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies every record received so far.
    pub fn records(&self) -> Vec<Telemetry> {
        self.records.lock().clone()
    }

    /// Records whose `event` value equals `event`.
    pub fn events(&self, event: &str) -> Vec<Telemetry> {
        self.records
            .lock()
            .iter()
            .filter(|t| t.get("event").and_then(|v| v.as_str()) == Some(event))
            .cloned()
            .collect()
    }

    /// Removes and returns every record.
    pub fn take(&self) -> Vec<Telemetry> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl Recipient for TelemetryBuffer {
    fn name(&self) -> &str {
        "telemetry-buffer"
    }

    fn send(&self, msg: Message) -> Result<(), RuntimeError> {
        if let MessageKind::Telemetry(t) = msg.kind {
            self.records.lock().push(t);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorRef;

    #[test]
    fn buffer_keeps_only_telemetry() {
        let buf = TelemetryBuffer::new();
        buf.send(Message::telemetry(Telemetry::new("scheduler").with("event", "slot_started")))
            .unwrap();
        buf.send(Message::next_track()).unwrap();
        buf.send(Message::telemetry(Telemetry::new("scheduler").with("event", "slot_ended")))
            .unwrap();

        assert_eq!(buf.records().len(), 2);
        assert_eq!(buf.events("slot_ended").len(), 1);
        assert_eq!(buf.take().len(), 2);
        assert!(buf.records().is_empty());
    }

    #[tokio::test]
    async fn log_counts_records() {
        let (me, _mail) = ActorRef::detached("telemetry");
        let ctx = ActorContext::new(me);
        let mut log = TelemetryLog::new();
        log.execute(&ctx, Message::telemetry(Telemetry::new("layer").with("current_track_index", 1)))
            .await
            .unwrap();
        log.execute(&ctx, Message::tick(chrono::NaiveDateTime::default(), 0)).await.unwrap();
        assert_eq!(log.seen(), 1);
    }
}
