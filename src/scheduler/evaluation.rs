//! Per-tick evaluation of the master table and timed schedules.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike};

use crate::schedule::{MasterTable, TimeSlot, TimedSchedule};

/// Identity of a selected timeslot: `(schedule id, timeslot id)`.
///
/// Slot boundaries are detected by comparing keys, never object identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SelectionKey {
    /// Id of the timed schedule.
    pub schedule: String,
    /// Id of the timeslot.
    pub timeslot: String,
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.schedule, self.timeslot)
    }
}

/// Outcome of evaluating one tick.
#[derive(Clone, Debug)]
pub struct Evaluation {
    /// Minute-truncated evaluation instant.
    pub at: NaiveDateTime,
    /// Id of the winning master entry.
    pub trigger: String,
    /// Selected schedule, if it was found.
    pub schedule: Option<Arc<TimedSchedule>>,
    /// Slot containing `at`, if any.
    pub timeslot: Option<TimeSlot>,
    /// Why the selection cannot run, if it cannot.
    pub error: Option<String>,
}

impl Evaluation {
    /// Key of the selected timeslot; `None` when no slot was selected.
    pub fn selection(&self) -> Option<SelectionKey> {
        match (&self.schedule, &self.timeslot) {
            (Some(s), Some(t)) => Some(SelectionKey {
                schedule: s.id.clone(),
                timeslot: t.id.clone(),
            }),
            _ => None,
        }
    }
}

/// Truncates to the start of the minute.
pub fn truncate_to_minute(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(ts)
}

/// Evaluates `at` against the master table and the schedules it references.
///
/// Returns `None` when no trigger matches. Plugins are resolved by the caller.
pub fn evaluate(master: &MasterTable, schedules: &[Arc<TimedSchedule>], at: NaiveDateTime) -> Option<Evaluation> {
    let entry = master.evaluate(at)?;
    let mut out = Evaluation {
        at,
        trigger: entry.id.clone(),
        schedule: None,
        timeslot: None,
        error: None,
    };

    let Some(schedule) = schedules.iter().find(|s| s.name == entry.target) else {
        out.error = Some(format!("schedule '{}' not found", entry.target));
        return Some(out);
    };
    out.timeslot = schedule.current(at).cloned();
    out.schedule = Some(Arc::clone(schedule));
    Some(out)
}
