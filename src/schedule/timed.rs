//! Timed schedules: minute-of-day slots bound to plugins.

use std::fmt;

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One slot of a timed schedule.
///
/// The slot covers the half-open interval `[start, start + duration)`, in
/// minutes from midnight of the evaluated day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Identifier, unique within its schedule.
    pub id: String,
    /// Human-readable title.
    #[serde(default)]
    pub title: String,
    /// Offset of the start from midnight, in minutes.
    pub start_minutes: u32,
    /// Length of the slot, in minutes.
    pub duration_minutes: u32,
    /// Identifier of the plugin that runs during the slot.
    pub plugin_name: String,
    /// Opaque plugin content.
    #[serde(default)]
    pub content: serde_json::Value,
}

impl TimeSlot {
    /// Creates a slot with empty content.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start_minutes: u32,
        duration_minutes: u32,
        plugin_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start_minutes,
            duration_minutes,
            plugin_name: plugin_name.into(),
            content: serde_json::Value::Null,
        }
    }

    /// Sets the plugin content.
    pub fn with_content(mut self, content: serde_json::Value) -> Self {
        self.content = content;
        self
    }

    /// End offset in minutes from midnight (exclusive).
    #[inline]
    pub fn end_minutes(&self) -> u32 {
        self.start_minutes.saturating_add(self.duration_minutes)
    }

    /// Start instant on `date`.
    pub fn start_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(NaiveTime::default()) + ChronoDuration::minutes(i64::from(self.start_minutes))
    }

    /// End instant on `date` (exclusive).
    pub fn end_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(NaiveTime::default()) + ChronoDuration::minutes(i64::from(self.end_minutes()))
    }

    /// True if `now` falls inside the slot on `now`'s own day.
    pub fn contains(&self, now: NaiveDateTime) -> bool {
        let day = now.date();
        self.start_on(day) <= now && now < self.end_on(day)
    }

    /// True if the two slots' intervals intersect.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start_minutes < other.end_minutes() && other.start_minutes < self.end_minutes()
    }
}

/// A pair of overlapping slots found by [`TimedSchedule::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Overlap {
    /// Id of the earlier slot in document order.
    pub first: String,
    /// Id of the later slot in document order.
    pub second: String,
}

impl fmt::Display for Overlap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' overlaps '{}'", self.first, self.second)
    }
}

/// A named day plan made of non-overlapping slots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedSchedule {
    /// Identifier.
    pub id: String,
    /// Name referenced by master trigger entries.
    pub name: String,
    /// Slots, in any order.
    #[serde(default)]
    pub items: Vec<TimeSlot>,
}

impl TimedSchedule {
    /// Creates an empty schedule.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            items: Vec::new(),
        }
    }

    /// Appends a slot.
    pub fn with_slot(mut self, slot: TimeSlot) -> Self {
        self.items.push(slot);
        self
    }

    /// Parses a schedule document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::malformed("timed schedule", e))
    }

    /// Slots ordered by `(start, end)`.
    pub fn sorted_items(&self) -> Vec<&TimeSlot> {
        let mut items: Vec<&TimeSlot> = self.items.iter().collect();
        items.sort_by_key(|s| (s.start_minutes, s.end_minutes()));
        items
    }

    /// First slot in `(start, end)` order that contains `now`.
    pub fn current(&self, now: NaiveDateTime) -> Option<&TimeSlot> {
        self.sorted_items().into_iter().find(|s| s.contains(now))
    }

    /// Returns every overlapping pair; empty when the schedule is valid.
    pub fn validate(&self) -> Vec<Overlap> {
        let mut out = Vec::new();
        for (i, a) in self.items.iter().enumerate() {
            for b in &self.items[i + 1..] {
                if a.overlaps(b) {
                    out.push(Overlap {
                        first: a.id.clone(),
                        second: b.id.clone(),
                    });
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        day().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn slot_is_half_open() {
        let slot = TimeSlot::new("news", "News", 9 * 60, 30, "headlines");
        assert!(!slot.contains(at(8, 59)));
        assert!(slot.contains(at(9, 0)));
        assert!(slot.contains(at(9, 29)));
        assert!(!slot.contains(at(9, 30)));
    }

    #[test]
    fn current_picks_the_containing_slot() {
        let s = TimedSchedule::new("wk", "weekday")
            .with_slot(TimeSlot::new("a", "", 0, 60, "p"))
            .with_slot(TimeSlot::new("b", "", 60, 60, "q"));
        assert_eq!(s.current(at(0, 59)).map(|x| x.id.as_str()), Some("a"));
        assert_eq!(s.current(at(1, 0)).map(|x| x.id.as_str()), Some("b"));
        assert!(s.current(at(2, 0)).is_none());
    }

    #[test]
    fn current_follows_start_order_not_document_order() {
        let s = TimedSchedule::new("x", "x")
            .with_slot(TimeSlot::new("b", "", 30, 60, "q"))
            .with_slot(TimeSlot::new("a", "", 0, 60, "p"));
        assert_eq!(s.current(at(0, 45)).map(|x| x.id.as_str()), Some("a"));
        assert_eq!(s.current(at(1, 15)).map(|x| x.id.as_str()), Some("b"));
    }

    #[test]
    fn validate_reports_every_overlapping_pair() {
        let s = TimedSchedule::new("x", "x")
            .with_slot(TimeSlot::new("a", "", 0, 60, "p"))
            .with_slot(TimeSlot::new("b", "", 30, 60, "p"))
            .with_slot(TimeSlot::new("c", "", 45, 10, "p"))
            .with_slot(TimeSlot::new("d", "", 90, 10, "p"));

        let got: Vec<String> = s.validate().iter().map(ToString::to_string).collect();
        assert_eq!(
            got,
            vec!["'a' overlaps 'b'", "'a' overlaps 'c'", "'b' overlaps 'c'"]
        );
    }

    #[test]
    fn adjacent_slots_do_not_overlap() {
        let s = TimedSchedule::new("x", "x")
            .with_slot(TimeSlot::new("a", "", 0, 60, "p"))
            .with_slot(TimeSlot::new("b", "", 60, 60, "p"));
        assert!(s.validate().is_empty());
    }

    #[test]
    fn sorted_by_start_then_end() {
        let s = TimedSchedule::new("x", "x")
            .with_slot(TimeSlot::new("late", "", 120, 10, "p"))
            .with_slot(TimeSlot::new("long", "", 0, 60, "p"))
            .with_slot(TimeSlot::new("short", "", 0, 10, "p"));
        let ids: Vec<&str> = s.sorted_items().iter().map(|x| x.id.as_str()).collect();
        assert_eq!(ids, vec!["short", "long", "late"]);
    }

    #[test]
    fn parses_document_and_reports_malformed() {
        let text = r#"{
            "id": "s1", "name": "weekday",
            "items": [
                { "type": "PluginSchedule", "id": "a", "title": "Clock",
                  "start_minutes": 0, "duration_minutes": 1440,
                  "plugin_name": "clock", "content": { "face": "digital" } }
            ]
        }"#;
        let s = TimedSchedule::from_json(text).unwrap();
        assert_eq!(s.items[0].plugin_name, "clock");
        assert_eq!(s.items[0].content["face"], "digital");

        let err = TimedSchedule::from_json("{ \"id\": 1 }").unwrap_err();
        assert_eq!(err.as_label(), "config_malformed");
    }
}
