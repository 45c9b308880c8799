//! Master trigger table: calendar triggers selecting a timed schedule.
//!
//! ## Tie-break
//! Of all enabled entries whose trigger matches, the **last** one in table
//! order wins. Tables are written general-first, specific-last.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::schedule::timed::TimedSchedule;

/// Calendar condition of a master entry.
///
/// Weekdays are numbered Monday = 0 to Sunday = 6.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trigger {
    /// Any of the listed weekdays.
    DayOfWeek {
        #[serde(default)]
        days: Vec<u32>,
    },
    /// A fixed day of every month.
    DayOfMonth {
        #[serde(rename = "dayofmonth")]
        day: u32,
    },
    /// A fixed day of a fixed month, every year.
    DayAndMonth { day: u32, month: u32 },
    /// Inclusive range within the current year, from 00:00:00 of the start
    /// day to 23:59:59 of the end day.
    DayAndMonthRange {
        day_start: u32,
        month_start: u32,
        day_end: u32,
        month_end: u32,
    },
    /// A single calendar date.
    DayMonthYear { day: u32, month: u32, year: i32 },
    /// Unrecognised trigger type; never matches.
    #[serde(other)]
    Unknown,
}

impl Trigger {
    /// True if the trigger matches `now`.
    pub fn matches(&self, now: NaiveDateTime) -> bool {
        match self {
            Trigger::DayOfWeek { days } => days.contains(&now.weekday().num_days_from_monday()),
            Trigger::DayOfMonth { day } => now.day() == *day,
            Trigger::DayAndMonth { day, month } => now.day() == *day && now.month() == *month,
            Trigger::DayAndMonthRange {
                day_start,
                month_start,
                day_end,
                month_end,
            } => {
                let year = now.year();
                let start = NaiveDate::from_ymd_opt(year, *month_start, *day_start)
                    .and_then(|d| d.and_hms_opt(0, 0, 0));
                let end = NaiveDate::from_ymd_opt(year, *month_end, *day_end)
                    .and_then(|d| d.and_hms_opt(23, 59, 59));
                match (start, end) {
                    (Some(start), Some(end)) => start <= now && now <= end,
                    _ => false,
                }
            }
            Trigger::DayMonthYear { day, month, year } => {
                now.day() == *day && now.month() == *month && now.year() == *year
            }
            Trigger::Unknown => false,
        }
    }
}

/// One row of the master table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MasterEntry {
    /// Identifier, unique within the table.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Disabled entries never match. Absent means disabled.
    #[serde(default)]
    pub enabled: bool,
    /// Calendar condition.
    pub trigger: Trigger,
    /// Name of the timed schedule selected by this entry.
    #[serde(rename = "schedule")]
    pub target: String,
}

impl MasterEntry {
    /// Creates an enabled entry.
    pub fn new(id: impl Into<String>, trigger: Trigger, target: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            enabled: true,
            trigger,
            target: target.into(),
        }
    }

    /// Sets `enabled`.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Ordered list of trigger entries plus the name of the default schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MasterTable {
    /// Name of the schedule that must exist for the table to be valid.
    #[serde(rename = "defaultSchedule", alias = "default_schedule")]
    pub default_schedule: String,
    /// Entries in table order.
    #[serde(rename = "schedules", default)]
    pub entries: Vec<MasterEntry>,
}

impl MasterTable {
    /// Creates an empty table.
    pub fn new(default_schedule: impl Into<String>) -> Self {
        Self {
            default_schedule: default_schedule.into(),
            entries: Vec::new(),
        }
    }

    /// Appends an entry.
    pub fn with_entry(mut self, entry: MasterEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Parses a master table document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::malformed("master schedule", e))
    }

    /// Last enabled entry whose trigger matches `now`.
    pub fn evaluate(&self, now: NaiveDateTime) -> Option<&MasterEntry> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.enabled && e.trigger.matches(now))
    }

    /// Checks the table against the known schedules; returns every issue found.
    pub fn validate(&self, schedules: &[TimedSchedule]) -> Vec<String> {
        let count = |name: &str| schedules.iter().filter(|s| s.name == name).count();
        let mut issues = Vec::new();

        if count(&self.default_schedule) != 1 {
            issues.push(format!(
                "default schedule '{}' does not resolve to exactly one schedule",
                self.default_schedule
            ));
        }

        let mut ids = HashSet::new();
        for entry in &self.entries {
            if !ids.insert(entry.id.as_str()) {
                issues.push(format!("duplicate trigger id '{}'", entry.id));
            }
            if entry.enabled && count(&entry.target) != 1 {
                issues.push(format!(
                    "schedule '{}' referenced by trigger '{}' does not resolve to exactly one schedule",
                    entry.target, entry.id
                ));
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|x| x.and_hms_opt(h, min, s))
            .unwrap()
    }

    #[test]
    fn weekday_numbering_starts_monday() {
        // 2024-06-03 is a Monday.
        let t = Trigger::DayOfWeek { days: vec![0] };
        assert!(t.matches(at(2024, 6, 3, 12, 0, 0)));
        assert!(!t.matches(at(2024, 6, 9, 12, 0, 0)));
        assert!(Trigger::DayOfWeek { days: vec![6] }.matches(at(2024, 6, 9, 12, 0, 0)));
    }

    #[test]
    fn range_is_inclusive_to_the_last_second() {
        let t = Trigger::DayAndMonthRange {
            day_start: 20,
            month_start: 12,
            day_end: 26,
            month_end: 12,
        };
        assert!(!t.matches(at(2024, 12, 19, 23, 59, 59)));
        assert!(t.matches(at(2024, 12, 20, 0, 0, 0)));
        assert!(t.matches(at(2024, 12, 26, 23, 59, 59)));
        assert!(!t.matches(at(2024, 12, 27, 0, 0, 0)));
    }

    #[test]
    fn impossible_dates_never_match() {
        let t = Trigger::DayAndMonthRange {
            day_start: 30,
            month_start: 2,
            day_end: 31,
            month_end: 3,
        };
        assert!(!t.matches(at(2024, 3, 1, 0, 0, 0)));
        assert!(!Trigger::Unknown.matches(at(2024, 3, 1, 0, 0, 0)));
    }

    #[test]
    fn last_enabled_match_wins() {
        let table = MasterTable::new("weekday")
            .with_entry(MasterEntry::new("all", Trigger::DayOfWeek { days: (0..7).collect() }, "weekday"))
            .with_entry(MasterEntry::new("xmas", Trigger::DayAndMonth { day: 25, month: 12 }, "holiday"))
            .with_entry(
                MasterEntry::new("off", Trigger::DayOfMonth { day: 25 }, "disabled").enabled(false),
            );

        let xmas = at(2024, 12, 25, 10, 0, 0);
        assert_eq!(table.evaluate(xmas).map(|e| e.id.as_str()), Some("xmas"));
        let other = at(2024, 12, 24, 10, 0, 0);
        assert_eq!(table.evaluate(other).map(|e| e.id.as_str()), Some("all"));
        assert!(MasterTable::new("x").evaluate(other).is_none());
    }

    #[test]
    fn later_entry_wins_for_every_trigger_kind() {
        let now = at(2024, 12, 25, 10, 0, 0);
        let kinds = [
            Trigger::DayOfWeek { days: vec![2] },
            Trigger::DayOfMonth { day: 25 },
            Trigger::DayAndMonth { day: 25, month: 12 },
            Trigger::DayAndMonthRange {
                day_start: 20,
                month_start: 12,
                day_end: 31,
                month_end: 12,
            },
            Trigger::DayMonthYear {
                day: 25,
                month: 12,
                year: 2024,
            },
        ];
        for trigger in kinds {
            assert!(trigger.matches(now), "{trigger:?}");
            let table = MasterTable::new("a")
                .with_entry(MasterEntry::new("first", trigger.clone(), "a"))
                .with_entry(MasterEntry::new("second", trigger.clone(), "b"));
            assert_eq!(table.evaluate(now).map(|e| e.id.as_str()), Some("second"), "{trigger:?}");
        }
    }

    #[test]
    fn fixed_date_matches_only_that_day() {
        let t = Trigger::DayMonthYear {
            day: 25,
            month: 12,
            year: 2024,
        };
        assert!(t.matches(at(2024, 12, 25, 0, 0, 0)));
        assert!(t.matches(at(2024, 12, 25, 23, 59, 59)));
        assert!(!t.matches(at(2025, 12, 25, 12, 0, 0)));
        assert!(!t.matches(at(2024, 12, 26, 0, 0, 0)));
    }

    #[test]
    fn parses_tagged_triggers() {
        let text = r#"{
            "defaultSchedule": "weekday",
            "schedules": [
                { "id": "1", "name": "wk", "description": "", "enabled": true,
                  "schedule": "weekday", "trigger": { "type": "dayofweek", "days": [0,1,2,3,4] } },
                { "id": "2", "name": "m", "enabled": true, "schedule": "weekday",
                  "trigger": { "type": "dayofmonth", "dayofmonth": 1 } },
                { "id": "3", "name": "odd", "enabled": true, "schedule": "weekday",
                  "trigger": { "type": "lunar" } },
                { "id": "4", "name": "launch", "enabled": true, "schedule": "weekday",
                  "trigger": { "type": "daymonthyear", "day": 3, "month": 6, "year": 2024 } }
            ]
        }"#;
        let table = MasterTable::from_json(text).unwrap();
        assert_eq!(table.entries[0].trigger, Trigger::DayOfWeek { days: vec![0, 1, 2, 3, 4] });
        assert_eq!(table.entries[1].trigger, Trigger::DayOfMonth { day: 1 });
        assert_eq!(table.entries[2].trigger, Trigger::Unknown);
        assert_eq!(
            table.entries[3].trigger,
            Trigger::DayMonthYear {
                day: 3,
                month: 6,
                year: 2024
            }
        );
        assert_eq!(table.entries[0].target, "weekday");
    }

    #[test]
    fn validate_collects_every_issue() {
        let schedules = vec![TimedSchedule::new("s1", "weekday")];
        let table = MasterTable::new("missing")
            .with_entry(MasterEntry::new("a", Trigger::DayOfMonth { day: 1 }, "weekday"))
            .with_entry(MasterEntry::new("a", Trigger::DayOfMonth { day: 2 }, "nowhere"))
            .with_entry(MasterEntry::new("b", Trigger::DayOfMonth { day: 3 }, "ghost").enabled(false));

        let issues = table.validate(&schedules);
        assert_eq!(issues.len(), 3, "{issues:?}");
        assert!(issues[0].contains("default schedule 'missing'"));
        assert!(issues[1].contains("duplicate trigger id 'a'"));
        assert!(issues[2].contains("'nowhere'"));
    }
}
