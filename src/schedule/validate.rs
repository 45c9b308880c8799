//! Whole-configuration validation.
//!
//! Each document reports every issue it finds; the helpers here gather them
//! into a single [`ConfigError::Invalid`] so a broken configuration is rejected
//! as a whole.

use crate::error::ConfigError;
use crate::schedule::master::MasterTable;
use crate::schedule::playlist::Playlist;
use crate::schedule::timed::TimedSchedule;

/// Validates a master table together with the timed schedules it references.
pub fn validate_schedules(master: &MasterTable, schedules: &[TimedSchedule]) -> Result<(), ConfigError> {
    let mut issues = master.validate(schedules);
    for schedule in schedules {
        issues.extend(
            schedule
                .validate()
                .into_iter()
                .map(|o| format!("schedule '{}': {o}", schedule.name)),
        );
    }
    into_result(issues)
}

/// Validates a set of playlists.
pub fn validate_playlists(playlists: &[Playlist]) -> Result<(), ConfigError> {
    let mut issues: Vec<String> = playlists.iter().flat_map(Playlist::validate).collect();
    if playlists.is_empty() {
        issues.push("no playlists configured".to_string());
    }
    into_result(issues)
}

fn into_result(issues: Vec<String>) -> Result<(), ConfigError> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid { issues })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{MasterEntry, TimeSlot, Track, Trigger};

    #[test]
    fn overlaps_in_every_schedule_are_reported() {
        let a = TimedSchedule::new("1", "a")
            .with_slot(TimeSlot::new("x", "", 0, 30, "p"))
            .with_slot(TimeSlot::new("y", "", 10, 30, "p"));
        let b = TimedSchedule::new("2", "b")
            .with_slot(TimeSlot::new("u", "", 0, 30, "p"))
            .with_slot(TimeSlot::new("v", "", 0, 30, "p"));
        let master = MasterTable::new("a").with_entry(MasterEntry::new("t", Trigger::DayOfMonth { day: 1 }, "b"));

        match validate_schedules(&master, &[a, b]) {
            Err(ConfigError::Invalid { issues }) => assert_eq!(
                issues,
                vec![
                    "schedule 'a': 'x' overlaps 'y'".to_string(),
                    "schedule 'b': 'u' overlaps 'v'".to_string(),
                ]
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn valid_configuration_passes() {
        let a = TimedSchedule::new("1", "a").with_slot(TimeSlot::new("x", "", 0, 30, "p"));
        assert!(validate_schedules(&MasterTable::new("a"), &[a]).is_ok());

        let p = Playlist::new("p", "p").with_track(Track::new("t", "clock"));
        assert!(validate_playlists(&[p]).is_ok());
        assert!(validate_playlists(&[]).is_err());
    }
}
