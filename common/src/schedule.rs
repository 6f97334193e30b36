use chrono::{NaiveTime, Timelike};
use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};

pub const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScheduleEntry {
    /// Minute of the day the setpoint takes effect.
    pub at: u16,
    pub temp: f64,
}

impl ScheduleEntry {
    pub fn validate(&self) -> bool {
        self.at < MINUTES_PER_DAY && self.temp.is_finite()
    }
}

/// Daily setpoint program held in the control store. Advisory only: it is
/// reported alongside the loop status but never drives actuators.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct Schedule {
    pub entries: Vec<ScheduleEntry>,
}

/// Decodes leniently: malformed entries are skipped and a value that is not a
/// list reads as an empty schedule, so a bad program never hides the rest of
/// the control state.
impl<'de> Deserialize<'de> for Schedule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawEntry {
            Valid(ScheduleEntry),
            Invalid(IgnoredAny),
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawSchedule {
            List(Vec<RawEntry>),
            Invalid(IgnoredAny),
        }

        let entries = match RawSchedule::deserialize(deserializer)? {
            RawSchedule::List(raw) => raw
                .into_iter()
                .filter_map(|entry| match entry {
                    RawEntry::Valid(entry) => Some(entry),
                    RawEntry::Invalid(_) => None,
                })
                .collect(),
            RawSchedule::Invalid(_) => Vec::new(),
        };
        Ok(Self { entries })
    }
}

impl Schedule {
    pub fn normalize(&mut self) {
        self.entries.retain(ScheduleEntry::validate);
        self.entries.sort_by_key(|entry| entry.at);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn scheduled_setpoint(&self, minute_of_day: u16) -> Option<f64> {
        let mut normalized = self.clone();
        normalized.normalize();

        let first = normalized.entries.first()?;

        // Before the first program of the day the earliest entry still applies.
        let chosen = normalized
            .entries
            .iter()
            .rev()
            .find(|entry| entry.at <= minute_of_day)
            .unwrap_or(first);

        Some(chosen.temp)
    }
}

pub fn minute_of_day(time: NaiveTime) -> u16 {
    (time.hour() * 60 + time.minute()) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily_program() -> Schedule {
        Schedule {
            entries: vec![
                ScheduleEntry {
                    at: 17 * 60,
                    temp: 22.5,
                },
                ScheduleEntry {
                    at: 6 * 60,
                    temp: 22.0,
                },
                ScheduleEntry {
                    at: 22 * 60,
                    temp: 19.5,
                },
                ScheduleEntry {
                    at: 9 * 60,
                    temp: 20.0,
                },
            ],
        }
    }

    #[test]
    fn picks_latest_entry_not_after_now() {
        let schedule = daily_program();

        assert_eq!(schedule.scheduled_setpoint(9 * 60), Some(20.0));
        assert_eq!(schedule.scheduled_setpoint(16 * 60 + 59), Some(20.0));
        assert_eq!(schedule.scheduled_setpoint(23 * 60), Some(19.5));
    }

    #[test]
    fn early_morning_falls_back_to_first_entry() {
        let schedule = daily_program();
        assert_eq!(schedule.scheduled_setpoint(3 * 60), Some(22.0));
    }

    #[test]
    fn empty_schedule_has_no_setpoint() {
        assert_eq!(Schedule::default().scheduled_setpoint(12 * 60), None);
    }

    #[test]
    fn normalize_drops_invalid_entries() {
        let mut schedule = Schedule {
            entries: vec![
                ScheduleEntry {
                    at: MINUTES_PER_DAY,
                    temp: 21.0,
                },
                ScheduleEntry {
                    at: 60,
                    temp: f64::NAN,
                },
                ScheduleEntry { at: 30, temp: 20.0 },
            ],
        };
        schedule.normalize();

        assert_eq!(schedule.entries, vec![ScheduleEntry { at: 30, temp: 20.0 }]);
    }

    #[test]
    fn deserializes_from_bare_array() {
        let schedule: Schedule =
            serde_json::from_str(r#"[{"at": 360, "temp": 22.0}]"#).unwrap();
        assert_eq!(schedule.scheduled_setpoint(400), Some(22.0));
        assert_eq!(minute_of_day(NaiveTime::from_hms_opt(6, 30, 0).unwrap()), 390);
    }

    #[test]
    fn malformed_entries_are_skipped_when_decoding() {
        let schedule: Schedule = serde_json::from_str(
            r#"[{"at": -1, "temp": 20}, {"at": 360, "temp": null}, "noon", {"at": 480, "temp": 21}]"#,
        )
        .unwrap();

        assert_eq!(schedule.entries, vec![ScheduleEntry { at: 480, temp: 21.0 }]);
    }

    #[test]
    fn non_list_schedule_decodes_empty() {
        let schedule: Schedule = serde_json::from_str(r#"{"at": 360}"#).unwrap();
        assert!(schedule.is_empty());
    }
}
