//! Schedule types: the dated study plan and its time-boxed entries.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// One study block in a daily schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Reference to the subject, not ownership.
    pub subject_id: String,
    /// Subject name at generation time.
    pub name: String,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    /// Minutes, always > 0.
    pub duration: u32,
}

impl ScheduleEntry {
    pub fn overlaps(&self, other: &ScheduleEntry) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }
}

/// The generated study plan for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySchedule {
    /// Assigned by the store on first save.
    #[serde(default)]
    pub id: Option<String>,
    pub date: NaiveDate,
    /// Generation order is significant.
    pub subjects: Vec<ScheduleEntry>,
    /// Minutes of study, breaks excluded.
    pub total_study_time: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DailySchedule {
    /// Build a schedule from entries, deriving the total.
    pub fn new(date: NaiveDate, subjects: Vec<ScheduleEntry>) -> Self {
        let total_study_time = subjects.iter().map(|e| e.duration).sum();
        Self {
            id: None,
            date,
            subjects,
            total_study_time,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Whether two schedules lay out the same blocks, ignoring ids and
    /// timestamps.
    pub fn same_content(&self, other: &DailySchedule) -> bool {
        self.date == other.date
            && self.subjects == other.subjects
            && self.total_study_time == other.total_study_time
    }

    pub fn entry_for(&self, subject_id: &str) -> Option<&ScheduleEntry> {
        self.subjects.iter().find(|e| e.subject_id == subject_id)
    }

    /// Minutes between the first start and the last end, breaks included.
    pub fn span_minutes(&self) -> i64 {
        match (self.subjects.first(), self.subjects.last()) {
            (Some(first), Some(last)) => (last.end_time - first.start_time).num_minutes(),
            _ => 0,
        }
    }
}

/// Wall-clock `HH:MM` (de)serialization for [`NaiveTime`].
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn format(time: &NaiveTime) -> String {
        time.format(FORMAT).to_string()
    }

    pub fn parse(s: &str) -> Result<NaiveTime, chrono::ParseError> {
        NaiveTime::parse_from_str(s.trim(), FORMAT)
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, start: &str, end: &str, duration: u32) -> ScheduleEntry {
        ScheduleEntry {
            subject_id: id.to_string(),
            name: id.to_uppercase(),
            start_time: hhmm::parse(start).unwrap(),
            end_time: hhmm::parse(end).unwrap(),
            duration,
        }
    }

    #[test]
    fn total_excludes_breaks() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let schedule = DailySchedule::new(
            date,
            vec![entry("b", "08:00", "08:30", 30), entry("a", "08:45", "09:45", 60)],
        );
        assert_eq!(schedule.total_study_time, 90);
        assert_eq!(schedule.span_minutes(), 105);
    }

    #[test]
    fn entry_serializes_as_wall_clock() {
        let json = serde_json::to_value(entry("a", "08:45", "09:45", 60)).unwrap();
        assert_eq!(json["start_time"], "08:45");
        assert_eq!(json["end_time"], "09:45");

        let back: ScheduleEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back.duration, 60);
    }

    #[test]
    fn overlap_is_half_open() {
        let a = entry("a", "08:00", "08:30", 30);
        let b = entry("b", "08:30", "09:00", 30);
        let c = entry("c", "08:15", "08:45", 30);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
    }
}
