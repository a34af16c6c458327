//! Subjects (courses) a student tracks, with the metadata the scheduler
//! ranks them by.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Category given to subjects created without one.
pub const DEFAULT_CATEGORY: &str = "core";

/// Minutes used when a subject has no usable daily study time.
pub const DEFAULT_STUDY_MINUTES: u32 = 30;

/// How hard a subject is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Ranking weight: advanced 3, intermediate 2, beginner 1.
    pub fn weight(self) -> u32 {
        match self {
            Difficulty::Advanced => 3,
            Difficulty::Intermediate => 2,
            Difficulty::Beginner => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(ValidationError::InvalidValue {
                field: "difficulty".into(),
                message: format!("expected beginner, intermediate or advanced, got '{other}'"),
            }),
        }
    }
}

/// How much the student wants to focus on a subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Ranking weight: high 3, medium 2, low 1.
    pub fn weight(self) -> u32 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(ValidationError::InvalidValue {
                field: "priority".into(),
                message: format!("expected high, medium or low, got '{other}'"),
            }),
        }
    }
}

/// Desired study time per day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyTime {
    pub hours: u32,
    pub minutes: u32,
}

impl StudyTime {
    pub fn new(hours: u32, minutes: u32) -> Self {
        Self { hours, minutes }
    }

    pub fn from_minutes(total: u32) -> Self {
        Self {
            hours: total / 60,
            minutes: total % 60,
        }
    }

    /// Total minutes, saturating on absurd inputs.
    pub fn total_minutes(&self) -> u32 {
        self.hours.saturating_mul(60).saturating_add(self.minutes)
    }

    pub fn is_zero(&self) -> bool {
        self.total_minutes() == 0
    }
}

/// A user-defined topic of study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub daily_study_time: Option<StudyTime>,
    /// 0..=100
    #[serde(default)]
    pub progress: u8,
    /// Consecutive study days.
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub last_studied_date: Option<NaiveDate>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub topics: Vec<String>,
    /// Links or titles of study material.
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Weekdays the subject is studied on. Empty means every day.
    #[serde(default)]
    pub study_days: Vec<Weekday>,
    pub created_at: DateTime<Utc>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

impl Subject {
    /// Create a subject with a fresh id and no scheduling metadata.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            difficulty: None,
            priority: None,
            daily_study_time: None,
            progress: 0,
            streak: 0,
            last_studied_date: None,
            category: default_category(),
            topics: Vec::new(),
            resources: Vec::new(),
            start_date: None,
            end_date: None,
            study_days: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_study_time(mut self, hours: u32, minutes: u32) -> Self {
        self.daily_study_time = Some(StudyTime::new(hours, minutes));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Difficulty with the beginner default applied.
    pub fn effective_difficulty(&self) -> Difficulty {
        self.difficulty.unwrap_or_default()
    }

    /// Priority with the medium default applied.
    pub fn effective_priority(&self) -> Priority {
        self.priority.unwrap_or_default()
    }

    /// Ranking score: `priority_weight * 2 + difficulty_weight`.
    pub fn score(&self) -> u32 {
        self.effective_priority().weight() * 2 + self.effective_difficulty().weight()
    }

    /// Check the fields a user can type in.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".into(),
                message: "subject name must not be empty".into(),
            });
        }
        if self.progress > 100 {
            return Err(ValidationError::ProgressOutOfRange(self.progress as i64));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(ValidationError::InvalidValue {
                    field: "end_date".into(),
                    message: format!("{end} is before the start date {start}"),
                });
            }
        }
        Ok(())
    }

    /// Whether `date` falls inside the course dates and on a study day.
    pub fn is_studied_on(&self, date: NaiveDate) -> bool {
        let started = self.start_date.map_or(true, |start| start <= date);
        let not_ended = self.end_date.map_or(true, |end| date <= end);
        let study_day = self.study_days.is_empty() || self.study_days.contains(&date.weekday());
        started && not_ended && study_day
    }

    /// Record a study day, keeping the streak of consecutive days.
    pub fn record_study_day(&mut self, day: NaiveDate) {
        self.streak = match self.last_studied_date {
            Some(last) if last == day => self.streak.max(1),
            Some(last) if last.succ_opt() == Some(day) => self.streak + 1,
            // Out-of-order records never shorten an existing streak.
            Some(last) if last > day => return,
            _ => 1,
        };
        self.last_studied_date = Some(day);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_uses_defaults() {
        let subject = Subject::new("Chemistry");
        // medium (2) * 2 + beginner (1)
        assert_eq!(subject.score(), 5);

        let hard = Subject::new("Physics")
            .with_priority(Priority::High)
            .with_difficulty(Difficulty::Advanced);
        assert_eq!(hard.score(), 9);
    }

    #[test]
    fn parses_levels_case_insensitively() {
        assert_eq!("Advanced".parse::<Difficulty>().unwrap(), Difficulty::Advanced);
        assert_eq!(" low ".parse::<Priority>().unwrap(), Priority::Low);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn study_time_total() {
        assert_eq!(StudyTime::new(1, 30).total_minutes(), 90);
        assert_eq!(StudyTime::from_minutes(135), StudyTime::new(2, 15));
        assert!(StudyTime::default().is_zero());
    }

    #[test]
    fn validate_rejects_blank_name() {
        let subject = Subject::new("   ");
        assert!(matches!(
            subject.validate(),
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "name"
        ));
    }

    #[test]
    fn streak_counts_consecutive_days() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        let mut subject = Subject::new("History");

        subject.record_study_day(d(1));
        assert_eq!(subject.streak, 1);
        subject.record_study_day(d(1));
        assert_eq!(subject.streak, 1);
        subject.record_study_day(d(2));
        assert_eq!(subject.streak, 2);
        subject.record_study_day(d(5));
        assert_eq!(subject.streak, 1);
        assert_eq!(subject.last_studied_date, Some(d(5)));
    }

    #[test]
    fn deserializes_without_optional_fields() {
        let json = r#"{"id":"s1","name":"Art","created_at":"2024-01-01T00:00:00Z"}"#;
        let subject: Subject = serde_json::from_str(json).unwrap();
        assert_eq!(subject.difficulty, None);
        assert_eq!(subject.effective_priority(), Priority::Medium);
        assert_eq!(subject.progress, 0);
        assert_eq!(subject.category, "core");
        assert!(subject.topics.is_empty());
    }

    #[test]
    fn course_dates_must_be_ordered() {
        let mut subject = Subject::new("Statistics");
        subject.start_date = NaiveDate::from_ymd_opt(2024, 2, 1);
        subject.end_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        assert!(matches!(
            subject.validate(),
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "end_date"
        ));

        subject.end_date = subject.start_date;
        assert!(subject.validate().is_ok());
    }

    #[test]
    fn study_days_and_dates_limit_when_a_subject_is_studied() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let mut subject = Subject::new("Drawing");
        assert!(subject.is_studied_on(d(1)));

        // 2024-01-01 is a Monday.
        subject.study_days = vec![Weekday::Mon, Weekday::Wed];
        assert!(subject.is_studied_on(d(1)));
        assert!(!subject.is_studied_on(d(2)));
        assert!(subject.is_studied_on(d(3)));

        subject.start_date = Some(d(2));
        subject.end_date = Some(d(10));
        assert!(!subject.is_studied_on(d(1)));
        assert!(subject.is_studied_on(d(8)));
        assert!(!subject.is_studied_on(d(15)));
    }
}
