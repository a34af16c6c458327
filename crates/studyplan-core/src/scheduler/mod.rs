//! Daily study-schedule generator.
//!
//! Turns a set of selected subjects into a same-day, non-overlapping plan:
//! - Ranks subjects by `priority_weight * 2 + difficulty_weight`
//! - Stable-sorts them, highest score first
//! - Lays them out from a fixed start time with a fixed break after each block
//!
//! The generator is pure: no I/O, no shared state. Persisting the result is
//! the caller's job (see [`crate::service::PlanService`]).

use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};
use crate::schedule::{DailySchedule, ScheduleEntry};
use crate::subject::{Subject, DEFAULT_STUDY_MINUTES};

/// Last minute a block may end at.
const LAST_MINUTE_OF_DAY: i64 = 23 * 60 + 59;

/// What to do with a subject whose daily study time is zero or missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroDurationPolicy {
    /// Substitute the default study time.
    #[default]
    UseDefault,
    /// Fail the whole generation.
    Reject,
}

/// Generator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Start of the first block
    pub day_start: NaiveTime,
    /// Gap after every block (minutes)
    pub break_minutes: u32,
    /// Study time substituted for missing or zero values (minutes)
    pub default_study_minutes: u32,
    pub zero_duration: ZeroDurationPolicy,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            day_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            break_minutes: 15,
            default_study_minutes: DEFAULT_STUDY_MINUTES,
            zero_duration: ZeroDurationPolicy::UseDefault,
        }
    }
}

/// Daily schedule generator
#[derive(Debug, Clone, Default)]
pub struct ScheduleGenerator {
    config: GeneratorConfig,
}

impl ScheduleGenerator {
    /// Create a generator with the default config (08:00 start, 15 minute breaks).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom config
    pub fn with_config(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate the schedule for `date` from the given subjects.
    ///
    /// Input order only matters between subjects with equal scores.
    ///
    /// # Errors
    /// - [`ValidationError::NoSubjectsSelected`] when `subjects` is empty
    /// - [`ValidationError::ZeroDuration`] under [`ZeroDurationPolicy::Reject`]
    /// - [`ValidationError::DayOverflow`] when the plan would run past 23:59
    pub fn generate(&self, subjects: &[Subject], date: NaiveDate) -> Result<DailySchedule> {
        if subjects.is_empty() {
            return Err(ValidationError::NoSubjectsSelected.into());
        }

        let ordered = rank(subjects);

        // Resolve every duration and check the day fits before laying out.
        let durations = ordered
            .iter()
            .map(|s| self.duration_minutes(s))
            .collect::<Result<Vec<u32>, ValidationError>>()?;
        self.check_fits_in_day(&durations)?;

        let mut current = date.and_time(self.config.day_start);
        let mut entries = Vec::with_capacity(ordered.len());

        for (subject, duration) in ordered.iter().zip(durations) {
            let end = current + Duration::minutes(duration as i64);
            entries.push(ScheduleEntry {
                subject_id: subject.id.clone(),
                name: subject.name.clone(),
                start_time: current.time(),
                end_time: end.time(),
                duration,
            });
            current = end + Duration::minutes(self.config.break_minutes as i64);
        }

        let schedule = DailySchedule::new(date, entries);
        tracing::debug!(
            %date,
            blocks = schedule.subjects.len(),
            total_minutes = schedule.total_study_time,
            "generated daily schedule"
        );
        Ok(schedule)
    }

    /// Generate from a subject catalogue and the ids the user picked.
    ///
    /// Ids that no longer exist in the catalogue are dropped. The catalogue
    /// order is used as the input order.
    ///
    /// # Errors
    /// - [`ValidationError::NoSubjectsSelected`] when `selected_ids` is empty
    /// - [`ValidationError::NoValidSubjects`] when none of the ids are known
    pub fn generate_from_selection<S: AsRef<str>>(
        &self,
        catalogue: &[Subject],
        selected_ids: &[S],
        date: NaiveDate,
    ) -> Result<DailySchedule> {
        if selected_ids.is_empty() {
            return Err(ValidationError::NoSubjectsSelected.into());
        }

        let selected = select(catalogue, selected_ids);
        if selected.is_empty() {
            return Err(ValidationError::NoValidSubjects.into());
        }
        let stale = stale_ids(catalogue, selected_ids);
        if !stale.is_empty() {
            tracing::warn!(
                stale = ?stale,
                found = selected.len(),
                "dropping stale subject ids from selection"
            );
        }

        self.generate(&selected, date)
    }

    /// Block length for a subject, defaults applied per policy.
    fn duration_minutes(&self, subject: &Subject) -> Result<u32, ValidationError> {
        match subject.daily_study_time {
            Some(time) if !time.is_zero() => Ok(time.total_minutes()),
            _ => match self.config.zero_duration {
                ZeroDurationPolicy::UseDefault => Ok(self.config.default_study_minutes.max(1)),
                ZeroDurationPolicy::Reject => Err(ValidationError::ZeroDuration {
                    subject_id: subject.id.clone(),
                }),
            },
        }
    }

    fn check_fits_in_day(&self, durations: &[u32]) -> Result<(), ValidationError> {
        let study: i64 = durations.iter().map(|&d| d as i64).sum();
        let breaks = durations.len().saturating_sub(1) as i64 * self.config.break_minutes as i64;
        let required = study + breaks;

        let start = self.config.day_start;
        let start_minute = (start.hour() * 60 + start.minute()) as i64;
        if start_minute + required > LAST_MINUTE_OF_DAY {
            return Err(ValidationError::DayOverflow {
                start,
                required_minutes: required,
            });
        }
        Ok(())
    }
}

/// Stable sort by descending score.
pub fn rank(subjects: &[Subject]) -> Vec<Subject> {
    let mut ordered = subjects.to_vec();
    // `sort_by_key` is stable; ties keep input order.
    ordered.sort_by_key(|s| std::cmp::Reverse(s.score()));
    ordered
}

/// Selected ids that match no subject in `catalogue`, each listed once.
pub fn stale_ids<'a, S: AsRef<str>>(catalogue: &[Subject], selected_ids: &'a [S]) -> Vec<&'a str> {
    let mut stale: Vec<&str> = Vec::new();
    for id in selected_ids.iter().map(AsRef::as_ref) {
        if !catalogue.iter().any(|s| s.id == id) && !stale.contains(&id) {
            stale.push(id);
        }
    }
    stale
}

/// Subjects from `catalogue` whose ids were selected, in catalogue order.
pub fn select<S: AsRef<str>>(catalogue: &[Subject], selected_ids: &[S]) -> Vec<Subject> {
    catalogue
        .iter()
        .filter(|s| selected_ids.iter().any(|id| id.as_ref() == s.id))
        .cloned()
        .collect()
}
