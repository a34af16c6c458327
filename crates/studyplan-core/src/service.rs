//! Orchestration over the store: generate-and-save, planner runs, and
//! finishing study sessions.

use chrono::{Local, NaiveDate};

use crate::error::Result;
use crate::metrics::StudyMetrics;
use crate::planner::Planner;
use crate::schedule::DailySchedule;
use crate::scheduler::ScheduleGenerator;
use crate::session::StudySessionRecord;
use crate::storage::{Config, Database, ScheduleSink, SessionLog, SessionsConfig, SubjectSource};
use crate::subject::Subject;

/// The local calendar day, used when no reference date is given.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub struct PlanService<'a, D: ?Sized> {
    store: &'a D,
    generator: ScheduleGenerator,
    sessions: SessionsConfig,
}

impl<'a, D: ?Sized> PlanService<'a, D> {
    pub fn new(store: &'a D) -> Self {
        Self {
            store,
            generator: ScheduleGenerator::new(),
            sessions: SessionsConfig::default(),
        }
    }

    /// Build a service using the planner and session settings from `config`.
    pub fn from_config(store: &'a D, config: &Config) -> Result<Self> {
        Ok(Self {
            store,
            generator: ScheduleGenerator::with_config(config.planner.generator_config()?),
            sessions: config.sessions.clone(),
        })
    }

    pub fn generator(&self) -> &ScheduleGenerator {
        &self.generator
    }
}

impl<'a, D: SubjectSource + ScheduleSink + ?Sized> PlanService<'a, D> {
    /// Generate the schedule for `date` from the selected subject ids and
    /// store it, replacing any schedule already saved for that date.
    ///
    /// Nothing is written when generation fails.
    pub fn generate_schedule<S: AsRef<str>>(
        &self,
        user_id: &str,
        selected_ids: &[S],
        date: NaiveDate,
    ) -> Result<DailySchedule> {
        let catalogue = self.store.list_subjects(user_id)?;
        let mut schedule = self
            .generator
            .generate_from_selection(&catalogue, selected_ids, date)?;

        if let Some(existing) = self.store.find_schedule_for_date(user_id, date)? {
            tracing::debug!(
                user_id,
                %date,
                schedule_id = existing.id.as_deref().unwrap_or(""),
                "replacing existing schedule"
            );
        }

        let id = self.store.save_schedule(user_id, &schedule)?;
        schedule.id = Some(id);
        Ok(schedule)
    }

    /// Run one generation through the planner lifecycle.
    ///
    /// On success the planner ends in `Displayed`; on failure it returns to
    /// its selection and the error is handed back.
    pub fn run_planner(&self, planner: &mut Planner, user_id: &str) -> Result<DailySchedule> {
        let selected = planner.begin_generation()?;
        match self.generate_schedule(user_id, selected.as_slice(), planner.date()) {
            Ok(schedule) => {
                planner.finish_generation(schedule.clone())?;
                Ok(schedule)
            }
            Err(e) => {
                planner.fail_generation()?;
                Err(e)
            }
        }
    }

    /// Load the saved schedule for `date` into the planner, if there is one.
    pub fn open_saved(
        &self,
        planner: &mut Planner,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySchedule>> {
        match self.store.find_schedule_for_date(user_id, date)? {
            Some(schedule) => {
                planner.show(schedule.clone())?;
                Ok(Some(schedule))
            }
            None => {
                planner.set_date(date)?;
                Ok(None)
            }
        }
    }
}

impl<'a, D: SessionLog + ?Sized> PlanService<'a, D> {
    pub fn metrics(&self, user_id: &str, date: NaiveDate) -> Result<StudyMetrics> {
        StudyMetrics::load(self.store, user_id, date, self.sessions.daily_goal_minutes)
    }
}

impl<'a> PlanService<'a, Database> {
    /// Store a finished session and credit its subject.
    ///
    /// The subject gains `progress_increment` points (capped at 100) and its
    /// streak is updated. Returns the updated subject, or `None` if it was
    /// deleted while the session ran.
    pub fn complete_session(
        &self,
        user_id: &str,
        record: &StudySessionRecord,
    ) -> Result<Option<Subject>> {
        self.store.record_session(user_id, record)?;

        let Some(mut subject) = self.store.get_subject(user_id, &record.subject_id)? else {
            tracing::warn!(
                user_id,
                subject_id = %record.subject_id,
                "session finished for a subject that no longer exists"
            );
            return Ok(None);
        };

        subject.progress = subject
            .progress
            .saturating_add(self.sessions.progress_increment)
            .min(100);
        subject.record_study_day(record.date);
        self.store.update_subject(user_id, &subject)?;
        Ok(Some(subject))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, SessionError, ValidationError};
    use crate::planner::PlannerState;
    use crate::session::SessionStatus;
    use crate::subject::{Difficulty, Priority};
    use chrono::{Duration, TimeZone, Utc};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn seed(db: &Database) -> (Subject, Subject) {
        let a = Subject::new("Algebra")
            .with_priority(Priority::Low)
            .with_difficulty(Difficulty::Beginner)
            .with_study_time(1, 0);
        let b = Subject::new("Biology")
            .with_priority(Priority::High)
            .with_difficulty(Difficulty::Advanced)
            .with_study_time(0, 30);
        db.create_subject("u1", &a).unwrap();
        db.create_subject("u1", &b).unwrap();
        (a, b)
    }

    #[test]
    fn generate_and_replace() {
        let db = Database::open_memory().unwrap();
        let (a, b) = seed(&db);
        let service = PlanService::new(&db);

        let first = service.generate_schedule("u1", &[&a.id, &b.id], day()).unwrap();
        assert_eq!(first.subjects[0].subject_id, b.id);
        assert_eq!(first.total_study_time, 90);

        let second = service.generate_schedule("u1", &[&a.id], day()).unwrap();
        assert_eq!(second.id, first.id);

        let stored = db.find_schedule_for_date("u1", day()).unwrap().unwrap();
        assert_eq!(stored.subjects.len(), 1);
        assert_eq!(stored.total_study_time, 60);
    }

    #[test]
    fn failed_generation_writes_nothing() {
        let db = Database::open_memory().unwrap();
        seed(&db);
        let service = PlanService::new(&db);

        let err = service.generate_schedule("u1", &["stale"], day()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::NoValidSubjects)));
        assert!(db.find_schedule_for_date("u1", day()).unwrap().is_none());
    }

    #[test]
    fn planner_run_ends_displayed() {
        let db = Database::open_memory().unwrap();
        let (a, _) = seed(&db);
        let service = PlanService::new(&db);

        let mut planner = Planner::new(day());
        planner.select(&a.id).unwrap();
        let schedule = service.run_planner(&mut planner, "u1").unwrap();
        assert_eq!(planner.state(), PlannerState::Displayed);
        assert_eq!(planner.displayed(), Some(&schedule));
    }

    #[test]
    fn planner_run_failure_restores_selection() {
        let db = Database::open_memory().unwrap();
        let service = PlanService::new(&db);

        let mut planner = Planner::new(day());
        planner.select("deleted-subject").unwrap();
        assert!(service.run_planner(&mut planner, "u1").is_err());
        assert_eq!(planner.state(), PlannerState::SubjectSelected);

        let mut idle = Planner::new(day());
        let err = service.run_planner(&mut idle, "u1").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Session(SessionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn open_saved_shows_existing_schedule() {
        let db = Database::open_memory().unwrap();
        let (a, _) = seed(&db);
        let service = PlanService::new(&db);
        service.generate_schedule("u1", &[&a.id], day()).unwrap();

        let mut planner = Planner::new(day() + Duration::days(3));
        let shown = service.open_saved(&mut planner, "u1", day()).unwrap();
        assert!(shown.is_some());
        assert_eq!(planner.state(), PlannerState::Displayed);

        let empty = service
            .open_saved(&mut planner, "u1", day() + Duration::days(1))
            .unwrap();
        assert!(empty.is_none());
        assert_eq!(planner.state(), PlannerState::Idle);
    }

    #[test]
    fn completing_sessions_credits_subject() {
        let db = Database::open_memory().unwrap();
        let (a, _) = seed(&db);
        db.update_progress("u1", &a.id, 98).unwrap();
        let service = PlanService::new(&db);

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let record = StudySessionRecord {
            id: "s1".into(),
            subject_id: a.id.clone(),
            subject_name: a.name.clone(),
            date: day(),
            started_at: start,
            ended_at: start + Duration::minutes(50),
            duration_secs: 50 * 60,
            status: SessionStatus::Completed,
        };

        let updated = service.complete_session("u1", &record).unwrap().unwrap();
        assert_eq!(updated.progress, 100);
        assert_eq!(updated.streak, 1);
        assert_eq!(updated.last_studied_date, Some(day()));

        let metrics = service.metrics("u1", day()).unwrap();
        assert_eq!(metrics.sessions_completed, 1);
        assert_eq!(metrics.total_study_minutes(), 50);
        assert_eq!(metrics.active_streak, 1);
    }

    #[test]
    fn completing_session_for_deleted_subject_still_records() {
        let db = Database::open_memory().unwrap();
        let service = PlanService::new(&db);
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let record = StudySessionRecord {
            id: "s2".into(),
            subject_id: "gone".into(),
            subject_name: "Gone".into(),
            date: day(),
            started_at: start,
            ended_at: start + Duration::minutes(10),
            duration_secs: 600,
            status: SessionStatus::Completed,
        };

        assert!(service.complete_session("u1", &record).unwrap().is_none());
        assert_eq!(service.metrics("u1", day()).unwrap().sessions_completed, 1);
    }
}
