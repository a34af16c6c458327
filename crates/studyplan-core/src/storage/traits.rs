use chrono::NaiveDate;

use crate::error::Result;
use crate::schedule::DailySchedule;
use crate::session::StudySessionRecord;
use crate::subject::Subject;

/// Supplies the candidate subjects for a user.
pub trait SubjectSource {
    fn list_subjects(&self, user_id: &str) -> Result<Vec<Subject>>;
}

/// Stores generated schedules, one per user per date.
pub trait ScheduleSink {
    /// Persist `schedule`, replacing any existing schedule for the same date
    /// in place. Returns the schedule id.
    fn save_schedule(&self, user_id: &str, schedule: &DailySchedule) -> Result<String>;

    fn find_schedule_for_date(&self, user_id: &str, date: NaiveDate)
        -> Result<Option<DailySchedule>>;
}

/// Records finished study sessions.
pub trait SessionLog {
    fn record_session(&self, user_id: &str, record: &StudySessionRecord) -> Result<()>;

    /// Sessions dated `from..=until`, newest first.
    fn sessions_between(
        &self,
        user_id: &str,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<StudySessionRecord>>;
}
