//! SQLite-based storage for subjects, schedules and study sessions.
//!
//! Provides persistent storage for:
//! - Subjects and their progress/streak
//! - Daily schedules (one per user per date) and their entries
//! - Completed study sessions
//! - Key-value store for application state
//!
//! Every write publishes a [`ChangeEvent`] on the database's [`ChangeFeed`].

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::data_dir;
use super::migrations;
use super::traits::{ScheduleSink, SessionLog, SubjectSource};
use crate::error::{DatabaseError, Result, ValidationError};
use crate::events::{ChangeEvent, ChangeFeed};
use crate::profile::UserProfile;
use crate::schedule::{hhmm, DailySchedule, ScheduleEntry};
use crate::session::{SessionStatus, StudySessionRecord};
use crate::subject::{Priority, StudyTime, Subject};
use crate::task::StudyTask;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SUBJECT_COLUMNS: &str = "id, name, description, difficulty, priority, daily_hours, \
     daily_minutes, progress, streak, last_studied_date, created_at, category, topics, \
     resources, start_date, end_date, study_days";

const TASK_COLUMNS: &str =
    "id, subject_id, name, description, due_date, completed, created_at, updated_at";

const PROFILE_COLUMNS: &str = "user_id, full_name, date_of_birth, education_level, \
     field_of_study, institution, graduation_year, goals, interests, onboarding_completed, \
     created_at, updated_at";

// === Helper Functions ===

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// Parse a stored date, surfacing corruption as a conversion error.
fn parse_date_column(s: &str, column: usize) -> Result<NaiveDate, rusqlite::Error> {
    parse_date(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            format!("invalid date '{s}'").into(),
        )
    })
}

/// Parse datetime from RFC3339 string with fallback to current time
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Decode a JSON text column, surfacing corruption as a conversion error.
fn parse_json_column<T: DeserializeOwned>(s: &str, column: usize) -> Result<T, rusqlite::Error> {
    serde_json::from_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn to_json_column<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn parse_time_column(s: &str, column: usize) -> Result<chrono::NaiveTime, rusqlite::Error> {
    hhmm::parse(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_status(s: &str) -> SessionStatus {
    match s {
        "active" => SessionStatus::Active,
        "paused" => SessionStatus::Paused,
        _ => SessionStatus::Completed,
    }
}

fn format_status(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Active => "active",
        SessionStatus::Paused => "paused",
        SessionStatus::Completed => "completed",
    }
}

/// Build a Subject from a row selected with [`SUBJECT_COLUMNS`].
fn row_to_subject(row: &rusqlite::Row) -> Result<Subject, rusqlite::Error> {
    let difficulty: Option<String> = row.get(3)?;
    let priority: Option<String> = row.get(4)?;
    let hours: Option<u32> = row.get(5)?;
    let minutes: Option<u32> = row.get(6)?;
    let progress: i64 = row.get(7)?;
    let last_studied: Option<String> = row.get(9)?;
    let created_at: String = row.get(10)?;
    let topics: String = row.get(12)?;
    let resources: String = row.get(13)?;
    let start_date: Option<String> = row.get(14)?;
    let end_date: Option<String> = row.get(15)?;
    let study_days: String = row.get(16)?;

    let daily_study_time = match (hours, minutes) {
        (None, None) => None,
        (h, m) => Some(StudyTime::new(h.unwrap_or(0), m.unwrap_or(0))),
    };

    Ok(Subject {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        // Unknown stored values fall back to the scheduling defaults.
        difficulty: difficulty.and_then(|d| d.parse().ok()),
        priority: priority.and_then(|p| p.parse().ok()),
        daily_study_time,
        progress: progress.clamp(0, 100) as u8,
        streak: row.get(8)?,
        last_studied_date: last_studied.as_deref().and_then(parse_date),
        category: row.get(11)?,
        topics: parse_json_column(&topics, 12)?,
        resources: parse_json_column(&resources, 13)?,
        start_date: start_date.as_deref().and_then(parse_date),
        end_date: end_date.as_deref().and_then(parse_date),
        study_days: parse_json_column(&study_days, 16)?,
        created_at: parse_datetime_fallback(&created_at),
    })
}

fn row_to_task(row: &rusqlite::Row) -> Result<StudyTask, rusqlite::Error> {
    let due_date: Option<String> = row.get(4)?;
    let created_at: String = row.get(6)?;
    let updated_at: Option<String> = row.get(7)?;

    Ok(StudyTask {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        due_date: due_date.as_deref().and_then(parse_date),
        completed: row.get(5)?,
        created_at: parse_datetime_fallback(&created_at),
        updated_at: updated_at.as_deref().map(parse_datetime_fallback),
    })
}

fn row_to_profile(row: &rusqlite::Row) -> Result<UserProfile, rusqlite::Error> {
    let date_of_birth: Option<String> = row.get(2)?;
    let education_level: Option<String> = row.get(3)?;
    let goals: String = row.get(7)?;
    let interests: String = row.get(8)?;
    let created_at: String = row.get(10)?;
    let updated_at: Option<String> = row.get(11)?;

    Ok(UserProfile {
        user_id: row.get(0)?,
        full_name: row.get(1)?,
        date_of_birth: date_of_birth.as_deref().and_then(parse_date),
        education_level: education_level.and_then(|e| e.parse().ok()),
        field_of_study: row.get(4)?,
        institution: row.get(5)?,
        graduation_year: row.get(6)?,
        goals: parse_json_column(&goals, 7)?,
        interests: parse_json_column(&interests, 8)?,
        onboarding_completed: row.get(9)?,
        created_at: parse_datetime_fallback(&created_at),
        updated_at: updated_at.as_deref().map(parse_datetime_fallback),
    })
}

/// id, date, total_study_time, created_at, updated_at
type ScheduleHeader = (String, String, u32, String, Option<String>);

fn row_to_schedule_header(row: &rusqlite::Row) -> Result<ScheduleHeader, rusqlite::Error> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn row_to_session(row: &rusqlite::Row) -> Result<StudySessionRecord, rusqlite::Error> {
    let date: String = row.get(3)?;
    let started_at: String = row.get(4)?;
    let ended_at: String = row.get(5)?;
    let status: String = row.get(7)?;

    Ok(StudySessionRecord {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        subject_name: row.get(2)?,
        date: parse_date_column(&date, 3)?,
        started_at: parse_datetime_fallback(&started_at),
        ended_at: parse_datetime_fallback(&ended_at),
        duration_secs: row.get(6)?,
        status: parse_status(&status),
    })
}

/// SQLite database for the study planner.
pub struct Database {
    conn: Connection,
    feed: ChangeFeed,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Change notifications for writes made through this handle.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Replace the change feed, e.g. to share one between handles.
    pub fn with_feed(mut self, feed: ChangeFeed) -> Self {
        self.feed = feed;
        self
    }

    /// Open the database at `~/.config/studyplan/studyplan.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("studyplan.db");
        Self::open_at(&path)
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn,
            feed: ChangeFeed::new(),
        })
    }

    // === Subjects ===

    /// Insert a new subject for `user_id`.
    ///
    /// # Errors
    /// Returns a validation error for a blank name or out-of-range progress.
    pub fn create_subject(&self, user_id: &str, subject: &Subject) -> Result<()> {
        subject.validate()?;
        let time = subject.daily_study_time;
        self.conn.execute(
            "INSERT INTO subjects (id, user_id, name, description, difficulty, priority,
                                   daily_hours, daily_minutes, progress, streak,
                                   last_studied_date, created_at, category, topics,
                                   resources, start_date, end_date, study_days)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18)",
            params![
                subject.id,
                user_id,
                subject.name.trim(),
                subject.description,
                subject.difficulty.map(|d| d.as_str()),
                subject.priority.map(|p| p.as_str()),
                time.map(|t| t.hours),
                time.map(|t| t.minutes),
                subject.progress,
                subject.streak,
                subject.last_studied_date.map(format_date),
                subject.created_at.to_rfc3339(),
                subject.category,
                to_json_column(&subject.topics)?,
                to_json_column(&subject.resources)?,
                subject.start_date.map(format_date),
                subject.end_date.map(format_date),
                to_json_column(&subject.study_days)?,
            ],
        )?;
        tracing::info!(user_id, subject_id = %subject.id, "subject created");
        self.publish_subject_change(user_id, &subject.id);
        Ok(())
    }

    /// Overwrite every mutable field of an existing subject.
    pub fn update_subject(&self, user_id: &str, subject: &Subject) -> Result<()> {
        subject.validate()?;
        let time = subject.daily_study_time;
        let changed = self.conn.execute(
            "UPDATE subjects SET name = ?3, description = ?4, difficulty = ?5, priority = ?6,
                                 daily_hours = ?7, daily_minutes = ?8, progress = ?9,
                                 streak = ?10, last_studied_date = ?11, category = ?12,
                                 topics = ?13, resources = ?14, start_date = ?15,
                                 end_date = ?16, study_days = ?17
             WHERE id = ?1 AND user_id = ?2",
            params![
                subject.id,
                user_id,
                subject.name.trim(),
                subject.description,
                subject.difficulty.map(|d| d.as_str()),
                subject.priority.map(|p| p.as_str()),
                time.map(|t| t.hours),
                time.map(|t| t.minutes),
                subject.progress,
                subject.streak,
                subject.last_studied_date.map(format_date),
                subject.category,
                to_json_column(&subject.topics)?,
                to_json_column(&subject.resources)?,
                subject.start_date.map(format_date),
                subject.end_date.map(format_date),
                to_json_column(&subject.study_days)?,
            ],
        )?;
        if changed == 0 {
            return Err(subject_not_found(&subject.id));
        }
        self.publish_subject_change(user_id, &subject.id);
        Ok(())
    }

    pub fn get_subject(&self, user_id: &str, id: &str) -> Result<Option<Subject>> {
        let sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = ?1 AND user_id = ?2");
        let subject = self
            .conn
            .query_row(&sql, params![id, user_id], row_to_subject)
            .optional()?;
        Ok(subject)
    }

    /// Set progress (0..=100) and return the updated subject.
    pub fn update_progress(&self, user_id: &str, id: &str, progress: i64) -> Result<Subject> {
        if !(0..=100).contains(&progress) {
            return Err(ValidationError::ProgressOutOfRange(progress).into());
        }
        let mut subject = self
            .get_subject(user_id, id)?
            .ok_or_else(|| subject_not_found(id))?;
        subject.progress = progress as u8;
        self.update_subject(user_id, &subject)?;
        Ok(subject)
    }

    pub fn update_priority(&self, user_id: &str, id: &str, priority: Priority) -> Result<Subject> {
        let mut subject = self
            .get_subject(user_id, id)?
            .ok_or_else(|| subject_not_found(id))?;
        subject.priority = Some(priority);
        self.update_subject(user_id, &subject)?;
        Ok(subject)
    }

    /// Delete a subject. Saved schedules keep their entries.
    pub fn delete_subject(&self, user_id: &str, id: &str) -> Result<()> {
        let changed = self.conn.execute(
            "DELETE FROM subjects WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if changed == 0 {
            return Err(subject_not_found(id));
        }
        tracing::info!(user_id, subject_id = id, "subject deleted");
        self.feed.publish(
            user_id,
            &ChangeEvent::SubjectDeleted {
                subject_id: id.to_string(),
                at: Utc::now(),
            },
        );
        Ok(())
    }

    fn publish_subject_change(&self, user_id: &str, subject_id: &str) {
        self.feed.publish(
            user_id,
            &ChangeEvent::SubjectsChanged {
                subject_id: subject_id.to_string(),
                at: Utc::now(),
            },
        );
    }

    // === Schedules ===

    fn load_entries(&self, schedule_id: &str) -> Result<Vec<ScheduleEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT subject_id, name, start_time, end_time, duration
             FROM schedule_entries
             WHERE schedule_id = ?1
             ORDER BY position",
        )?;
        let rows = stmt.query_map(params![schedule_id], |row| {
            let start: String = row.get(2)?;
            let end: String = row.get(3)?;
            Ok(ScheduleEntry {
                subject_id: row.get(0)?,
                name: row.get(1)?,
                start_time: parse_time_column(&start, 2)?,
                end_time: parse_time_column(&end, 3)?,
                duration: row.get(4)?,
            })
        })?;
        let entries = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn schedule_from_header(
        &self,
        (id, date, total, created_at, updated_at): ScheduleHeader,
    ) -> Result<DailySchedule> {
        let date = parse_date_column(&date, 2).map_err(DatabaseError::from)?;
        let subjects = self.load_entries(&id)?;
        Ok(DailySchedule {
            id: Some(id),
            date,
            subjects,
            total_study_time: total,
            created_at: parse_datetime_fallback(&created_at),
            updated_at: updated_at.as_deref().map(parse_datetime_fallback),
        })
    }

    /// All saved schedules for a user, most recent date first.
    pub fn list_schedules(&self, user_id: &str) -> Result<Vec<DailySchedule>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, total_study_time, created_at, updated_at
             FROM schedules
             WHERE user_id = ?1
             ORDER BY date DESC",
        )?;
        let headers = stmt
            .query_map(params![user_id], row_to_schedule_header)?
            .collect::<Result<Vec<_>, _>>()?;

        headers
            .into_iter()
            .map(|header| self.schedule_from_header(header))
            .collect()
    }

    // === Tasks ===

    /// Add a task to one of the user's subjects.
    ///
    /// # Errors
    /// A validation error for a blank name, or `NotFound` if the subject does
    /// not belong to the user.
    pub fn create_task(&self, user_id: &str, task: &StudyTask) -> Result<()> {
        task.validate()?;
        if self.get_subject(user_id, &task.subject_id)?.is_none() {
            return Err(subject_not_found(&task.subject_id));
        }
        self.conn.execute(
            "INSERT INTO tasks (id, user_id, subject_id, name, description, due_date,
                                completed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                task.id,
                user_id,
                task.subject_id,
                task.name.trim(),
                task.description,
                task.due_date.map(format_date),
                task.completed,
                task.created_at.to_rfc3339(),
            ],
        )?;
        tracing::info!(user_id, task_id = %task.id, subject_id = %task.subject_id, "task created");
        self.publish_task_change(user_id, task);
        Ok(())
    }

    /// Tasks of a subject, earliest due date first, undated last.
    pub fn list_tasks(&self, user_id: &str, subject_id: &str) -> Result<Vec<StudyTask>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE user_id = ?1 AND subject_id = ?2
             ORDER BY due_date IS NULL, due_date ASC, created_at ASC, rowid ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let tasks = stmt
            .query_map(params![user_id, subject_id], row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn get_task(&self, user_id: &str, id: &str) -> Result<Option<StudyTask>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND user_id = ?2");
        let task = self
            .conn
            .query_row(&sql, params![id, user_id], row_to_task)
            .optional()?;
        Ok(task)
    }

    /// Overwrite the editable fields of a task and stamp `updated_at`.
    pub fn update_task(&self, user_id: &str, task: &StudyTask) -> Result<StudyTask> {
        task.validate()?;
        let now = Utc::now();
        let changed = self.conn.execute(
            "UPDATE tasks SET name = ?3, description = ?4, due_date = ?5, completed = ?6,
                              updated_at = ?7
             WHERE id = ?1 AND user_id = ?2",
            params![
                task.id,
                user_id,
                task.name.trim(),
                task.description,
                task.due_date.map(format_date),
                task.completed,
                now.to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(task_not_found(&task.id));
        }
        self.publish_task_change(user_id, task);
        let mut updated = task.clone();
        updated.name = task.name.trim().to_string();
        updated.updated_at = Some(now);
        Ok(updated)
    }

    pub fn set_task_completed(
        &self,
        user_id: &str,
        id: &str,
        completed: bool,
    ) -> Result<StudyTask> {
        let mut task = self
            .get_task(user_id, id)?
            .ok_or_else(|| task_not_found(id))?;
        task.completed = completed;
        self.update_task(user_id, &task)
    }

    pub fn delete_task(&self, user_id: &str, id: &str) -> Result<()> {
        let task = self
            .get_task(user_id, id)?
            .ok_or_else(|| task_not_found(id))?;
        self.conn.execute(
            "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        tracing::info!(user_id, task_id = id, "task deleted");
        self.publish_task_change(user_id, &task);
        Ok(())
    }

    fn publish_task_change(&self, user_id: &str, task: &StudyTask) {
        self.feed.publish(
            user_id,
            &ChangeEvent::TasksChanged {
                subject_id: task.subject_id.clone(),
                task_id: task.id.clone(),
                at: Utc::now(),
            },
        );
    }

    // === Profiles ===

    /// Load the user's profile, creating an empty one on first access.
    pub fn get_or_create_profile(&self, user_id: &str) -> Result<UserProfile> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1");
        if let Some(profile) = self
            .conn
            .query_row(&sql, params![user_id], row_to_profile)
            .optional()?
        {
            return Ok(profile);
        }

        let profile = UserProfile::new(user_id);
        self.conn.execute(
            "INSERT INTO profiles (user_id, created_at) VALUES (?1, ?2)",
            params![user_id, profile.created_at.to_rfc3339()],
        )?;
        tracing::info!(user_id, "profile created");
        Ok(profile)
    }

    /// Store every field of `profile`, creating the row if needed.
    pub fn save_profile(&self, profile: &UserProfile) -> Result<UserProfile> {
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO profiles (user_id, full_name, date_of_birth, education_level,
                                   field_of_study, institution, graduation_year, goals,
                                   interests, onboarding_completed, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(user_id) DO UPDATE SET
                full_name = excluded.full_name,
                date_of_birth = excluded.date_of_birth,
                education_level = excluded.education_level,
                field_of_study = excluded.field_of_study,
                institution = excluded.institution,
                graduation_year = excluded.graduation_year,
                goals = excluded.goals,
                interests = excluded.interests,
                onboarding_completed = excluded.onboarding_completed,
                updated_at = excluded.updated_at",
            params![
                profile.user_id,
                profile.full_name.trim(),
                profile.date_of_birth.map(format_date),
                profile.education_level.map(|e| e.as_str()),
                profile.field_of_study,
                profile.institution,
                profile.graduation_year,
                to_json_column(&profile.goals)?,
                to_json_column(&profile.interests)?,
                profile.onboarding_completed,
                profile.created_at.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;
        self.feed.publish(
            &profile.user_id,
            &ChangeEvent::ProfileUpdated {
                onboarding_completed: profile.onboarding_completed,
                at: now,
            },
        );
        self.get_or_create_profile(&profile.user_id)
    }

    // === Key-value ===

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn subject_not_found(id: &str) -> crate::error::CoreError {
    DatabaseError::NotFound {
        kind: "subject",
        id: id.to_string(),
    }
    .into()
}

fn task_not_found(id: &str) -> crate::error::CoreError {
    DatabaseError::NotFound {
        kind: "task",
        id: id.to_string(),
    }
    .into()
}

impl SubjectSource for Database {
    /// Newest subjects first.
    fn list_subjects(&self, user_id: &str) -> Result<Vec<Subject>> {
        let sql = format!(
            "SELECT {SUBJECT_COLUMNS} FROM subjects WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let subjects = stmt
            .query_map(params![user_id], row_to_subject)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(subjects)
    }
}

impl ScheduleSink for Database {
    /// Insert or replace in place.
    ///
    /// An existing schedule for the same user and date keeps its id and
    /// creation time; its entries are cleared and rewritten and its total is
    /// recomputed. `schedule.id` is ignored: new rows always get a fresh id.
    fn save_schedule(&self, user_id: &str, schedule: &DailySchedule) -> Result<String> {
        let date = format_date(schedule.date);
        let now = Utc::now();
        let tx = self.conn.unchecked_transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM schedules WHERE user_id = ?1 AND date = ?2",
                params![user_id, date],
                |row| row.get(0),
            )
            .optional()?;
        let replaced = existing.is_some();

        let id = match existing {
            Some(id) => {
                tx.execute(
                    "DELETE FROM schedule_entries WHERE schedule_id = ?1",
                    params![id],
                )?;
                tx.execute(
                    "UPDATE schedules SET total_study_time = 0, updated_at = ?2 WHERE id = ?1",
                    params![id, now.to_rfc3339()],
                )?;
                id
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO schedules (id, user_id, date, total_study_time, created_at)
                     VALUES (?1, ?2, ?3, 0, ?4)",
                    params![id, user_id, date, schedule.created_at.to_rfc3339()],
                )?;
                id
            }
        };

        {
            let mut insert = tx.prepare(
                "INSERT INTO schedule_entries
                    (schedule_id, position, subject_id, name, start_time, end_time, duration)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (position, entry) in schedule.subjects.iter().enumerate() {
                insert.execute(params![
                    id,
                    position as i64,
                    entry.subject_id,
                    entry.name,
                    hhmm::format(&entry.start_time),
                    hhmm::format(&entry.end_time),
                    entry.duration,
                ])?;
            }
        }

        let total: u32 = schedule.subjects.iter().map(|e| e.duration).sum();
        tx.execute(
            "UPDATE schedules SET total_study_time = ?2 WHERE id = ?1",
            params![id, total],
        )?;
        tx.commit()?;

        tracing::info!(
            user_id,
            schedule_id = %id,
            date = %schedule.date,
            replaced,
            "schedule saved"
        );
        self.feed.publish(
            user_id,
            &ChangeEvent::ScheduleSaved {
                schedule_id: id.clone(),
                date: schedule.date,
                replaced,
                at: now,
            },
        );
        Ok(id)
    }

    fn find_schedule_for_date(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailySchedule>> {
        let header = self
            .conn
            .query_row(
                "SELECT id, date, total_study_time, created_at, updated_at
                 FROM schedules
                 WHERE user_id = ?1 AND date = ?2",
                params![user_id, format_date(date)],
                row_to_schedule_header,
            )
            .optional()?;

        header.map(|h| self.schedule_from_header(h)).transpose()
    }
}

impl SessionLog for Database {
    fn record_session(&self, user_id: &str, record: &StudySessionRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO study_sessions (id, user_id, subject_id, subject_name, date,
                                         started_at, ended_at, duration_secs, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id,
                user_id,
                record.subject_id,
                record.subject_name,
                format_date(record.date),
                record.started_at.to_rfc3339(),
                record.ended_at.to_rfc3339(),
                record.duration_secs,
                format_status(record.status),
            ],
        )?;
        self.feed.publish(
            user_id,
            &ChangeEvent::SessionRecorded {
                session_id: record.id.clone(),
                subject_id: record.subject_id.clone(),
                at: Utc::now(),
            },
        );
        Ok(())
    }

    fn sessions_between(
        &self,
        user_id: &str,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<StudySessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subject_id, subject_name, date, started_at, ended_at, duration_secs, status
             FROM study_sessions
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date DESC, ended_at DESC",
        )?;
        let sessions = stmt
            .query_map(
                params![user_id, format_date(from), format_date(until)],
                row_to_session,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::subject::Difficulty;
    use std::sync::{Arc, Mutex};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

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
    fn subject_crud() {
        let db = Database::open_memory().unwrap();
        let subject = Subject::new("  Linear Algebra ")
            .with_difficulty(Difficulty::Advanced)
            .with_study_time(1, 15);
        db.create_subject("u1", &subject).unwrap();

        let loaded = db.get_subject("u1", &subject.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Linear Algebra");
        assert_eq!(loaded.difficulty, Some(Difficulty::Advanced));
        assert_eq!(loaded.priority, None);
        assert_eq!(loaded.daily_study_time, Some(StudyTime::new(1, 15)));

        // Other users can't see it.
        assert!(db.get_subject("u2", &subject.id).unwrap().is_none());
        assert!(db.list_subjects("u2").unwrap().is_empty());

        let updated = db.update_priority("u1", &subject.id, Priority::High).unwrap();
        assert_eq!(updated.priority, Some(Priority::High));

        db.delete_subject("u1", &subject.id).unwrap();
        assert!(db.list_subjects("u1").unwrap().is_empty());
        assert!(db.delete_subject("u1", &subject.id).is_err());
    }

    #[test]
    fn progress_is_range_checked() {
        let db = Database::open_memory().unwrap();
        let subject = Subject::new("Biology");
        db.create_subject("u1", &subject).unwrap();

        assert_eq!(db.update_progress("u1", &subject.id, 40).unwrap().progress, 40);
        let err = db.update_progress("u1", &subject.id, 101).unwrap_err();
        assert!(err.is_input_error());
        let err = db.update_progress("u1", "missing", 10).unwrap_err();
        assert!(err.is_persistence_error());
    }

    #[test]
    fn schedule_roundtrip_keeps_order() {
        let db = Database::open_memory().unwrap();
        let schedule = DailySchedule::new(
            day(),
            vec![entry("b", "08:00", "08:30", 30), entry("a", "08:45", "09:45", 60)],
        );
        let id = db.save_schedule("u1", &schedule).unwrap();

        let loaded = db.find_schedule_for_date("u1", day()).unwrap().unwrap();
        assert_eq!(loaded.id.as_deref(), Some(id.as_str()));
        assert!(loaded.same_content(&schedule));
        assert!(loaded.updated_at.is_none());

        let other_day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert!(db.find_schedule_for_date("u1", other_day).unwrap().is_none());
        assert!(db.find_schedule_for_date("u2", day()).unwrap().is_none());
    }

    #[test]
    fn saving_same_date_replaces_in_place() {
        let db = Database::open_memory().unwrap();
        let first = DailySchedule::new(day(), vec![entry("a", "08:00", "09:00", 60)]);
        let second = DailySchedule::new(
            day(),
            vec![entry("c", "08:00", "08:20", 20), entry("d", "08:35", "08:45", 10)],
        );

        let id1 = db.save_schedule("u1", &first).unwrap();
        let id2 = db.save_schedule("u1", &second).unwrap();
        assert_eq!(id1, id2);

        let all = db.list_schedules("u1").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].total_study_time, 30);
        assert_eq!(all[0].subjects.len(), 2);
        assert!(all[0].updated_at.is_some());
    }

    #[test]
    fn writes_publish_events() {
        let db = Database::open_memory().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = db.feed().subscribe("u1", move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        let subject = Subject::new("Music");
        db.create_subject("u1", &subject).unwrap();
        db.save_schedule("u1", &DailySchedule::new(day(), Vec::new())).unwrap();
        db.save_schedule("u1", &DailySchedule::new(day(), Vec::new())).unwrap();
        sub.cancel();
        db.delete_subject("u1", &subject.id).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(matches!(seen[0], ChangeEvent::SubjectsChanged { .. }));
        assert!(matches!(seen[1], ChangeEvent::ScheduleSaved { replaced: false, .. }));
        assert!(matches!(seen[2], ChangeEvent::ScheduleSaved { replaced: true, .. }));
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn open_at_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.create_subject("u1", &Subject::new("Latin")).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.list_subjects("u1").unwrap().len(), 1);
    }

    #[test]
    fn course_details_roundtrip() {
        let db = Database::open_memory().unwrap();
        let mut subject = Subject::new("Organic Chemistry");
        subject.category = "elective".into();
        subject.topics = vec!["alkanes".into(), "chirality".into()];
        subject.resources = vec!["https://example.org/notes".into()];
        subject.start_date = Some(day());
        subject.end_date = NaiveDate::from_ymd_opt(2024, 6, 30);
        subject.study_days = vec![chrono::Weekday::Tue, chrono::Weekday::Thu];
        db.create_subject("u1", &subject).unwrap();

        let loaded = db.get_subject("u1", &subject.id).unwrap().unwrap();
        assert_eq!(loaded.category, "elective");
        assert_eq!(loaded.topics, subject.topics);
        assert_eq!(loaded.resources, subject.resources);
        assert_eq!(loaded.end_date, subject.end_date);
        assert_eq!(loaded.study_days, subject.study_days);

        let mut reversed = loaded.clone();
        reversed.end_date = NaiveDate::from_ymd_opt(2023, 12, 1);
        assert!(db.update_subject("u1", &reversed).is_err());
    }

    #[test]
    fn tasks_listed_by_due_date() {
        let db = Database::open_memory().unwrap();
        let subject = Subject::new("Physics");
        db.create_subject("u1", &subject).unwrap();

        let undated = StudyTask::new(&subject.id, "Read chapter 4");
        let later = StudyTask::new(&subject.id, "Lab report")
            .with_due_date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        let sooner = StudyTask::new(&subject.id, "Quiz prep").with_due_date(day());
        for task in [&undated, &later, &sooner] {
            db.create_task("u1", task).unwrap();
        }

        let names: Vec<_> = db
            .list_tasks("u1", &subject.id)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, ["Quiz prep", "Lab report", "Read chapter 4"]);
        assert!(db.list_tasks("u2", &subject.id).unwrap().is_empty());
    }

    #[test]
    fn task_needs_name_and_owned_subject() {
        let db = Database::open_memory().unwrap();
        let subject = Subject::new("Biology");
        db.create_subject("u1", &subject).unwrap();

        let blank = StudyTask::new(&subject.id, "  ");
        assert!(matches!(
            db.create_task("u1", &blank),
            Err(CoreError::Validation(ValidationError::InvalidValue { .. }))
        ));

        let foreign = StudyTask::new(&subject.id, "Flashcards");
        assert!(matches!(
            db.create_task("u2", &foreign),
            Err(CoreError::Database(DatabaseError::NotFound { kind: "subject", .. }))
        ));
    }

    #[test]
    fn task_complete_and_delete() {
        let db = Database::open_memory().unwrap();
        let subject = Subject::new("Art");
        db.create_subject("u1", &subject).unwrap();
        let task = StudyTask::new(&subject.id, "Sketchbook");
        db.create_task("u1", &task).unwrap();

        let done = db.set_task_completed("u1", &task.id, true).unwrap();
        assert!(done.completed);
        assert!(done.updated_at.is_some());
        assert!(db.get_task("u1", &task.id).unwrap().unwrap().completed);

        db.delete_task("u1", &task.id).unwrap();
        assert!(db.get_task("u1", &task.id).unwrap().is_none());
        assert!(matches!(
            db.delete_task("u1", &task.id),
            Err(CoreError::Database(DatabaseError::NotFound { kind: "task", .. }))
        ));
    }

    #[test]
    fn deleting_subject_removes_its_tasks() {
        let db = Database::open_memory().unwrap();
        let subject = Subject::new("Music");
        db.create_subject("u1", &subject).unwrap();
        let task = StudyTask::new(&subject.id, "Scales");
        db.create_task("u1", &task).unwrap();

        db.delete_subject("u1", &subject.id).unwrap();
        assert!(db.get_task("u1", &task.id).unwrap().is_none());
    }

    #[test]
    fn task_changes_are_published() {
        let db = Database::open_memory().unwrap();
        let subject = Subject::new("Latin");
        db.create_subject("u1", &subject).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = db.feed().subscribe("u1", move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        let task = StudyTask::new(&subject.id, "Declensions");
        db.create_task("u1", &task).unwrap();
        db.set_task_completed("u1", &task.id, true).unwrap();
        assert!(subscription.cancel());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|e| matches!(
            e,
            ChangeEvent::TasksChanged { task_id, .. } if *task_id == task.id
        )));
    }

    #[test]
    fn profile_created_on_first_read_and_updated() {
        let db = Database::open_memory().unwrap();
        let profile = db.get_or_create_profile("u1").unwrap();
        assert_eq!(profile.user_id, "u1");
        assert!(!profile.onboarding_completed);
        assert!(profile.full_name.is_empty());

        let mut edited = profile.clone();
        edited.set_field("full_name", "Grace Hopper").unwrap();
        edited.set_field("education_level", "phd").unwrap();
        edited.set_field("goals", "ship a compiler, teach").unwrap();
        let saved = db.save_profile(&edited).unwrap();

        assert_eq!(saved.full_name, "Grace Hopper");
        assert_eq!(saved.goals, ["ship a compiler", "teach"]);
        assert_eq!(saved.created_at.timestamp(), profile.created_at.timestamp());
        assert!(saved.updated_at.is_some());
        assert_eq!(db.get_or_create_profile("u1").unwrap(), saved);
    }
}
