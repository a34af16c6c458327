//! Study session tracking.
//!
//! At most one study session exists at a time. A session stores wall-clock
//! timestamps, not a ticking counter, so it can be serialized between CLI
//! invocations and resumed later.
//!
//! ```text
//! (none) -> Active <-> Paused -> (stopped: StudySessionRecord)
//! ```

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
}

/// A session in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySession {
    pub id: String,
    pub subject_id: String,
    pub subject_name: String,
    pub started_at: DateTime<Utc>,
    pub status: SessionStatus,
    /// Seconds accumulated before the current active span.
    accumulated_secs: i64,
    /// Start of the current active span, `None` while paused.
    resumed_at: Option<DateTime<Utc>>,
}

impl StudySession {
    fn begin(subject_id: &str, subject_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subject_id: subject_id.to_string(),
            subject_name: subject_name.to_string(),
            started_at: now,
            status: SessionStatus::Active,
            accumulated_secs: 0,
            resumed_at: Some(now),
        }
    }

    /// Seconds studied so far, paused spans excluded.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        let running = self
            .resumed_at
            .map(|since| (now - since).num_seconds().max(0))
            .unwrap_or(0);
        self.accumulated_secs + running
    }
}

/// A finished session, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySessionRecord {
    pub id: String,
    pub subject_id: String,
    pub subject_name: String,
    /// Local calendar day the session ended on.
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub status: SessionStatus,
}

/// Guards the single-active-session rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionTracker {
    current: Option<StudySession>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&StudySession> {
        self.current.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// Start a session.
    ///
    /// # Errors
    /// [`SessionError::AlreadyActive`] if a session is running or paused.
    pub fn start(
        &mut self,
        subject_id: &str,
        subject_name: &str,
        now: DateTime<Utc>,
    ) -> Result<&StudySession, SessionError> {
        if let Some(existing) = &self.current {
            return Err(SessionError::AlreadyActive {
                subject_name: existing.subject_name.clone(),
            });
        }
        let session = StudySession::begin(subject_id, subject_name, now);
        tracing::debug!(subject_id, session = %session.id, "study session started");
        Ok(self.current.insert(session))
    }

    /// Stop whatever is running, then start a new session.
    ///
    /// Returns the record of the session that was stopped, if any.
    pub fn start_replacing(
        &mut self,
        subject_id: &str,
        subject_name: &str,
        now: DateTime<Utc>,
    ) -> Option<StudySessionRecord> {
        let stopped = self.stop(now).ok();
        self.current = Some(StudySession::begin(subject_id, subject_name, now));
        stopped
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<&StudySession, SessionError> {
        let session = self.current.as_mut().ok_or(SessionError::NoActiveSession)?;
        match session.status {
            SessionStatus::Active => {
                session.accumulated_secs = session.elapsed_secs(now);
                session.resumed_at = None;
                session.status = SessionStatus::Paused;
                Ok(session)
            }
            _ => Err(SessionError::InvalidTransition {
                action: "pause",
                state: "paused",
            }),
        }
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<&StudySession, SessionError> {
        let session = self.current.as_mut().ok_or(SessionError::NoActiveSession)?;
        match session.status {
            SessionStatus::Paused => {
                session.resumed_at = Some(now);
                session.status = SessionStatus::Active;
                Ok(session)
            }
            _ => Err(SessionError::InvalidTransition {
                action: "resume",
                state: "active",
            }),
        }
    }

    /// Finish the current session and hand back its record.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<StudySessionRecord, SessionError> {
        let session = self.current.take().ok_or(SessionError::NoActiveSession)?;
        let duration_secs = session.elapsed_secs(now);
        tracing::debug!(session = %session.id, duration_secs, "study session stopped");
        Ok(StudySessionRecord {
            id: session.id,
            subject_id: session.subject_id,
            subject_name: session.subject_name,
            date: now.with_timezone(&Local).date_naive(),
            started_at: session.started_at,
            ended_at: now,
            duration_secs,
            status: SessionStatus::Completed,
        })
    }
}
