//! Core error types for studyplan-core.
//!
//! One top-level [`CoreError`] wraps the per-concern enums below. Callers
//! that only care about the broad class of a failure can ask
//! [`CoreError::is_input_error`] or [`CoreError::is_persistence_error`].

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for studyplan-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Planner lifecycle and study session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Input was rejected before any work was done.
    pub fn is_input_error(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }

    /// Reading or writing the store failed.
    pub fn is_persistence_error(&self) -> bool {
        matches!(self, CoreError::Database(_) | CoreError::Io(_))
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Referenced row does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors. Every one of these is raised before any schedule
/// arithmetic happens.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Nothing was selected
    #[error("no subjects selected")]
    NoSubjectsSelected,

    /// Every selected id was stale
    #[error("no valid subjects found")]
    NoValidSubjects,

    /// A subject asked for zero study time and the policy rejects it
    #[error("subject '{subject_id}' has zero daily study time")]
    ZeroDuration { subject_id: String },

    /// The laid-out day runs past midnight
    #[error("schedule needs {required_minutes} minutes from {start}, which runs past the end of the day")]
    DayOverflow {
        start: chrono::NaiveTime,
        required_minutes: i64,
    },

    /// Progress outside 0..=100
    #[error("progress must be between 0 and 100, got {0}")]
    ProgressOutOfRange(i64),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Planner lifecycle and study session errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    /// A study session is already running or paused
    #[error("a study session for '{subject_name}' is already in progress")]
    AlreadyActive { subject_name: String },

    /// No session to act on
    #[error("no study session in progress")]
    NoActiveSession,

    /// Lifecycle transition not allowed from the current state
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
