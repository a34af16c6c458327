//! Database schema migrations for studyplan.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            tracing::warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: subjects, schedules and their entries.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS subjects (
            id            TEXT PRIMARY KEY,
            user_id       TEXT NOT NULL,
            name          TEXT NOT NULL,
            description   TEXT NOT NULL DEFAULT '',
            difficulty    TEXT,
            priority      TEXT,
            daily_hours   INTEGER,
            daily_minutes INTEGER,
            progress      INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS schedules (
            id               TEXT PRIMARY KEY,
            user_id          TEXT NOT NULL,
            date             TEXT NOT NULL,
            total_study_time INTEGER NOT NULL DEFAULT 0,
            created_at       TEXT NOT NULL,
            updated_at       TEXT,
            UNIQUE (user_id, date)
        );

        CREATE TABLE IF NOT EXISTS schedule_entries (
            schedule_id TEXT NOT NULL REFERENCES schedules(id) ON DELETE CASCADE,
            position    INTEGER NOT NULL,
            subject_id  TEXT NOT NULL,
            name        TEXT NOT NULL,
            start_time  TEXT NOT NULL,
            end_time    TEXT NOT NULL,
            duration    INTEGER NOT NULL,
            PRIMARY KEY (schedule_id, position)
        );

        CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_subjects_user ON subjects(user_id);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: study sessions and per-subject streaks.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "ALTER TABLE subjects ADD COLUMN streak INTEGER NOT NULL DEFAULT 0;
         ALTER TABLE subjects ADD COLUMN last_studied_date TEXT;

         CREATE TABLE IF NOT EXISTS study_sessions (
            id            TEXT PRIMARY KEY,
            user_id       TEXT NOT NULL,
            subject_id    TEXT NOT NULL,
            subject_name  TEXT NOT NULL,
            date          TEXT NOT NULL,
            started_at    TEXT NOT NULL,
            ended_at      TEXT NOT NULL,
            duration_secs INTEGER NOT NULL,
            status        TEXT NOT NULL
         );

         CREATE INDEX IF NOT EXISTS idx_sessions_user_date ON study_sessions(user_id, date);",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}

/// Migration v3: course details, per-subject tasks and the student profile.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "ALTER TABLE subjects ADD COLUMN category TEXT NOT NULL DEFAULT 'core';
         ALTER TABLE subjects ADD COLUMN topics TEXT NOT NULL DEFAULT '[]';
         ALTER TABLE subjects ADD COLUMN resources TEXT NOT NULL DEFAULT '[]';
         ALTER TABLE subjects ADD COLUMN start_date TEXT;
         ALTER TABLE subjects ADD COLUMN end_date TEXT;
         ALTER TABLE subjects ADD COLUMN study_days TEXT NOT NULL DEFAULT '[]';

         CREATE TABLE IF NOT EXISTS tasks (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            subject_id  TEXT NOT NULL REFERENCES subjects(id) ON DELETE CASCADE,
            name        TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            due_date    TEXT,
            completed   INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            updated_at  TEXT
         );

         CREATE INDEX IF NOT EXISTS idx_tasks_subject ON tasks(user_id, subject_id);

         CREATE TABLE IF NOT EXISTS profiles (
            user_id              TEXT PRIMARY KEY,
            full_name            TEXT NOT NULL DEFAULT '',
            date_of_birth        TEXT,
            education_level      TEXT,
            field_of_study       TEXT NOT NULL DEFAULT '',
            institution          TEXT NOT NULL DEFAULT '',
            graduation_year      INTEGER,
            goals                TEXT NOT NULL DEFAULT '[]',
            interests            TEXT NOT NULL DEFAULT '[]',
            onboarding_completed INTEGER NOT NULL DEFAULT 0,
            created_at           TEXT NOT NULL,
            updated_at           TEXT
         );",
    )?;
    set_schema_version(&tx, 3)?;
    tx.commit()
}
