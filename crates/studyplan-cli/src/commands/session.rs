//! Study session commands.
//!
//! The tracker lives in the kv store between invocations, one per user.

use chrono::Utc;
use clap::Subcommand;
use serde_json::json;
use studyplan_core::{
    Config, Database, DatabaseError, PlanService, SessionTracker, StudySessionRecord,
};

use super::{resolve_user, CliResult};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Start studying a subject
    Start {
        /// Subject ID
        subject_id: String,
        /// Stop and record any session already in progress first
        #[arg(long)]
        replace: bool,
    },
    /// Pause the current session
    Pause,
    /// Resume a paused session
    Resume,
    /// Finish the current session and record it
    Stop,
    /// Print the current session as JSON
    Status,
}

fn tracker_key(user: &str) -> String {
    format!("study_session:{user}")
}

fn load_tracker(db: &Database, user: &str) -> SessionTracker {
    if let Ok(Some(json)) = db.kv_get(&tracker_key(user)) {
        match serde_json::from_str::<SessionTracker>(&json) {
            Ok(tracker) => return tracker,
            Err(e) => tracing::warn!(error = %e, "discarding unreadable session state"),
        }
    }
    SessionTracker::new()
}

fn save_tracker(db: &Database, user: &str, tracker: &SessionTracker) -> CliResult {
    if tracker.is_idle() {
        db.kv_delete(&tracker_key(user))?;
    } else {
        db.kv_set(&tracker_key(user), &serde_json::to_string(tracker)?)?;
    }
    Ok(())
}

fn finish(
    service: &PlanService<'_, Database>,
    user: &str,
    record: &StudySessionRecord,
) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let subject = service.complete_session(user, record)?;
    Ok(json!({
        "type": "session_completed",
        "session": record,
        "progress": subject.map(|s| s.progress),
    }))
}

pub fn run(action: SessionAction, user: Option<String>) -> CliResult {
    let config = Config::load_or_default();
    let user = resolve_user(user, &config);
    let db = Database::open()?;
    let service = PlanService::from_config(&db, &config)?;
    let mut tracker = load_tracker(&db, &user);
    let now = Utc::now();

    match action {
        SessionAction::Start {
            subject_id,
            replace,
        } => {
            let subject = db.get_subject(&user, &subject_id)?.ok_or_else(|| {
                DatabaseError::NotFound {
                    kind: "subject",
                    id: subject_id.clone(),
                }
            })?;
            if replace {
                if let Some(stopped) = tracker.start_replacing(&subject.id, &subject.name, now) {
                    let completed = finish(&service, &user, &stopped)?;
                    println!("{}", serde_json::to_string_pretty(&completed)?);
                }
            } else {
                tracker.start(&subject.id, &subject.name, now)?;
            }
            println!("{}", serde_json::to_string_pretty(&tracker.current())?);
        }
        SessionAction::Pause => {
            let session = tracker.pause(now)?;
            println!("{}", serde_json::to_string_pretty(session)?);
        }
        SessionAction::Resume => {
            let session = tracker.resume(now)?;
            println!("{}", serde_json::to_string_pretty(session)?);
        }
        SessionAction::Stop => {
            let record = tracker.stop(now)?;
            // Clear the stored session before crediting the subject.
            save_tracker(&db, &user, &tracker)?;
            let completed = finish(&service, &user, &record)?;
            println!("{}", serde_json::to_string_pretty(&completed)?);
        }
        SessionAction::Status => {
            let status = match tracker.current() {
                Some(session) => json!({
                    "session": session,
                    "elapsed_secs": session.elapsed_secs(now),
                }),
                None => json!({ "session": null }),
            };
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    save_tracker(&db, &user, &tracker)?;
    Ok(())
}
