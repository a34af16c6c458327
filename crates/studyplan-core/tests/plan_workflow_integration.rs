//! Integration tests for the full planning workflow.
//!
//! These tests run against an on-disk database and config file and walk
//! through subject setup, schedule generation, change notifications and
//! study sessions.

use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use studyplan_core::{
    ChangeEvent, Config, CoreError, Database, Difficulty, PlanService, Planner, PlannerState,
    Priority, ScheduleSink, SessionTracker, Subject, SubjectSource, ValidationError,
    ZeroDurationPolicy,
};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

#[test]
fn test_generated_schedule_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("studyplan.db");

    let (a, b) = {
        let db = Database::open_at(&path).unwrap();
        let a = Subject::new("Algebra")
            .with_priority(Priority::Low)
            .with_difficulty(Difficulty::Beginner)
            .with_study_time(1, 0);
        let b = Subject::new("Biology")
            .with_priority(Priority::High)
            .with_difficulty(Difficulty::Advanced)
            .with_study_time(0, 30);
        db.create_subject("alice", &a).unwrap();
        db.create_subject("alice", &b).unwrap();

        let service = PlanService::new(&db);
        service
            .generate_schedule("alice", &[&a.id, &b.id], day())
            .unwrap();
        (a, b)
    };

    let db = Database::open_at(&path).unwrap();
    let schedule = db.find_schedule_for_date("alice", day()).unwrap().unwrap();

    let names: Vec<_> = schedule.subjects.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["Biology", "Algebra"]);
    assert_eq!(schedule.entry_for(&b.id).unwrap().duration, 30);
    assert_eq!(schedule.entry_for(&a.id).unwrap().duration, 60);
    assert_eq!(schedule.total_study_time, 90);
    assert_eq!(schedule.span_minutes(), 105);
}

#[test]
fn test_schedules_are_scoped_per_user() {
    let db = Database::open_memory().unwrap();
    let mine = Subject::new("Chemistry");
    let theirs = Subject::new("Drawing");
    db.create_subject("alice", &mine).unwrap();
    db.create_subject("bob", &theirs).unwrap();

    let service = PlanService::new(&db);
    service.generate_schedule("alice", &[&mine.id], day()).unwrap();

    // Another user's subject id is stale from alice's point of view.
    let err = service
        .generate_schedule("alice", &[&theirs.id], day())
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Validation(ValidationError::NoValidSubjects)
    ));

    assert!(db.find_schedule_for_date("bob", day()).unwrap().is_none());
    assert_eq!(db.list_subjects("bob").unwrap().len(), 1);
    assert_eq!(db.list_schedules("alice").unwrap().len(), 1);
}

#[test]
fn test_listeners_see_saves_until_cancelled() {
    let db = Database::open_memory().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let subscription = db.feed().subscribe("alice", move |event| {
        sink.lock().unwrap().push(event.clone());
    });

    let subject = Subject::new("Economics");
    db.create_subject("alice", &subject).unwrap();
    db.create_subject("bob", &Subject::new("French")).unwrap();

    let service = PlanService::new(&db);
    service.generate_schedule("alice", &[&subject.id], day()).unwrap();
    service.generate_schedule("alice", &[&subject.id], day()).unwrap();

    {
        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ChangeEvent::SubjectsChanged { .. }));
        assert!(matches!(
            events[1],
            ChangeEvent::ScheduleSaved { replaced: false, .. }
        ));
        assert!(matches!(
            events[2],
            ChangeEvent::ScheduleSaved { replaced: true, .. }
        ));
    }

    assert!(subscription.cancel());
    db.delete_subject("alice", &subject.id).unwrap();
    assert_eq!(seen.lock().unwrap().len(), 3);
    assert_eq!(db.feed().listener_count("alice"), 0);
}

#[test]
fn test_deleting_subject_keeps_saved_schedule() {
    let db = Database::open_memory().unwrap();
    let subject = Subject::new("Geography").with_study_time(0, 45);
    db.create_subject("alice", &subject).unwrap();

    let service = PlanService::new(&db);
    let saved = service.generate_schedule("alice", &[&subject.id], day()).unwrap();
    db.delete_subject("alice", &subject.id).unwrap();

    let stored = db.find_schedule_for_date("alice", day()).unwrap().unwrap();
    assert!(stored.same_content(&saved));
    assert_eq!(stored.subjects[0].name, "Geography");
}

#[test]
fn test_config_policy_reaches_the_generator() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    let mut config = Config::load_from(&config_path).unwrap();
    config.update("planner.zero_duration", "reject").unwrap();
    config.update("planner.day_start", "09:30").unwrap();
    config.save_to(&config_path).unwrap();

    let config = Config::load_from(&config_path).unwrap();
    assert_eq!(config.planner.zero_duration, ZeroDurationPolicy::Reject);

    let db = Database::open_memory().unwrap();
    let untimed = Subject::new("History");
    let timed = Subject::new("Latin").with_study_time(0, 20);
    db.create_subject("alice", &untimed).unwrap();
    db.create_subject("alice", &timed).unwrap();

    let service = PlanService::from_config(&db, &config).unwrap();
    let err = service
        .generate_schedule("alice", &[&untimed.id, &timed.id], day())
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Validation(ValidationError::ZeroDuration { .. })
    ));
    assert!(err.is_input_error());

    let schedule = service.generate_schedule("alice", &[&timed.id], day()).unwrap();
    assert_eq!(schedule.subjects[0].start_time.to_string(), "09:30:00");
}

#[test]
fn test_planner_and_session_round() {
    let db = Database::open_memory().unwrap();
    let subject = Subject::new("Music").with_study_time(0, 40);
    db.create_subject("alice", &subject).unwrap();
    let service = PlanService::new(&db);

    let mut planner = Planner::new(day());
    planner.select(&subject.id).unwrap();
    let schedule = service.run_planner(&mut planner, "alice").unwrap();
    assert_eq!(planner.state(), PlannerState::Displayed);

    // The tracker round-trips through JSON the way the CLI stores it.
    let entry = &schedule.subjects[0];
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let mut tracker = SessionTracker::new();
    tracker.start(&entry.subject_id, &entry.name, start).unwrap();
    tracker.pause(start + Duration::minutes(10)).unwrap();
    let json = serde_json::to_string(&tracker).unwrap();

    let mut tracker: SessionTracker = serde_json::from_str(&json).unwrap();
    tracker.resume(start + Duration::minutes(30)).unwrap();
    let record = tracker.stop(start + Duration::minutes(45)).unwrap();
    assert_eq!(record.duration_secs, 25 * 60);

    let updated = service.complete_session("alice", &record).unwrap().unwrap();
    assert_eq!(updated.progress, 5);

    let metrics = service.metrics("alice", record.date).unwrap();
    assert_eq!(metrics.total_study_minutes(), 25);
    assert_eq!(metrics.sessions_completed, 1);
}
