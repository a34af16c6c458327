//! Property tests for the schedule generator.
//!
//! Subject counts and durations are bounded so every generated day fits
//! between 08:00 and 23:59.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use studyplan_core::{Difficulty, Priority, ScheduleGenerator, StudyTime, Subject};

fn difficulty() -> impl Strategy<Value = Option<Difficulty>> {
    prop_oneof![
        Just(None),
        Just(Some(Difficulty::Beginner)),
        Just(Some(Difficulty::Intermediate)),
        Just(Some(Difficulty::Advanced)),
    ]
}

fn priority() -> impl Strategy<Value = Option<Priority>> {
    prop_oneof![
        Just(None),
        Just(Some(Priority::Low)),
        Just(Some(Priority::Medium)),
        Just(Some(Priority::High)),
    ]
}

fn study_time() -> impl Strategy<Value = Option<StudyTime>> {
    prop_oneof![
        Just(None),
        (0u32..=1, 0u32..=30).prop_map(|(h, m)| Some(StudyTime::new(h, m))),
    ]
}

fn subjects() -> impl Strategy<Value = Vec<Subject>> {
    prop::collection::vec((difficulty(), priority(), study_time()), 1..=8).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (difficulty, priority, daily_study_time))| {
                let mut subject = Subject::new(format!("Subject {i}"));
                subject.difficulty = difficulty;
                subject.priority = priority;
                subject.daily_study_time = daily_study_time;
                subject
            })
            .collect()
    })
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

proptest! {
    #[test]
    fn blocks_are_separated_by_fixed_breaks(input in subjects()) {
        let schedule = ScheduleGenerator::new().generate(&input, day()).unwrap();

        prop_assert_eq!(schedule.subjects.len(), input.len());
        for pair in schedule.subjects.windows(2) {
            prop_assert_eq!(pair[1].start_time, pair[0].end_time + Duration::minutes(15));
            prop_assert!(!pair[0].overlaps(&pair[1]));
        }
        for entry in &schedule.subjects {
            prop_assert!(entry.duration > 0);
            prop_assert_eq!(
                entry.end_time,
                entry.start_time + Duration::minutes(entry.duration as i64)
            );
        }
    }

    #[test]
    fn total_is_sum_of_durations(input in subjects()) {
        let schedule = ScheduleGenerator::new().generate(&input, day()).unwrap();
        let sum: u32 = schedule.subjects.iter().map(|e| e.duration).sum();
        prop_assert_eq!(schedule.total_study_time, sum);
    }

    #[test]
    fn order_is_by_score_and_stable(input in subjects()) {
        let schedule = ScheduleGenerator::new().generate(&input, day()).unwrap();

        let position = |id: &str| input.iter().position(|s| s.id == id).unwrap();
        let score = |id: &str| input[position(id)].score();

        for pair in schedule.subjects.windows(2) {
            let (a, b) = (&pair[0].subject_id, &pair[1].subject_id);
            prop_assert!(score(a) >= score(b));
            if score(a) == score(b) {
                prop_assert!(position(a) < position(b));
            }
        }
    }

    #[test]
    fn regeneration_is_idempotent(input in subjects()) {
        let generator = ScheduleGenerator::new();
        let first = generator.generate(&input, day()).unwrap();
        let second = generator.generate(&input, day()).unwrap();
        prop_assert!(first.same_content(&second));
    }
}
