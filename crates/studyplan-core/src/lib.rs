//! # Studyplan Core Library
//!
//! Core business logic for the Studyplan study planner. All operations are
//! available through the standalone `studyplan` CLI; any GUI is a thin layer
//! over this same library.
//!
//! ## Architecture
//!
//! - **Schedule Generator**: a pure function from selected subjects to a
//!   priority-ordered, non-overlapping daily plan with fixed breaks
//! - **Planner**: explicit lifecycle state machine around generation
//! - **Sessions**: single-active-session tracker feeding progress and metrics
//! - **Storage**: SQLite persistence and TOML configuration
//! - **Events**: per-user change feed with explicit cancellation
//! - **Tasks and profile**: per-subject to-do items and onboarding details
//!
//! ## Key Components
//!
//! - [`ScheduleGenerator`]: ranks subjects and lays out the day
//! - [`PlanService`]: generate-and-save with replace-in-place per date
//! - [`Database`]: subject, schedule and session persistence
//! - [`Config`]: application configuration management

pub mod error;
pub mod events;
pub mod metrics;
pub mod planner;
pub mod profile;
pub mod schedule;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod storage;
pub mod subject;
pub mod task;
pub mod tips;

pub use error::{ConfigError, CoreError, DatabaseError, Result, SessionError, ValidationError};
pub use events::{ChangeEvent, ChangeFeed, Subscription};
pub use metrics::StudyMetrics;
pub use planner::{Planner, PlannerState};
pub use profile::{EducationLevel, UserProfile};
pub use schedule::{DailySchedule, ScheduleEntry};
pub use scheduler::{GeneratorConfig, ScheduleGenerator, ZeroDurationPolicy};
pub use service::{today, PlanService};
pub use session::{SessionStatus, SessionTracker, StudySession, StudySessionRecord};
pub use storage::{Config, Database, ScheduleSink, SessionLog, SubjectSource};
pub use subject::{Difficulty, Priority, StudyTime, Subject};
pub use task::StudyTask;
pub use tips::study_tips;
