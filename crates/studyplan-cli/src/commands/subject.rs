//! Subject management commands for CLI.

use chrono::Weekday;
use clap::Subcommand;
use studyplan_core::{
    Config, Database, DatabaseError, Difficulty, Priority, StudyTask, StudyTime, Subject,
    SubjectSource,
};

use super::{parse_date, resolve_user, CliResult};

#[derive(Subcommand)]
pub enum SubjectAction {
    /// Create a new subject
    Add {
        /// Subject name
        name: String,
        /// Subject description
        #[arg(long)]
        description: Option<String>,
        /// beginner, intermediate or advanced (default: beginner)
        #[arg(long)]
        difficulty: Option<Difficulty>,
        /// high, medium or low (default: medium)
        #[arg(long)]
        priority: Option<Priority>,
        /// Daily study hours
        #[arg(long)]
        hours: Option<u32>,
        /// Daily study minutes
        #[arg(long)]
        minutes: Option<u32>,
        /// Category (default: core)
        #[arg(long)]
        category: Option<String>,
        /// Comma-separated topics
        #[arg(long, value_delimiter = ',')]
        topics: Vec<String>,
        /// Comma-separated resources (links or titles)
        #[arg(long, value_delimiter = ',')]
        resources: Vec<String>,
        /// Course start, YYYY-MM-DD
        #[arg(long)]
        start: Option<String>,
        /// Course end, YYYY-MM-DD
        #[arg(long)]
        end: Option<String>,
        /// Comma-separated weekdays (e.g. mon,wed,fri); default every day
        #[arg(long, value_delimiter = ',')]
        days: Vec<Weekday>,
    },
    /// List subjects, newest first
    List {
        /// Only subjects in this category
        #[arg(long)]
        category: Option<String>,
        /// Only subjects studied on this day, YYYY-MM-DD
        #[arg(long)]
        on: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show subject details as JSON
    Show {
        /// Subject ID
        id: String,
    },
    /// Set progress (values outside 0-100 are clamped)
    Progress {
        /// Subject ID
        id: String,
        /// New progress percentage
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },
    /// Change priority
    Priority {
        /// Subject ID
        id: String,
        /// high, medium or low
        level: Priority,
    },
    /// Delete a subject and its tasks
    Delete {
        /// Subject ID
        id: String,
    },
    /// Tasks belonging to a subject
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task to a subject
    Add {
        /// Subject ID
        subject_id: String,
        /// Task name
        name: String,
        /// Due date, YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,
        /// Task description
        #[arg(long)]
        description: Option<String>,
    },
    /// List a subject's tasks, earliest due first
    List {
        /// Subject ID
        subject_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a task as done
    Done {
        /// Task ID
        id: String,
        /// Reopen the task instead
        #[arg(long)]
        undo: bool,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },
}

fn describe_time(time: Option<StudyTime>) -> String {
    match time {
        Some(t) if !t.is_zero() => format!("{}h{:02}m", t.hours, t.minutes),
        _ => "default".to_string(),
    }
}

fn require_subject(
    db: &Database,
    user: &str,
    id: &str,
) -> Result<Subject, Box<dyn std::error::Error>> {
    db.get_subject(user, id)?.ok_or_else(|| {
        DatabaseError::NotFound {
            kind: "subject",
            id: id.to_string(),
        }
        .into()
    })
}

fn run_task(action: TaskAction, db: &Database, user: &str) -> CliResult {
    match action {
        TaskAction::Add {
            subject_id,
            name,
            due,
            description,
        } => {
            let mut task = StudyTask::new(subject_id, name.trim());
            if let Some(due) = due {
                task.due_date = Some(parse_date(Some(&due))?);
            }
            task.description = description.unwrap_or_default();
            db.create_task(user, &task)?;
            println!("Task created: {}", task.id);
        }
        TaskAction::List { subject_id, json } => {
            let subject = require_subject(db, user, &subject_id)?;
            let tasks = db.list_tasks(user, &subject.id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks for {}.", subject.name);
            } else {
                let today = studyplan_core::today();
                for t in &tasks {
                    let mark = if t.completed { "x" } else { " " };
                    let due = t
                        .due_date
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "no due date".into());
                    let overdue = if t.is_overdue(today) { "  (overdue)" } else { "" };
                    println!("[{mark}] {}  {}  {due}{overdue}", t.id, t.name);
                }
            }
        }
        TaskAction::Done { id, undo } => {
            let task = db.set_task_completed(user, &id, !undo)?;
            let state = if task.completed { "done" } else { "open" };
            println!("{}: {state}", task.name);
        }
        TaskAction::Delete { id } => {
            db.delete_task(user, &id)?;
            println!("Task deleted: {id}");
        }
    }
    Ok(())
}

pub fn run(action: SubjectAction, user: Option<String>) -> CliResult {
    let config = Config::load_or_default();
    let user = resolve_user(user, &config);
    let db = Database::open()?;

    match action {
        SubjectAction::Add {
            name,
            description,
            difficulty,
            priority,
            hours,
            minutes,
            category,
            topics,
            resources,
            start,
            end,
            days,
        } => {
            let mut subject = Subject::new(name.trim());
            subject.description = description.unwrap_or_default();
            subject.difficulty = difficulty;
            subject.priority = priority;
            if hours.is_some() || minutes.is_some() {
                subject.daily_study_time =
                    Some(StudyTime::new(hours.unwrap_or(0), minutes.unwrap_or(0)));
            }
            if let Some(category) = category {
                subject.category = category.trim().to_string();
            }
            subject.topics = topics.into_iter().map(|t| t.trim().to_string()).collect();
            subject.resources = resources.into_iter().map(|r| r.trim().to_string()).collect();
            if let Some(start) = start {
                subject.start_date = Some(parse_date(Some(&start))?);
            }
            if let Some(end) = end {
                subject.end_date = Some(parse_date(Some(&end))?);
            }
            subject.study_days = days;
            db.create_subject(&user, &subject)?;
            println!("Subject created: {}", subject.id);
        }
        SubjectAction::List { category, on, json } => {
            let on = on.map(|raw| parse_date(Some(&raw))).transpose()?;
            let subjects: Vec<Subject> = db
                .list_subjects(&user)?
                .into_iter()
                .filter(|s| category.as_ref().map_or(true, |c| s.category == *c))
                .filter(|s| on.map_or(true, |date| s.is_studied_on(date)))
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&subjects)?);
            } else if subjects.is_empty() {
                println!("No subjects.");
            } else {
                for s in &subjects {
                    println!(
                        "{}  {}  [{} / {}]  {}  {}%  {}",
                        s.id,
                        s.name,
                        s.effective_priority().as_str(),
                        s.effective_difficulty().as_str(),
                        describe_time(s.daily_study_time),
                        s.progress,
                        s.category
                    );
                }
            }
        }
        SubjectAction::Show { id } => {
            let subject = require_subject(&db, &user, &id)?;
            println!("{}", serde_json::to_string_pretty(&subject)?);
        }
        SubjectAction::Progress { id, value } => {
            let subject = db.update_progress(&user, &id, value.clamp(0, 100))?;
            println!("{}: {}%", subject.name, subject.progress);
        }
        SubjectAction::Priority { id, level } => {
            let subject = db.update_priority(&user, &id, level)?;
            println!("{}: priority {}", subject.name, level.as_str());
        }
        SubjectAction::Delete { id } => {
            db.delete_subject(&user, &id)?;
            println!("Subject deleted: {id}");
        }
        SubjectAction::Task { action } => run_task(action, &db, &user)?,
    }
    Ok(())
}
