use clap::Subcommand;
use studyplan_core::scheduler::select;
use studyplan_core::schedule::hhmm;
use studyplan_core::{
    study_tips, Config, DailySchedule, Database, PlanService, ScheduleSink, SubjectSource,
};

use super::{parse_date, resolve_user, CliResult};

#[derive(Subcommand)]
pub enum ScheduleAction {
    /// Generate and save the schedule for a day from selected subjects
    Generate {
        /// Subject IDs to include
        ids: Vec<String>,
        /// Day to plan, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the saved schedule for a day
    Show {
        /// YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List saved schedules, most recent first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn print_schedule(schedule: &DailySchedule) {
    println!("Schedule for {}", schedule.date);
    for entry in &schedule.subjects {
        println!(
            "  {}-{}  {} ({} min)",
            hhmm::format(&entry.start_time),
            hhmm::format(&entry.end_time),
            entry.name,
            entry.duration
        );
    }
    println!("Total study time: {} min", schedule.total_study_time);
}

pub fn run(action: ScheduleAction, user: Option<String>) -> CliResult {
    let config = Config::load_or_default();
    let user = resolve_user(user, &config);
    let db = Database::open()?;

    match action {
        ScheduleAction::Generate { ids, date, json } => {
            let date = parse_date(date.as_deref())?;
            let service = PlanService::from_config(&db, &config)?;
            let schedule = service.generate_schedule(&user, ids.as_slice(), date)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&schedule)?);
            } else {
                print_schedule(&schedule);
                let subjects = select(&db.list_subjects(&user)?, ids.as_slice());
                println!();
                println!("Tips:");
                for tip in study_tips(&subjects, &schedule) {
                    println!("  - {tip}");
                }
            }
        }
        ScheduleAction::Show { date, json } => {
            let date = parse_date(date.as_deref())?;
            match db.find_schedule_for_date(&user, date)? {
                Some(schedule) if json => {
                    println!("{}", serde_json::to_string_pretty(&schedule)?)
                }
                Some(schedule) => print_schedule(&schedule),
                None if json => println!("null"),
                None => println!("No schedule for {date}."),
            }
        }
        ScheduleAction::List { json } => {
            let schedules = db.list_schedules(&user)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&schedules)?);
            } else if schedules.is_empty() {
                println!("No schedules.");
            } else {
                for s in &schedules {
                    println!(
                        "{}  {} subjects  {} min",
                        s.date,
                        s.subjects.len(),
                        s.total_study_time
                    );
                }
            }
        }
    }
    Ok(())
}
