use clap::Subcommand;
use studyplan_core::{Config, Database, PlanService};

use super::{parse_date, resolve_user, CliResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Study totals, streak and goal progress for a day
    Today {
        /// YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
}

pub fn run(action: StatsAction, user: Option<String>) -> CliResult {
    let config = Config::load_or_default();
    let user = resolve_user(user, &config);
    let db = Database::open()?;
    let service = PlanService::from_config(&db, &config)?;

    match action {
        StatsAction::Today { date } => {
            let date = parse_date(date.as_deref())?;
            let metrics = service.metrics(&user, date)?;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
    }
    Ok(())
}
