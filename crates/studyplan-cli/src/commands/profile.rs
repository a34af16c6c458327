use clap::Subcommand;
use studyplan_core::{Config, Database};

use super::{resolve_user, CliResult};

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Print the profile as JSON (created empty on first use)
    Show,
    /// Set a profile field
    Set {
        /// full_name, date_of_birth, education_level, field_of_study,
        /// institution, graduation_year, goals or interests
        field: String,
        /// New value; goals and interests are comma-separated
        value: String,
    },
    /// Finish onboarding once every field is filled in
    Complete,
}

pub fn run(action: ProfileAction, user: Option<String>) -> CliResult {
    let config = Config::load_or_default();
    let user = resolve_user(user, &config);
    let db = Database::open()?;
    let mut profile = db.get_or_create_profile(&user)?;

    match action {
        ProfileAction::Show => {
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        ProfileAction::Set { field, value } => {
            profile.set_field(&field, &value)?;
            db.save_profile(&profile)?;
            println!("ok");
        }
        ProfileAction::Complete => {
            profile.complete_onboarding()?;
            db.save_profile(&profile)?;
            println!("onboarding complete");
        }
    }
    Ok(())
}
