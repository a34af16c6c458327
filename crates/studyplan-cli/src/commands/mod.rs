pub mod config;
pub mod profile;
pub mod schedule;
pub mod session;
pub mod stats;
pub mod subject;

use chrono::NaiveDate;
use studyplan_core::{today, Config, ValidationError};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// The `--user` flag, falling back to the configured user.
pub fn resolve_user(flag: Option<String>, config: &Config) -> String {
    flag.unwrap_or_else(|| config.user.id.clone())
}

/// Parse `--date` (YYYY-MM-DD), defaulting to today.
pub fn parse_date(value: Option<&str>) -> Result<NaiveDate, ValidationError> {
    match value {
        None => Ok(today()),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
            ValidationError::InvalidValue {
                field: "date".into(),
                message: format!("'{raw}': {e}"),
            }
        }),
    }
}
