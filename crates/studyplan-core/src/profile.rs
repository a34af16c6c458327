//! Student profile filled in during onboarding.
//!
//! A profile is created with empty fields the first time it is read and
//! edited one field at a time. Onboarding counts as finished once every
//! required field has a value.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    HighSchool,
    Undergraduate,
    Graduate,
    Phd,
    Other,
}

impl EducationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            EducationLevel::HighSchool => "high_school",
            EducationLevel::Undergraduate => "undergraduate",
            EducationLevel::Graduate => "graduate",
            EducationLevel::Phd => "phd",
            EducationLevel::Other => "other",
        }
    }
}

impl std::str::FromStr for EducationLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "high_school" => Ok(EducationLevel::HighSchool),
            "undergraduate" => Ok(EducationLevel::Undergraduate),
            "graduate" => Ok(EducationLevel::Graduate),
            "phd" => Ok(EducationLevel::Phd),
            "other" => Ok(EducationLevel::Other),
            other => Err(ValidationError::InvalidValue {
                field: "education_level".into(),
                message: format!(
                    "expected high_school, undergraduate, graduate, phd or other, got '{other}'"
                ),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub education_level: Option<EducationLevel>,
    #[serde(default)]
    pub field_of_study: String,
    #[serde(default)]
    pub institution: String,
    #[serde(default)]
    pub graduation_year: Option<i32>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub onboarding_completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Field names accepted by [`UserProfile::set_field`].
pub const PROFILE_FIELDS: &[&str] = &[
    "full_name",
    "date_of_birth",
    "education_level",
    "field_of_study",
    "institution",
    "graduation_year",
    "goals",
    "interests",
];

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl UserProfile {
    /// An empty profile for `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            full_name: String::new(),
            date_of_birth: None,
            education_level: None,
            field_of_study: String::new(),
            institution: String::new(),
            graduation_year: None,
            goals: Vec::new(),
            interests: Vec::new(),
            onboarding_completed: false,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Set one field from text. Lists are comma-separated; an empty value
    /// clears the field.
    ///
    /// # Errors
    /// Unknown field names and values that do not parse.
    pub fn set_field(&mut self, field: &str, value: &str) -> Result<(), ValidationError> {
        let value = value.trim();
        let invalid = |message: String| ValidationError::InvalidValue {
            field: field.to_string(),
            message,
        };

        match field {
            "full_name" => self.full_name = value.to_string(),
            "field_of_study" => self.field_of_study = value.to_string(),
            "institution" => self.institution = value.to_string(),
            "goals" => self.goals = split_list(value),
            "interests" => self.interests = split_list(value),
            "education_level" if value.is_empty() => self.education_level = None,
            "education_level" => self.education_level = Some(value.parse()?),
            "date_of_birth" if value.is_empty() => self.date_of_birth = None,
            "date_of_birth" => {
                let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .map_err(|e| invalid(format!("'{value}': {e}")))?;
                self.date_of_birth = Some(date);
            }
            "graduation_year" if value.is_empty() => self.graduation_year = None,
            "graduation_year" => {
                let year = value
                    .parse::<i32>()
                    .map_err(|_| invalid(format!("'{value}' is not a year")))?;
                self.graduation_year = Some(year);
            }
            _ => {
                return Err(invalid(format!(
                    "unknown profile field, expected one of {}",
                    PROFILE_FIELDS.join(", ")
                )))
            }
        }
        Ok(())
    }

    /// The first required field that is still empty.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.full_name.trim().is_empty() {
            Some("full_name")
        } else if self.date_of_birth.is_none() {
            Some("date_of_birth")
        } else if self.education_level.is_none() {
            Some("education_level")
        } else if self.field_of_study.trim().is_empty() {
            Some("field_of_study")
        } else if self.institution.trim().is_empty() {
            Some("institution")
        } else if self.graduation_year.is_none() {
            Some("graduation_year")
        } else if self.goals.is_empty() {
            Some("goals")
        } else if self.interests.is_empty() {
            Some("interests")
        } else {
            None
        }
    }

    /// Mark onboarding as finished.
    ///
    /// # Errors
    /// [`ValidationError::InvalidValue`] naming the first missing field.
    pub fn complete_onboarding(&mut self) -> Result<(), ValidationError> {
        if let Some(field) = self.missing_field() {
            return Err(ValidationError::InvalidValue {
                field: field.to_string(),
                message: "required to finish onboarding".into(),
            });
        }
        self.onboarding_completed = true;
        Ok(())
    }
}
