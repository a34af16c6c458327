//! Planner lifecycle.
//!
//! One explicit state machine for the "pick subjects, generate, look at the
//! result" flow:
//!
//! ```text
//! Idle -> SubjectSelected -> Generating -> Displayed
//!           ^        |            |            |
//!           |        v            v            |
//!           +------ Idle    SubjectSelected <--+
//! ```
//!
//! Generating is exclusive: nothing else can happen until the generation
//! finishes or fails, so two generations can never overlap.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::schedule::DailySchedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerState {
    Idle,
    SubjectSelected,
    Generating,
    Displayed,
}

impl PlannerState {
    pub fn as_str(self) -> &'static str {
        match self {
            PlannerState::Idle => "idle",
            PlannerState::SubjectSelected => "subject selected",
            PlannerState::Generating => "generating",
            PlannerState::Displayed => "displayed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Planner {
    state: PlannerState,
    date: NaiveDate,
    selected: Vec<String>,
    displayed: Option<DailySchedule>,
}

impl Planner {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            state: PlannerState::Idle,
            date,
            selected: Vec::new(),
            displayed: None,
        }
    }

    pub fn state(&self) -> PlannerState {
        self.state
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn displayed(&self) -> Option<&DailySchedule> {
        self.displayed.as_ref()
    }

    fn reject(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            action,
            state: self.state.as_str(),
        }
    }

    /// Switch the target day. Drops whatever was on display.
    pub fn set_date(&mut self, date: NaiveDate) -> Result<(), SessionError> {
        if self.state == PlannerState::Generating {
            return Err(self.reject("change date"));
        }
        self.date = date;
        self.displayed = None;
        self.state = self.resting_state();
        Ok(())
    }

    pub fn select(&mut self, subject_id: &str) -> Result<(), SessionError> {
        if self.state == PlannerState::Generating {
            return Err(self.reject("select a subject"));
        }
        if !self.selected.iter().any(|id| id == subject_id) {
            self.selected.push(subject_id.to_string());
        }
        self.displayed = None;
        self.state = PlannerState::SubjectSelected;
        Ok(())
    }

    pub fn deselect(&mut self, subject_id: &str) -> Result<(), SessionError> {
        if self.state == PlannerState::Generating {
            return Err(self.reject("deselect a subject"));
        }
        self.selected.retain(|id| id != subject_id);
        if self.state != PlannerState::Displayed {
            self.state = self.resting_state();
        }
        Ok(())
    }

    /// Enter `Generating` and hand out the selection to generate from.
    pub fn begin_generation(&mut self) -> Result<Vec<String>, SessionError> {
        if self.state != PlannerState::SubjectSelected {
            return Err(self.reject("generate a schedule"));
        }
        self.state = PlannerState::Generating;
        Ok(self.selected.clone())
    }

    pub fn finish_generation(&mut self, schedule: DailySchedule) -> Result<(), SessionError> {
        if self.state != PlannerState::Generating {
            return Err(self.reject("finish generating"));
        }
        self.displayed = Some(schedule);
        self.state = PlannerState::Displayed;
        Ok(())
    }

    /// Back to the selection after a failed generation.
    pub fn fail_generation(&mut self) -> Result<(), SessionError> {
        if self.state != PlannerState::Generating {
            return Err(self.reject("fail generating"));
        }
        self.state = self.resting_state();
        Ok(())
    }

    /// Display a previously saved schedule.
    pub fn show(&mut self, schedule: DailySchedule) -> Result<(), SessionError> {
        if self.state == PlannerState::Generating {
            return Err(self.reject("show a schedule"));
        }
        self.date = schedule.date;
        self.displayed = Some(schedule);
        self.state = PlannerState::Displayed;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), SessionError> {
        if self.state != PlannerState::Displayed {
            return Err(self.reject("close the schedule"));
        }
        self.displayed = None;
        self.state = self.resting_state();
        Ok(())
    }

    fn resting_state(&self) -> PlannerState {
        if self.selected.is_empty() {
            PlannerState::Idle
        } else {
            PlannerState::SubjectSelected
        }
    }
}
