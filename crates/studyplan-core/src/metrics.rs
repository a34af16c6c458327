//! Daily study metrics.
//!
//! Computed from completed study sessions:
//! - **Total time** and **sessions completed** for the day
//! - **Active streak**: consecutive days with at least one session, counting
//!   back from the day itself (a day without sessions has a streak of 0)
//! - **Goal progress** against the configured daily goal

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{SessionStatus, StudySessionRecord};
use crate::storage::SessionLog;

/// How far back the streak looks.
pub const STREAK_LOOKBACK_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyMetrics {
    pub date: NaiveDate,
    pub total_study_secs: i64,
    pub sessions_completed: u32,
    pub active_streak: u32,
    pub last_study_date: Option<NaiveDate>,
    pub daily_goal_minutes: u32,
    /// 0.0 .. 100.0
    pub goal_progress_pct: f64,
}

impl StudyMetrics {
    /// Compute metrics for `date` from whatever records are at hand.
    ///
    /// Records dated after `date` are ignored.
    pub fn compute(
        records: &[StudySessionRecord],
        date: NaiveDate,
        daily_goal_minutes: u32,
    ) -> Self {
        let relevant = records.iter().filter(|r| r.date <= date);

        let today: Vec<_> = relevant.clone().filter(|r| r.date == date).collect();
        let total_study_secs = today.iter().map(|r| r.duration_secs.max(0)).sum::<i64>();
        let sessions_completed = today
            .iter()
            .filter(|r| r.status == SessionStatus::Completed)
            .count() as u32;

        let days: BTreeSet<NaiveDate> = relevant.map(|r| r.date).collect();
        let last_study_date = days.iter().next_back().copied();

        let earliest = date - Duration::days(STREAK_LOOKBACK_DAYS - 1);
        let mut active_streak = 0;
        let mut cursor = date;
        while cursor >= earliest && days.contains(&cursor) {
            active_streak += 1;
            match cursor.pred_opt() {
                Some(prev) => cursor = prev,
                None => break,
            }
        }

        let goal_secs = daily_goal_minutes as f64 * 60.0;
        let goal_progress_pct = if goal_secs > 0.0 {
            (total_study_secs as f64 / goal_secs * 100.0).min(100.0)
        } else {
            0.0
        };

        Self {
            date,
            total_study_secs,
            sessions_completed,
            active_streak,
            last_study_date,
            daily_goal_minutes,
            goal_progress_pct,
        }
    }

    /// Load the lookback window from `log` and compute metrics for `date`.
    pub fn load<L: SessionLog + ?Sized>(
        log: &L,
        user_id: &str,
        date: NaiveDate,
        daily_goal_minutes: u32,
    ) -> Result<Self> {
        let from = date - Duration::days(STREAK_LOOKBACK_DAYS - 1);
        let records = log.sessions_between(user_id, from, date)?;
        Ok(Self::compute(&records, date, daily_goal_minutes))
    }

    pub fn total_study_minutes(&self) -> i64 {
        self.total_study_secs / 60
    }
}
