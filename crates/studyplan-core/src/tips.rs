//! Study advice derived from a generated schedule.

use crate::schedule::DailySchedule;
use crate::subject::{Difficulty, Subject};

/// Above this many minutes of study, suggest spreading the load.
const LONG_DAY_MINUTES: u32 = 240;

/// Advice lines for `subjects` scheduled as `schedule`, in display order.
pub fn study_tips(subjects: &[Subject], schedule: &DailySchedule) -> Vec<String> {
    let mut tips = Vec::new();

    if subjects
        .iter()
        .any(|s| s.effective_difficulty() == Difficulty::Advanced)
    {
        tips.push(
            "Schedule difficult subjects in the morning when your energy is highest.".to_string(),
        );
    }
    if subjects.len() > 2 {
        tips.push("Take regular breaks between subjects to maintain focus.".to_string());
    }
    if schedule.total_study_time > LONG_DAY_MINUTES {
        tips.push(
            "Consider splitting your study sessions across multiple days for better retention."
                .to_string(),
        );
    }

    for subject in subjects {
        let tip = match subject.effective_difficulty() {
            Difficulty::Advanced => format!(
                "For {}, work through practice problems and take a proper break afterwards.",
                subject.name
            ),
            Difficulty::Intermediate => format!(
                "Review {} materials before starting and practice active recall.",
                subject.name
            ),
            Difficulty::Beginner => format!(
                "Start with {} to build confidence and momentum.",
                subject.name
            ),
        };
        tips.push(tip);
    }

    tips.push(
        "Stay hydrated and take short walks during breaks to maintain energy levels.".to_string(),
    );
    tips.push("Consider using background music or white noise for better focus.".to_string());
    tips
}
