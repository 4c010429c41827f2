//! Core kinds, lifecycle steps, and access windows

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Kind of an assessable item a learner can attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Exam,
    Assignment,
    Discussion,
}

impl ItemKind {
    /// Parse a kind from its wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exam" => Some(Self::Exam),
            "assignment" => Some(Self::Assignment),
            "discussion" => Some(Self::Discussion),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exam => "exam",
            Self::Assignment => "assignment",
            Self::Discussion => "discussion",
        }
    }

    /// Whether attempts at this kind of item are time-boxed.
    pub fn has_deadline(&self) -> bool {
        matches!(self, Self::Exam)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a learner can be enrolled in. Superset of [`ItemKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Course,
    Media,
    Exam,
    Assignment,
    Discussion,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Course => "course",
            Self::Media => "media",
            Self::Exam => "exam",
            Self::Assignment => "assignment",
            Self::Discussion => "discussion",
        }
    }
}

impl From<ItemKind> for ContentKind {
    fn from(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Exam => Self::Exam,
            ItemKind::Assignment => Self::Assignment,
            ItemKind::Discussion => Self::Discussion,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Question formats. The first three are graded automatically; essays wait
/// for a grader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionFormat {
    SingleChoice,
    TextInput,
    NumberInput,
    Essay,
}

impl QuestionFormat {
    /// Whether the format is matched against stored correct answers.
    pub fn is_objective(&self) -> bool {
        !matches!(self, Self::Essay)
    }
}

/// Derived position of one attempt in its lifecycle. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStep {
    Ready,
    Sitting,
    Timeout,
    Grading,
    Reviewing,
    Final,
}

impl fmt::Display for SessionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ready => "ready",
            Self::Sitting => "sitting",
            Self::Timeout => "timeout",
            Self::Grading => "grading",
            Self::Reviewing => "reviewing",
            Self::Final => "final",
        };
        f.write_str(s)
    }
}

/// Visibility window for a learner/content pair. Transient: derived per
/// request, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub archive: DateTime<Utc>,
}

/// Where "now" falls inside an [`AccessWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPhase {
    NotYetAvailable,
    Open,
    ReadOnly,
    Archived,
}

impl AccessWindow {
    pub fn phase(&self, now: DateTime<Utc>) -> WindowPhase {
        if now < self.start {
            WindowPhase::NotYetAvailable
        } else if now >= self.archive {
            WindowPhase::Archived
        } else if now >= self.end {
            WindowPhase::ReadOnly
        } else {
            WindowPhase::Open
        }
    }
}

/// Grading deadlines derived from an item's access window: each stage is a
/// day offset from the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingDates {
    pub grade_due: DateTime<Utc>,
    pub appeal_deadline: DateTime<Utc>,
    pub confirm_due: DateTime<Utc>,
}

impl GradingDates {
    pub fn after(
        access_end: DateTime<Utc>,
        grade_due_days: u32,
        appeal_deadline_days: u32,
        confirm_due_days: u32,
    ) -> Self {
        let grade_due = access_end + Duration::days(i64::from(grade_due_days));
        let appeal_deadline = grade_due + Duration::days(i64::from(appeal_deadline_days));
        let confirm_due = appeal_deadline + Duration::days(i64::from(confirm_due_days));
        Self {
            grade_due,
            appeal_deadline,
            confirm_due,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn item_kind_parse_round_trips() {
        for kind in [ItemKind::Exam, ItemKind::Assignment, ItemKind::Discussion] {
            assert_eq!(ItemKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ItemKind::parse("quiz"), None);
    }

    #[test]
    fn only_exams_are_time_boxed() {
        assert!(ItemKind::Exam.has_deadline());
        assert!(!ItemKind::Assignment.has_deadline());
        assert!(!ItemKind::Discussion.has_deadline());
    }

    #[test]
    fn session_step_serializes_as_snake_case() {
        let json = serde_json::to_string(&SessionStep::Reviewing).unwrap();
        assert_eq!(json, "\"reviewing\"");
    }

    #[test]
    fn session_steps_order_by_progress() {
        assert!(SessionStep::Ready < SessionStep::Sitting);
        assert!(SessionStep::Grading < SessionStep::Reviewing);
        assert!(SessionStep::Reviewing < SessionStep::Final);
    }

    #[test]
    fn window_phase_covers_all_regions() {
        let window = AccessWindow {
            start: at(2024, 1, 1),
            end: at(2024, 2, 1),
            archive: at(2024, 3, 1),
        };

        assert_eq!(window.phase(at(2023, 12, 31)), WindowPhase::NotYetAvailable);
        assert_eq!(window.phase(at(2024, 1, 15)), WindowPhase::Open);
        assert_eq!(window.phase(at(2024, 2, 10)), WindowPhase::ReadOnly);
        assert_eq!(window.phase(at(2024, 3, 1)), WindowPhase::Archived);
    }

    #[test]
    fn window_boundaries_are_inclusive_exclusive() {
        let window = AccessWindow {
            start: at(2024, 1, 1),
            end: at(2024, 2, 1),
            archive: at(2024, 3, 1),
        };

        assert_eq!(window.phase(at(2024, 1, 1)), WindowPhase::Open);
        assert_eq!(window.phase(at(2024, 2, 1)), WindowPhase::ReadOnly);
    }

    #[test]
    fn grading_dates_chain_off_each_other() {
        let dates = GradingDates::after(at(2024, 2, 1), 7, 3, 2);
        assert_eq!(dates.grade_due, at(2024, 2, 8));
        assert_eq!(dates.appeal_deadline, at(2024, 2, 11));
        assert_eq!(dates.confirm_due, at(2024, 2, 13));
    }
}
