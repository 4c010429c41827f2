//! Persisted domain records
//!
//! Everything here is stored through [`crate::store::Store`]. Derived values
//! (access windows, session steps) live in their own modules and are never
//! persisted.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use cohort_models::{AccessWindow, ContentKind, GradingDates, ItemKind, QuestionFormat};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One assessable item: an exam, assignment, or discussion question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessableItem {
    pub id: String,
    pub kind: ItemKind,
    pub title: String,
    /// Minimum score (0-100) to pass.
    pub passing_point: u32,
    /// Zero means unlimited.
    pub max_attempts: u32,
    pub verification_required: bool,
    /// Attempt duration for time-boxed kinds. Ignored for open-ended kinds.
    pub duration_secs: Option<i64>,
    pub grade_due_days: u32,
    pub appeal_deadline_days: u32,
    pub confirm_due_days: u32,
    pub question_pool_id: String,
}

impl AssessableItem {
    /// Grading-stage deadlines relative to the resolved access window.
    pub fn grading_dates(&self, window: &AccessWindow) -> GradingDates {
        GradingDates::after(
            window.end,
            self.grade_due_days,
            self.appeal_deadline_days,
            self.confirm_due_days,
        )
    }

    /// Submission deadline for a given attempt start, when the kind is
    /// time-boxed.
    pub fn deadline_for(&self, started_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.kind.has_deadline() {
            return None;
        }
        let secs = self.duration_secs.unwrap_or(0);
        Some(started_at + Duration::seconds(secs))
    }
}

/// A pool of questions an item draws from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPool {
    pub id: String,
    pub title: String,
    /// Exam set composition: how many questions of each format to draw.
    /// Empty for single-draw kinds.
    pub composition: BTreeMap<QuestionFormat, usize>,
}

/// Rubric criterion for assignment grading: grader fills in up to
/// `max_point` points per criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricCriterion {
    pub name: String,
    pub max_point: u32,
}

/// Point requirements for a discussion question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointRequirements {
    pub post_point: u32,
    pub reply_point: u32,
    pub tutor_assessment_point: u32,
    pub post_min_characters: usize,
    pub reply_min_characters: usize,
}

impl PointRequirements {
    pub fn total(&self) -> u32 {
        self.post_point + self.reply_point + self.tutor_assessment_point
    }
}

/// One question. Exam questions use `format`/`options`/`point`; assignment
/// questions carry `rubric`; discussion questions carry `requirements`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: u64,
    pub pool_id: String,
    pub format: QuestionFormat,
    pub text: String,
    pub supplement: String,
    pub options: Vec<String>,
    pub point: u32,
    pub rubric: Vec<RubricCriterion>,
    pub requirements: Option<PointRequirements>,
    /// Attachments an assignment submission must include. Zero for kinds
    /// without attachments.
    pub attachment_file_count: u32,
}

/// Accepted answers and explanation for one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub question_id: u64,
    pub correct_answers: Vec<String>,
    pub explanation: String,
}

/// One learner's try at one item within one context.
///
/// At most one attempt per (item, learner, context) may be active at any
/// committed instant; the store enforces this at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub item_id: String,
    pub learner_id: String,
    /// Opaque scoping key; "" means standalone.
    pub context: String,
    pub started_at: DateTime<Utc>,
    pub active: bool,
    /// Content selected at start time.
    pub question_ids: Vec<u64>,
}

/// In-progress answers, kept separate from the submission so progress
/// survives reconnects without finalizing anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScratchAnswer {
    pub attempt_id: Uuid,
    pub answers: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

/// Attachment metadata supplied with an assignment submission. The bytes
/// themselves live with an external storage collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub name: String,
    pub size_bytes: u64,
}

/// The single, immutable submission of one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub attempt_id: Uuid,
    /// Exam answers keyed by question id. Empty for other kinds.
    pub answers: BTreeMap<String, String>,
    /// Assignment answer body. Empty for other kinds.
    pub answer: String,
    pub attachments: Vec<AttachmentMeta>,
    /// Plain text derived from the payload for search indexing.
    pub extracted_text: String,
    pub created_at: DateTime<Utc>,
}

/// Per-component earned points; `None` marks a subjective component a
/// grader has not scored yet.
pub type EarnedDetails = BTreeMap<String, Option<i64>>;

/// The grade of one attempt. Created automatically on submit, later
/// completed and confirmed by a grader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grade {
    pub attempt_id: Uuid,
    pub earned_details: EarnedDetails,
    pub possible_point: u32,
    pub earned_point: u32,
    pub score: f64,
    pub passed: bool,
    pub grader_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Invariant: never set while `completed_at` is unset.
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A learner-initiated grade appeal, unique per (question, learner).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appeal {
    pub id: u64,
    pub question_id: u64,
    pub learner_id: String,
    pub explanation: String,
    pub review: String,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A learner's window onto one piece of content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: String,
    pub content_kind: ContentKind,
    pub content_id: String,
    pub active: bool,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub archive: DateTime<Utc>,
    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn window(&self) -> AccessWindow {
        AccessWindow {
            start: self.start,
            end: self.end,
            archive: self.archive,
        }
    }
}

/// Public availability window for a media item, independent of enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicAccessWindow {
    pub media_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub archive: DateTime<Utc>,
}

impl PublicAccessWindow {
    pub fn window(&self) -> AccessWindow {
        AccessWindow {
            start: self.start,
            end: self.end,
            archive: self.archive,
        }
    }
}

/// Watch state for one media item, consumed (not produced) by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchRecord {
    pub media_id: String,
    pub user_id: String,
    pub context: String,
    pub rate: f64,
    pub passed: bool,
}

/// Proof that a learner passed the external verification flow for one
/// consumer. Freshness is checked against a configured expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub user_id: String,
    pub consumer_kind: ContentKind,
    pub consumer_id: String,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

/// A course binding lessons and assessments together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub verification_required: bool,
    /// Certificates a passing learner may request.
    pub certificate_ids: Vec<String>,
}

/// An ordered lesson inside a course, scheduled by day offsets relative to
/// the course access window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: u64,
    pub course_id: String,
    pub title: String,
    pub ordering: u32,
    pub start_offset_days: u32,
    /// Days after the lesson start; `None` inherits the course window end.
    pub end_offset_days: Option<u32>,
    pub media_ids: Vec<String>,
}

/// Binds one assessable item into a course with a weight and schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub course_id: String,
    pub item_kind: ItemKind,
    pub item_id: String,
    pub weight: u32,
    pub start_offset_days: u32,
    pub end_offset_days: Option<u32>,
}

/// How a course's gradebook is composed. One per course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingPolicy {
    pub course_id: String,
    pub assessment_weight: u32,
    pub completion_weight: u32,
    pub completion_passing_point: u32,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            course_id: String::new(),
            assessment_weight: 100,
            completion_weight: 0,
            completion_passing_point: 80,
        }
    }
}

/// A learner's course-level session; parent of all attempts taken under
/// that course. Same one-active invariant as [`Attempt`], scoped to
/// (course, learner).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engagement {
    pub id: Uuid,
    pub course_id: String,
    pub learner_id: String,
    pub active: bool,
    pub started_at: DateTime<Utc>,
}

impl Engagement {
    /// The context key consumed by every child attempt.
    pub fn issue_context(&self) -> String {
        format!("course::{}::{}", self.course_id, self.id)
    }
}

/// Outcome of one criterion inside a gradebook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionResult {
    pub value: f64,
    pub passing_point: u32,
    pub passed: bool,
}

/// The rolled-up course verdict for one engagement. `None` details mark
/// criteria with no usable grade yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gradebook {
    pub engagement_id: Uuid,
    pub details: BTreeMap<String, Option<CriterionResult>>,
    pub score: f64,
    pub completion_rate: f64,
    pub passed: bool,
    pub grader_id: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// One discussion post; replies reference their parent. The parent author
/// is denormalized so reply validity can be judged without a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub attempt_id: Uuid,
    pub parent_id: Option<u64>,
    pub parent_author_id: Option<String>,
    pub author_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> AccessWindow {
        AccessWindow {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            archive: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        }
    }

    fn exam_item() -> AssessableItem {
        AssessableItem {
            id: "ex1".to_string(),
            kind: ItemKind::Exam,
            title: "Midterm".to_string(),
            passing_point: 60,
            max_attempts: 0,
            verification_required: false,
            duration_secs: Some(3600),
            grade_due_days: 7,
            appeal_deadline_days: 3,
            confirm_due_days: 2,
            question_pool_id: "pool1".to_string(),
        }
    }

    #[test]
    fn grading_dates_start_at_window_end() {
        let item = exam_item();
        let dates = item.grading_dates(&window());
        assert_eq!(dates.grade_due, window().end + Duration::days(7));
    }

    #[test]
    fn deadline_applies_only_to_time_boxed_kinds() {
        let exam = exam_item();
        let started = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();
        assert_eq!(
            exam.deadline_for(started),
            Some(started + Duration::seconds(3600))
        );

        let mut assignment = exam_item();
        assignment.kind = ItemKind::Assignment;
        assert_eq!(assignment.deadline_for(started), None);
    }

    #[test]
    fn engagement_context_embeds_course_and_id() {
        let engagement = Engagement {
            id: Uuid::nil(),
            course_id: "c1".to_string(),
            learner_id: "u1".to_string(),
            active: true,
            started_at: Utc::now(),
        };
        assert_eq!(
            engagement.issue_context(),
            format!("course::c1::{}", Uuid::nil())
        );
    }

    #[test]
    fn point_requirements_total_sums_all_parts() {
        let req = PointRequirements {
            post_point: 2,
            reply_point: 2,
            tutor_assessment_point: 1,
            post_min_characters: 200,
            reply_min_characters: 100,
        };
        assert_eq!(req.total(), 5);
    }
}
