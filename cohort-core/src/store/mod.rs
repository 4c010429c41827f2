//! Storage facade
//!
//! [`Store`] is the seam between the domain engine and persistence. The
//! concurrency-sensitive invariants (one active attempt/engagement per key,
//! one submission per attempt, one appeal per question/learner) are enforced
//! *inside* the store at insert time - callers never pre-check, so two
//! concurrent inserts resolve to exactly one winner.

mod memory;

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cohort_models::{ContentKind, ErrorCode, ItemKind};
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryStore;

use crate::record::{
    Appeal, AssessableItem, Assessment, Attempt, Course, Engagement, Enrollment, Grade, Gradebook,
    GradingPolicy, Lesson, Post, PublicAccessWindow, Question, QuestionPool, ScratchAnswer,
    Solution, Submission, VerificationRecord, WatchRecord,
};

/// Errors from the storage layer
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("uniqueness conflict on {constraint}")]
    Conflict { constraint: &'static str },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Conflict { .. } => ErrorCode::AlreadyExists,
        }
    }
}

/// Persistence seam for the learning session core.
#[async_trait]
pub trait Store: Send + Sync {
    // ---- items & content ----

    async fn item(&self, id: &str) -> Result<AssessableItem, StoreError>;
    async fn items(&self, ids: &[String]) -> Result<HashMap<String, AssessableItem>, StoreError>;
    async fn pool(&self, id: &str) -> Result<QuestionPool, StoreError>;
    async fn pool_questions(&self, pool_id: &str) -> Result<Vec<Question>, StoreError>;
    async fn questions(&self, ids: &[u64]) -> Result<Vec<Question>, StoreError>;
    async fn solutions(&self, question_ids: &[u64]) -> Result<HashMap<u64, Solution>, StoreError>;

    // ---- enrollment & public access ----

    /// The learner's active enrollment in this content, if any.
    async fn active_enrollment(
        &self,
        user_id: &str,
        kind: ContentKind,
        content_id: &str,
    ) -> Result<Option<Enrollment>, StoreError>;

    /// One active enrollment per (user, content); conflicts at insert time.
    async fn insert_enrollment(&self, enrollment: Enrollment) -> Result<Enrollment, StoreError>;

    /// The public-access window covering `now` for a media item, if any.
    async fn public_access(
        &self,
        media_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PublicAccessWindow>, StoreError>;

    // ---- verification ----

    async fn latest_verification(
        &self,
        user_id: &str,
        kind: ContentKind,
        consumer_id: &str,
    ) -> Result<Option<VerificationRecord>, StoreError>;

    async fn record_verification(&self, record: VerificationRecord) -> Result<(), StoreError>;

    // ---- attempts ----

    /// One active attempt per (item, learner, context); conflicts at insert
    /// time, never via a pre-check.
    async fn insert_attempt(&self, attempt: Attempt) -> Result<Attempt, StoreError>;
    async fn active_attempt(
        &self,
        item_id: &str,
        learner_id: &str,
        context: &str,
    ) -> Result<Option<Attempt>, StoreError>;
    /// Historical attempt count for the key, active or not.
    async fn attempt_count(
        &self,
        item_id: &str,
        learner_id: &str,
        context: &str,
    ) -> Result<u32, StoreError>;
    async fn update_attempt(&self, attempt: Attempt) -> Result<(), StoreError>;

    // ---- scratch answers ----

    async fn scratch(&self, attempt_id: Uuid) -> Result<Option<ScratchAnswer>, StoreError>;
    /// Merge partial answers into the scratch record, creating it if absent.
    async fn merge_scratch(
        &self,
        attempt_id: Uuid,
        answers: BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<ScratchAnswer, StoreError>;

    // ---- submissions ----

    /// One submission per attempt; conflicts at insert time.
    async fn insert_submission(&self, submission: Submission) -> Result<Submission, StoreError>;
    async fn submission(&self, attempt_id: Uuid) -> Result<Option<Submission>, StoreError>;

    // ---- grades ----

    async fn grade(&self, attempt_id: Uuid) -> Result<Option<Grade>, StoreError>;
    async fn upsert_grade(&self, grade: Grade) -> Result<(), StoreError>;
    /// All grade scores recorded for an item, across learners.
    async fn item_scores(&self, item_id: &str) -> Result<Vec<f64>, StoreError>;

    // ---- discussion posts ----

    /// Insert a post; the store assigns the id.
    async fn insert_post(&self, post: Post) -> Result<Post, StoreError>;
    async fn posts(&self, attempt_id: Uuid) -> Result<Vec<Post>, StoreError>;

    // ---- appeals ----

    /// One appeal per (question, learner); conflicts at insert time.
    async fn insert_appeal(&self, appeal: Appeal) -> Result<Appeal, StoreError>;
    async fn appeals_for(
        &self,
        learner_id: &str,
        question_ids: &[u64],
    ) -> Result<Vec<Appeal>, StoreError>;
    async fn close_appeal(&self, id: u64, now: DateTime<Utc>) -> Result<(), StoreError>;

    // ---- courses ----

    async fn course(&self, id: &str) -> Result<Course, StoreError>;
    async fn lessons(&self, course_id: &str) -> Result<Vec<Lesson>, StoreError>;
    async fn assessments(&self, course_id: &str) -> Result<Vec<Assessment>, StoreError>;
    async fn assessment(
        &self,
        course_id: &str,
        kind: ItemKind,
        item_id: &str,
    ) -> Result<Option<Assessment>, StoreError>;
    async fn lesson_for_media(
        &self,
        course_id: &str,
        media_id: &str,
    ) -> Result<Option<Lesson>, StoreError>;
    async fn grading_policy(&self, course_id: &str) -> Result<GradingPolicy, StoreError>;

    // ---- engagements & gradebooks ----

    /// One active engagement per (course, learner); conflicts at insert time.
    async fn insert_engagement(&self, engagement: Engagement) -> Result<Engagement, StoreError>;
    async fn active_engagement(
        &self,
        course_id: &str,
        learner_id: &str,
    ) -> Result<Option<Engagement>, StoreError>;
    async fn gradebook(&self, engagement_id: Uuid) -> Result<Option<Gradebook>, StoreError>;
    async fn upsert_gradebook(&self, gradebook: Gradebook) -> Result<(), StoreError>;

    // ---- watch records ----

    /// Media ids the learner has passed within a context.
    async fn passed_media(
        &self,
        user_id: &str,
        context: &str,
    ) -> Result<HashSet<String>, StoreError>;
    async fn put_watch(&self, watch: WatchRecord) -> Result<(), StoreError>;
}
