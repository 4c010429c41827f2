//! In-memory store
//!
//! Every table lives under one `RwLock`, so a conditional-uniqueness check
//! plus insert happens inside a single write-lock critical section - the
//! in-process analogue of a partial unique index.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cohort_models::{ContentKind, ItemKind};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::record::{
    Appeal, AssessableItem, Assessment, Attempt, Course, Engagement, Enrollment, Grade, Gradebook,
    GradingPolicy, Lesson, Post, PublicAccessWindow, Question, QuestionPool, ScratchAnswer,
    Solution, Submission, VerificationRecord, WatchRecord,
};

#[derive(Default)]
struct Tables {
    items: HashMap<String, AssessableItem>,
    pools: HashMap<String, QuestionPool>,
    questions: BTreeMap<u64, Question>,
    solutions: HashMap<u64, Solution>,
    enrollments: Vec<Enrollment>,
    public_access: Vec<PublicAccessWindow>,
    verifications: Vec<VerificationRecord>,
    attempts: Vec<Attempt>,
    scratches: HashMap<Uuid, ScratchAnswer>,
    submissions: HashMap<Uuid, Submission>,
    grades: HashMap<Uuid, Grade>,
    posts: Vec<Post>,
    post_seq: u64,
    appeals: Vec<Appeal>,
    appeal_seq: u64,
    courses: HashMap<String, Course>,
    lessons: Vec<Lesson>,
    assessments: Vec<Assessment>,
    policies: HashMap<String, GradingPolicy>,
    engagements: Vec<Engagement>,
    gradebooks: HashMap<Uuid, Gradebook>,
    watches: Vec<WatchRecord>,
}

/// Fully in-process [`Store`] implementation.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding helpers for content that an admin surface would normally
    // manage. Not part of the Store trait.

    pub async fn put_item(&self, item: AssessableItem) {
        self.tables.write().await.items.insert(item.id.clone(), item);
    }

    pub async fn put_pool(&self, pool: QuestionPool) {
        self.tables.write().await.pools.insert(pool.id.clone(), pool);
    }

    pub async fn put_question(&self, question: Question, solution: Option<Solution>) {
        let mut tables = self.tables.write().await;
        if let Some(solution) = solution {
            tables.solutions.insert(question.id, solution);
        }
        tables.questions.insert(question.id, question);
    }

    pub async fn put_public_access(&self, window: PublicAccessWindow) {
        self.tables.write().await.public_access.push(window);
    }

    pub async fn put_course(&self, course: Course) {
        self.tables
            .write()
            .await
            .courses
            .insert(course.id.clone(), course);
    }

    pub async fn put_lesson(&self, lesson: Lesson) {
        self.tables.write().await.lessons.push(lesson);
    }

    pub async fn put_assessment(&self, assessment: Assessment) {
        self.tables.write().await.assessments.push(assessment);
    }

    pub async fn put_grading_policy(&self, policy: GradingPolicy) {
        self.tables
            .write()
            .await
            .policies
            .insert(policy.course_id.clone(), policy);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn item(&self, id: &str) -> Result<AssessableItem, StoreError> {
        self.tables
            .read()
            .await
            .items
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("item", id))
    }

    async fn items(&self, ids: &[String]) -> Result<HashMap<String, AssessableItem>, StoreError> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.items.get(id).cloned().map(|item| (id.clone(), item)))
            .collect())
    }

    async fn pool(&self, id: &str) -> Result<QuestionPool, StoreError> {
        self.tables
            .read()
            .await
            .pools
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("question pool", id))
    }

    async fn pool_questions(&self, pool_id: &str) -> Result<Vec<Question>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .questions
            .values()
            .filter(|q| q.pool_id == pool_id)
            .cloned()
            .collect())
    }

    async fn questions(&self, ids: &[u64]) -> Result<Vec<Question>, StoreError> {
        let tables = self.tables.read().await;
        let mut result: Vec<Question> = ids
            .iter()
            .filter_map(|id| tables.questions.get(id).cloned())
            .collect();
        result.sort_by_key(|q| q.id);
        Ok(result)
    }

    async fn solutions(&self, question_ids: &[u64]) -> Result<HashMap<u64, Solution>, StoreError> {
        let tables = self.tables.read().await;
        Ok(question_ids
            .iter()
            .filter_map(|id| tables.solutions.get(id).cloned().map(|s| (*id, s)))
            .collect())
    }

    async fn active_enrollment(
        &self,
        user_id: &str,
        kind: ContentKind,
        content_id: &str,
    ) -> Result<Option<Enrollment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .enrollments
            .iter()
            .find(|e| {
                e.active && e.user_id == user_id && e.content_kind == kind && e.content_id == content_id
            })
            .cloned())
    }

    async fn insert_enrollment(&self, enrollment: Enrollment) -> Result<Enrollment, StoreError> {
        let mut tables = self.tables.write().await;
        let duplicate = tables.enrollments.iter().any(|e| {
            e.active
                && e.user_id == enrollment.user_id
                && e.content_kind == enrollment.content_kind
                && e.content_id == enrollment.content_id
        });
        if enrollment.active && duplicate {
            return Err(StoreError::Conflict {
                constraint: "enrollment_active_uniq",
            });
        }
        tables.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }

    async fn public_access(
        &self,
        media_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PublicAccessWindow>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .public_access
            .iter()
            .find(|w| w.media_id == media_id && w.start <= now && w.archive >= now)
            .cloned())
    }

    async fn latest_verification(
        &self,
        user_id: &str,
        kind: ContentKind,
        consumer_id: &str,
    ) -> Result<Option<VerificationRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .verifications
            .iter()
            .filter(|v| {
                v.user_id == user_id && v.consumer_kind == kind && v.consumer_id == consumer_id
            })
            .max_by_key(|v| v.created_at)
            .cloned())
    }

    async fn record_verification(&self, record: VerificationRecord) -> Result<(), StoreError> {
        self.tables.write().await.verifications.push(record);
        Ok(())
    }

    async fn insert_attempt(&self, attempt: Attempt) -> Result<Attempt, StoreError> {
        let mut tables = self.tables.write().await;
        let duplicate = tables.attempts.iter().any(|a| {
            a.active
                && a.item_id == attempt.item_id
                && a.learner_id == attempt.learner_id
                && a.context == attempt.context
        });
        if attempt.active && duplicate {
            return Err(StoreError::Conflict {
                constraint: "attempt_active_uniq",
            });
        }
        tables.attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn active_attempt(
        &self,
        item_id: &str,
        learner_id: &str,
        context: &str,
    ) -> Result<Option<Attempt>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .attempts
            .iter()
            .find(|a| {
                a.active && a.item_id == item_id && a.learner_id == learner_id && a.context == context
            })
            .cloned())
    }

    async fn attempt_count(
        &self,
        item_id: &str,
        learner_id: &str,
        context: &str,
    ) -> Result<u32, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .attempts
            .iter()
            .filter(|a| a.item_id == item_id && a.learner_id == learner_id && a.context == context)
            .count() as u32)
    }

    async fn update_attempt(&self, attempt: Attempt) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .attempts
            .iter_mut()
            .find(|a| a.id == attempt.id)
            .ok_or_else(|| StoreError::not_found("attempt", attempt.id.to_string()))?;
        *slot = attempt;
        Ok(())
    }

    async fn scratch(&self, attempt_id: Uuid) -> Result<Option<ScratchAnswer>, StoreError> {
        Ok(self.tables.read().await.scratches.get(&attempt_id).cloned())
    }

    async fn merge_scratch(
        &self,
        attempt_id: Uuid,
        answers: BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<ScratchAnswer, StoreError> {
        let mut tables = self.tables.write().await;
        let scratch = tables
            .scratches
            .entry(attempt_id)
            .or_insert_with(|| ScratchAnswer {
                attempt_id,
                answers: BTreeMap::new(),
                updated_at: now,
            });
        scratch.answers.extend(answers);
        scratch.updated_at = now;
        Ok(scratch.clone())
    }

    async fn insert_submission(&self, submission: Submission) -> Result<Submission, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.submissions.contains_key(&submission.attempt_id) {
            return Err(StoreError::Conflict {
                constraint: "submission_attempt_uniq",
            });
        }
        tables
            .submissions
            .insert(submission.attempt_id, submission.clone());
        Ok(submission)
    }

    async fn submission(&self, attempt_id: Uuid) -> Result<Option<Submission>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .submissions
            .get(&attempt_id)
            .cloned())
    }

    async fn grade(&self, attempt_id: Uuid) -> Result<Option<Grade>, StoreError> {
        Ok(self.tables.read().await.grades.get(&attempt_id).cloned())
    }

    async fn upsert_grade(&self, grade: Grade) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .grades
            .insert(grade.attempt_id, grade);
        Ok(())
    }

    async fn item_scores(&self, item_id: &str) -> Result<Vec<f64>, StoreError> {
        let tables = self.tables.read().await;
        let attempt_ids: HashSet<Uuid> = tables
            .attempts
            .iter()
            .filter(|a| a.item_id == item_id)
            .map(|a| a.id)
            .collect();
        Ok(tables
            .grades
            .values()
            .filter(|g| attempt_ids.contains(&g.attempt_id))
            .map(|g| g.score)
            .collect())
    }

    async fn insert_post(&self, mut post: Post) -> Result<Post, StoreError> {
        let mut tables = self.tables.write().await;
        tables.post_seq += 1;
        post.id = tables.post_seq;
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn posts(&self, attempt_id: Uuid) -> Result<Vec<Post>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .filter(|p| p.attempt_id == attempt_id)
            .cloned()
            .collect())
    }

    async fn insert_appeal(&self, mut appeal: Appeal) -> Result<Appeal, StoreError> {
        let mut tables = self.tables.write().await;
        let duplicate = tables
            .appeals
            .iter()
            .any(|a| a.question_id == appeal.question_id && a.learner_id == appeal.learner_id);
        if duplicate {
            return Err(StoreError::Conflict {
                constraint: "appeal_question_learner_uniq",
            });
        }
        tables.appeal_seq += 1;
        appeal.id = tables.appeal_seq;
        tables.appeals.push(appeal.clone());
        Ok(appeal)
    }

    async fn appeals_for(
        &self,
        learner_id: &str,
        question_ids: &[u64],
    ) -> Result<Vec<Appeal>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .appeals
            .iter()
            .filter(|a| a.learner_id == learner_id && question_ids.contains(&a.question_id))
            .cloned()
            .collect())
    }

    async fn close_appeal(&self, id: u64, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let appeal = tables
            .appeals
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::not_found("appeal", id.to_string()))?;
        if appeal.closed_at.is_none() {
            appeal.closed_at = Some(now);
        }
        Ok(())
    }

    async fn course(&self, id: &str) -> Result<Course, StoreError> {
        self.tables
            .read()
            .await
            .courses
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("course", id))
    }

    async fn lessons(&self, course_id: &str) -> Result<Vec<Lesson>, StoreError> {
        let tables = self.tables.read().await;
        let mut lessons: Vec<Lesson> = tables
            .lessons
            .iter()
            .filter(|l| l.course_id == course_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| l.ordering);
        Ok(lessons)
    }

    async fn assessments(&self, course_id: &str) -> Result<Vec<Assessment>, StoreError> {
        let tables = self.tables.read().await;
        let mut assessments: Vec<Assessment> = tables
            .assessments
            .iter()
            .filter(|a| a.course_id == course_id)
            .cloned()
            .collect();
        assessments.sort_by(|a, b| {
            (a.start_offset_days, a.end_offset_days, &a.item_id)
                .cmp(&(b.start_offset_days, b.end_offset_days, &b.item_id))
        });
        Ok(assessments)
    }

    async fn assessment(
        &self,
        course_id: &str,
        kind: ItemKind,
        item_id: &str,
    ) -> Result<Option<Assessment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .assessments
            .iter()
            .find(|a| a.course_id == course_id && a.item_kind == kind && a.item_id == item_id)
            .cloned())
    }

    async fn lesson_for_media(
        &self,
        course_id: &str,
        media_id: &str,
    ) -> Result<Option<Lesson>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .lessons
            .iter()
            .find(|l| l.course_id == course_id && l.media_ids.iter().any(|m| m == media_id))
            .cloned())
    }

    async fn grading_policy(&self, course_id: &str) -> Result<GradingPolicy, StoreError> {
        self.tables
            .read()
            .await
            .policies
            .get(course_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("grading policy", course_id))
    }

    async fn insert_engagement(&self, engagement: Engagement) -> Result<Engagement, StoreError> {
        let mut tables = self.tables.write().await;
        let duplicate = tables.engagements.iter().any(|e| {
            e.active && e.course_id == engagement.course_id && e.learner_id == engagement.learner_id
        });
        if engagement.active && duplicate {
            return Err(StoreError::Conflict {
                constraint: "engagement_active_uniq",
            });
        }
        tables.engagements.push(engagement.clone());
        Ok(engagement)
    }

    async fn active_engagement(
        &self,
        course_id: &str,
        learner_id: &str,
    ) -> Result<Option<Engagement>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .engagements
            .iter()
            .find(|e| e.active && e.course_id == course_id && e.learner_id == learner_id)
            .cloned())
    }

    async fn gradebook(&self, engagement_id: Uuid) -> Result<Option<Gradebook>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .gradebooks
            .get(&engagement_id)
            .cloned())
    }

    async fn upsert_gradebook(&self, gradebook: Gradebook) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .gradebooks
            .insert(gradebook.engagement_id, gradebook);
        Ok(())
    }

    async fn passed_media(
        &self,
        user_id: &str,
        context: &str,
    ) -> Result<HashSet<String>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .watches
            .iter()
            .filter(|w| w.user_id == user_id && w.context == context && w.passed)
            .map(|w| w.media_id.clone())
            .collect())
    }

    async fn put_watch(&self, watch: WatchRecord) -> Result<(), StoreError> {
        self.tables.write().await.watches.push(watch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn attempt(item: &str, learner: &str, context: &str) -> Attempt {
        Attempt {
            id: Uuid::new_v4(),
            item_id: item.to_string(),
            learner_id: learner.to_string(),
            context: context.to_string(),
            started_at: Utc::now(),
            active: true,
            question_ids: vec![],
        }
    }

    // ==================== Conditional Uniqueness Tests ====================

    #[tokio::test]
    async fn second_active_attempt_conflicts() {
        let store = MemoryStore::new();
        store.insert_attempt(attempt("ex1", "u1", "")).await.unwrap();

        let result = store.insert_attempt(attempt("ex1", "u1", "")).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn inactive_attempts_do_not_conflict() {
        let store = MemoryStore::new();
        let mut first = attempt("ex1", "u1", "");
        store.insert_attempt(first.clone()).await.unwrap();

        first.active = false;
        store.update_attempt(first).await.unwrap();

        store.insert_attempt(attempt("ex1", "u1", "")).await.unwrap();
        assert_eq!(store.attempt_count("ex1", "u1", "").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn different_contexts_do_not_conflict() {
        let store = MemoryStore::new();
        store.insert_attempt(attempt("ex1", "u1", "")).await.unwrap();
        store
            .insert_attempt(attempt("ex1", "u1", "course::c1::x"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn concurrent_inserts_admit_exactly_one() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.insert_attempt(attempt("ex1", "u1", "")).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn second_submission_conflicts() {
        let store = MemoryStore::new();
        let attempt_id = Uuid::new_v4();
        let submission = Submission {
            attempt_id,
            answers: BTreeMap::new(),
            answer: String::new(),
            attachments: vec![],
            extracted_text: String::new(),
            created_at: Utc::now(),
        };

        store.insert_submission(submission.clone()).await.unwrap();
        let result = store.insert_submission(submission).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn second_engagement_conflicts() {
        let store = MemoryStore::new();
        let engagement = Engagement {
            id: Uuid::new_v4(),
            course_id: "c1".to_string(),
            learner_id: "u1".to_string(),
            active: true,
            started_at: Utc::now(),
        };
        store.insert_engagement(engagement.clone()).await.unwrap();

        let mut second = engagement;
        second.id = Uuid::new_v4();
        let result = store.insert_engagement(second).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn second_appeal_for_same_question_conflicts() {
        let store = MemoryStore::new();
        let appeal = Appeal {
            id: 0,
            question_id: 7,
            learner_id: "u1".to_string(),
            explanation: "why".to_string(),
            review: String::new(),
            closed_at: None,
            created_at: Utc::now(),
        };
        store.insert_appeal(appeal.clone()).await.unwrap();

        let result = store.insert_appeal(appeal).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    // ==================== Scratch Merge Tests ====================

    #[tokio::test]
    async fn merge_scratch_extends_previous_answers() {
        let store = MemoryStore::new();
        let attempt_id = Uuid::new_v4();
        let now = Utc::now();

        store
            .merge_scratch(
                attempt_id,
                BTreeMap::from([("1".to_string(), "a".to_string())]),
                now,
            )
            .await
            .unwrap();
        let merged = store
            .merge_scratch(
                attempt_id,
                BTreeMap::from([("2".to_string(), "b".to_string())]),
                now,
            )
            .await
            .unwrap();

        assert_eq!(merged.answers.len(), 2);
        assert_eq!(merged.answers["1"], "a");
    }

    #[tokio::test]
    async fn merge_scratch_overwrites_same_key() {
        let store = MemoryStore::new();
        let attempt_id = Uuid::new_v4();
        let now = Utc::now();

        store
            .merge_scratch(
                attempt_id,
                BTreeMap::from([("1".to_string(), "a".to_string())]),
                now,
            )
            .await
            .unwrap();
        let merged = store
            .merge_scratch(
                attempt_id,
                BTreeMap::from([("1".to_string(), "b".to_string())]),
                now,
            )
            .await
            .unwrap();

        assert_eq!(merged.answers["1"], "b");
    }

    // ==================== Lookup Tests ====================

    #[tokio::test]
    async fn questions_return_in_ascending_id_order() {
        let store = MemoryStore::new();
        for id in [5u64, 2, 9] {
            store
                .put_question(
                    Question {
                        id,
                        pool_id: "p1".to_string(),
                        format: cohort_models::QuestionFormat::TextInput,
                        text: format!("q{id}"),
                        supplement: String::new(),
                        options: vec![],
                        point: 1,
                        rubric: vec![],
                        requirements: None,
                        attachment_file_count: 0,
                    },
                    None,
                )
                .await;
        }

        let questions = store.questions(&[9, 5, 2]).await.unwrap();
        let ids: Vec<u64> = questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }

    #[tokio::test]
    async fn public_access_only_matches_covering_windows() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .put_public_access(PublicAccessWindow {
                media_id: "m1".to_string(),
                start: now - chrono::Duration::days(1),
                end: now + chrono::Duration::days(1),
                archive: now + chrono::Duration::days(2),
            })
            .await;

        assert!(store.public_access("m1", now).await.unwrap().is_some());
        assert!(
            store
                .public_access("m1", now + chrono::Duration::days(3))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn passed_media_filters_by_context() {
        let store = MemoryStore::new();
        store
            .put_watch(WatchRecord {
                media_id: "m1".to_string(),
                user_id: "u1".to_string(),
                context: "course::c1::e1".to_string(),
                rate: 100.0,
                passed: true,
            })
            .await
            .unwrap();
        store
            .put_watch(WatchRecord {
                media_id: "m2".to_string(),
                user_id: "u1".to_string(),
                context: "".to_string(),
                rate: 20.0,
                passed: false,
            })
            .await
            .unwrap();

        let passed = store.passed_media("u1", "course::c1::e1").await.unwrap();
        assert!(passed.contains("m1"));
        assert!(!passed.contains("m2"));
    }
}
