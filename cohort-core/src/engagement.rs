//! Course engagement and the course-level gradebook
//!
//! An engagement is the course-scoped analogue of an attempt: one active
//! per (course, learner), enforced at insert time. It issues the context
//! key every child attempt is scoped by, and owns the gradebook the
//! weighted aggregator writes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use cohort_models::{AccessWindow, ContentKind};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::course::{GradingCriterion, build_criteria};
use crate::error::{CoreError, CourseError};
use crate::record::{Course, CriterionResult, Engagement, Gradebook, Lesson};
use crate::store::{Store, StoreError};
use crate::verification;

/// A lesson with its effective dates inside the learner's window.
#[derive(Debug, Clone, Serialize)]
pub struct LessonSchedule {
    pub lesson: Lesson,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// The derived course session view.
#[derive(Debug, Clone, Serialize)]
pub struct CourseSession {
    pub access_window: AccessWindow,
    pub course: Course,
    pub lessons: Vec<LessonSchedule>,
    pub criteria: Vec<GradingCriterion>,
    pub engagement: Option<Engagement>,
    pub gradebook: Option<Gradebook>,
    pub verification_token: Option<String>,
}

/// What the external certificate collaborator needs to render a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRequest {
    pub certificate_id: String,
    pub course_id: String,
    pub course_title: String,
    pub learner_id: String,
    pub context: String,
    pub engaged_at: DateTime<Utc>,
    pub confirmed_at: DateTime<Utc>,
}

/// Receipt returned by the certificate collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateAward {
    pub award_id: String,
    pub certificate_id: String,
    pub issued_at: DateTime<Utc>,
}

/// Seam to the external certificate issuer. Document rendering and delivery
/// are out of scope here; qualification checks are not.
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    async fn issue(&self, request: CertificateRequest) -> Result<CertificateAward, CoreError>;
}

/// Map a raw attempt context to its stable client-facing form:
/// `course::{course}::{engagement}` becomes `course={course}`, anything
/// else collapses to standalone.
pub fn normalize_context(context: &str) -> String {
    if context.is_empty() {
        return String::new();
    }
    let parts: Vec<&str> = context.split("::").collect();
    if parts.len() >= 2 && parts[0] == "course" {
        return format!("course={}", parts[1]);
    }
    String::new()
}

/// Course-level operations: engagement lifecycle, the course session view,
/// the weighted gradebook, and the certificate gate.
pub struct CourseService {
    store: Arc<dyn Store>,
    config: CoreConfig,
}

impl CourseService {
    pub fn new(store: Arc<dyn Store>, config: CoreConfig) -> Self {
        Self { store, config }
    }

    /// Start a course engagement. Exactly one can be active per
    /// (course, learner); the conflict is detected at insert time.
    pub async fn start_engagement(
        &self,
        course_id: &str,
        learner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Engagement, CoreError> {
        let course = self.store.course(course_id).await?;

        verification::require_verified(
            self.store.as_ref(),
            &self.config,
            course.verification_required,
            learner_id,
            ContentKind::Course,
            course_id,
            now,
        )
        .await?;

        let engagement = Engagement {
            id: Uuid::new_v4(),
            course_id: course_id.to_string(),
            learner_id: learner_id.to_string(),
            active: true,
            started_at: now,
        };

        match self.store.insert_engagement(engagement).await {
            Ok(engagement) => Ok(engagement),
            Err(StoreError::Conflict { .. }) => Err(CourseError::AlreadyEngaged.into()),
            Err(other) => Err(other.into()),
        }
    }

    /// The context key for this learner's active engagement, or "" for
    /// standalone when no course is involved.
    pub async fn active_context(
        &self,
        course_id: Option<&str>,
        learner_id: &str,
    ) -> Result<String, CoreError> {
        let Some(course_id) = course_id else {
            return Ok(String::new());
        };
        let engagement = self
            .store
            .active_engagement(course_id, learner_id)
            .await?
            .ok_or_else(|| StoreError::not_found("engagement", format!("{course_id}/{learner_id}")))?;
        Ok(engagement.issue_context())
    }

    /// Assemble the course session view. The caller has already resolved
    /// the access window.
    pub async fn session(
        &self,
        course_id: &str,
        learner_id: &str,
        window: AccessWindow,
        now: DateTime<Utc>,
    ) -> Result<CourseSession, CoreError> {
        let course = self.store.course(course_id).await?;
        let lessons = self.store.lessons(course_id).await?;
        let policy = self.store.grading_policy(course_id).await?;
        let assessments = self.store.assessments(course_id).await?;
        let item_ids: Vec<String> = assessments.iter().map(|a| a.item_id.clone()).collect();
        let items = self.store.items(&item_ids).await?;

        let lessons = lessons
            .into_iter()
            .map(|lesson| {
                let start_date =
                    window.start + Duration::days(i64::from(lesson.start_offset_days));
                let end_date = match lesson.end_offset_days {
                    Some(days) => start_date + Duration::days(i64::from(days)),
                    None => window.end,
                };
                LessonSchedule {
                    lesson,
                    start_date,
                    end_date,
                }
            })
            .collect();

        let engagement = self.store.active_engagement(course_id, learner_id).await?;
        let gradebook = match &engagement {
            Some(engagement) => self.store.gradebook(engagement.id).await?,
            None => None,
        };

        let verification_token = match (&engagement, course.verification_required) {
            (None, true) => verification::issue_token(
                &self.config,
                learner_id,
                ContentKind::Course,
                course_id,
                now,
            ),
            _ => None,
        };

        Ok(CourseSession {
            access_window: window,
            criteria: build_criteria(&policy, &assessments, &items, Some(&window)),
            course,
            lessons,
            engagement,
            gradebook,
            verification_token,
        })
    }

    /// Recompute the course gradebook from the latest per-item grades and
    /// the completion rate. Idempotent; overwrites the previous result.
    pub async fn grade_course(
        &self,
        course_id: &str,
        learner_id: &str,
        grader_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Gradebook, CoreError> {
        let engagement = self
            .store
            .active_engagement(course_id, learner_id)
            .await?
            .ok_or_else(|| StoreError::not_found("engagement", format!("{course_id}/{learner_id}")))?;
        let context = engagement.issue_context();

        let policy = self.store.grading_policy(course_id).await?;
        let assessments = self.store.assessments(course_id).await?;
        let item_ids: Vec<String> = assessments.iter().map(|a| a.item_id.clone()).collect();
        let items = self.store.items(&item_ids).await?;
        let criteria = build_criteria(&policy, &assessments, &items, None);

        let completion_rate = self
            .completion_rate(course_id, learner_id, &context)
            .await?;

        let mut total_score = 0.0;
        let mut any_failed = false;
        let mut details: BTreeMap<String, Option<CriterionResult>> = BTreeMap::new();

        for criterion in &criteria {
            let weight = criterion.normalized_weight.to_f64().unwrap_or(0.0);

            if criterion.is_completion() {
                let passed = completion_rate >= f64::from(criterion.passing_point);
                details.insert(
                    "completion".to_string(),
                    Some(CriterionResult {
                        value: completion_rate,
                        passing_point: criterion.passing_point,
                        passed,
                    }),
                );
                if weight > 0.0 {
                    total_score += completion_rate * weight / 100.0;
                }
                if !passed {
                    any_failed = true;
                }
                continue;
            }

            let grade = match self
                .store
                .active_attempt(&criterion.item_id, learner_id, &context)
                .await?
            {
                Some(attempt) => self
                    .store
                    .grade(attempt.id)
                    .await?
                    .filter(|g| g.completed_at.is_some() && g.confirmed_at.is_some()),
                None => None,
            };

            match grade {
                Some(grade) => {
                    details.insert(
                        criterion.item_id.clone(),
                        Some(CriterionResult {
                            value: grade.score,
                            passing_point: criterion.passing_point,
                            passed: grade.passed,
                        }),
                    );
                    if weight > 0.0 {
                        total_score += grade.score * weight / 100.0;
                    }
                    if !grade.passed {
                        any_failed = true;
                    }
                }
                None => {
                    // Ungraded or unconfirmed: contributes nothing and fails
                    // the criterion regardless of weight.
                    details.insert(criterion.item_id.clone(), None);
                    any_failed = true;
                }
            }
        }

        let previous = self.store.gradebook(engagement.id).await?;
        let gradebook = Gradebook {
            engagement_id: engagement.id,
            details,
            score: total_score,
            completion_rate,
            passed: !any_failed,
            grader_id: grader_id.map(str::to_string),
            confirmed_at: previous.and_then(|g| g.confirmed_at),
            updated_at: now,
        };
        self.store.upsert_gradebook(gradebook.clone()).await?;
        tracing::debug!(course_id, learner_id, score = gradebook.score, "gradebook recomputed");
        Ok(gradebook)
    }

    /// Confirm the gradebook, freezing the verdict certificates are issued
    /// against. Written once.
    pub async fn confirm_gradebook(
        &self,
        course_id: &str,
        learner_id: &str,
        grader_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Gradebook, CoreError> {
        let engagement = self
            .store
            .active_engagement(course_id, learner_id)
            .await?
            .ok_or_else(|| StoreError::not_found("engagement", format!("{course_id}/{learner_id}")))?;
        let mut gradebook = self
            .store
            .gradebook(engagement.id)
            .await?
            .ok_or_else(|| StoreError::not_found("gradebook", engagement.id.to_string()))?;

        if gradebook.confirmed_at.is_none() {
            gradebook.confirmed_at = Some(now);
            gradebook.grader_id = Some(grader_id.to_string());
            self.store.upsert_gradebook(gradebook.clone()).await?;
        }
        Ok(gradebook)
    }

    /// Qualification gate for certificate requests: the certificate must
    /// belong to the course and the gradebook must be confirmed and passed.
    /// Issuance itself is forwarded to the external collaborator.
    pub async fn request_certificate(
        &self,
        course_id: &str,
        learner_id: &str,
        certificate_id: &str,
        issuer: &dyn CertificateIssuer,
    ) -> Result<CertificateAward, CoreError> {
        let course = self.store.course(course_id).await?;
        let engagement = self
            .store
            .active_engagement(course_id, learner_id)
            .await?
            .ok_or_else(|| StoreError::not_found("engagement", format!("{course_id}/{learner_id}")))?;

        if !course.certificate_ids.iter().any(|id| id == certificate_id) {
            return Err(CourseError::CertificateNotInCourse.into());
        }

        let gradebook = self.store.gradebook(engagement.id).await?;
        let confirmed_at = match gradebook {
            Some(g) if g.passed => match g.confirmed_at {
                Some(confirmed_at) => confirmed_at,
                None => return Err(CourseError::NotQualified.into()),
            },
            _ => return Err(CourseError::NotQualified.into()),
        };

        issuer
            .issue(CertificateRequest {
                certificate_id: certificate_id.to_string(),
                course_id: course_id.to_string(),
                course_title: course.title,
                learner_id: learner_id.to_string(),
                context: engagement.issue_context(),
                engaged_at: engagement.started_at,
                confirmed_at,
            })
            .await
    }

    /// Percentage of lessons whose every media item is individually passed.
    /// Lessons with no media count toward the total but can never pass.
    async fn completion_rate(
        &self,
        course_id: &str,
        learner_id: &str,
        context: &str,
    ) -> Result<f64, CoreError> {
        let lessons = self.store.lessons(course_id).await?;
        if lessons.is_empty() {
            return Ok(0.0);
        }

        let passed_media = self.store.passed_media(learner_id, context).await?;
        let passed_lessons = lessons
            .iter()
            .filter(|lesson| {
                !lesson.media_ids.is_empty()
                    && lesson.media_ids.iter().all(|m| passed_media.contains(m))
            })
            .count();

        Ok(passed_lessons as f64 * 100.0 / lessons.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use cohort_models::ItemKind;

    use super::*;
    use crate::record::{
        AssessableItem, Assessment, Attempt, Grade, GradingPolicy, WatchRecord,
    };
    use crate::store::MemoryStore;

    fn config() -> CoreConfig {
        CoreConfig::default()
    }

    fn course(id: &str) -> Course {
        Course {
            id: id.to_string(),
            title: "Course".to_string(),
            description: String::new(),
            verification_required: false,
            certificate_ids: vec!["cert1".to_string()],
        }
    }

    fn item(id: &str, passing_point: u32) -> AssessableItem {
        AssessableItem {
            id: id.to_string(),
            kind: ItemKind::Exam,
            title: format!("Item {id}"),
            passing_point,
            max_attempts: 0,
            verification_required: false,
            duration_secs: Some(3600),
            grade_due_days: 7,
            appeal_deadline_days: 3,
            confirm_due_days: 2,
            question_pool_id: "p".to_string(),
        }
    }

    async fn seed_course(store: &MemoryStore, weights: &[(&str, u32)], completion_weight: u32) {
        store.put_course(course("c1")).await;
        store
            .put_grading_policy(GradingPolicy {
                course_id: "c1".to_string(),
                assessment_weight: 100,
                completion_weight,
                completion_passing_point: 80,
            })
            .await;
        for (idx, (item_id, weight)) in weights.iter().enumerate() {
            store.put_item(item(item_id, 60)).await;
            store
                .put_assessment(Assessment {
                    course_id: "c1".to_string(),
                    item_kind: ItemKind::Exam,
                    item_id: item_id.to_string(),
                    weight: *weight,
                    start_offset_days: idx as u32,
                    end_offset_days: None,
                })
                .await;
        }
    }

    async fn seed_confirmed_grade(
        store: &MemoryStore,
        item_id: &str,
        learner: &str,
        context: &str,
        score: f64,
        confirmed: bool,
    ) {
        let attempt = Attempt {
            id: Uuid::new_v4(),
            item_id: item_id.to_string(),
            learner_id: learner.to_string(),
            context: context.to_string(),
            started_at: Utc::now(),
            active: true,
            question_ids: vec![1],
        };
        store.insert_attempt(attempt.clone()).await.unwrap();
        store
            .upsert_grade(Grade {
                attempt_id: attempt.id,
                earned_details: BTreeMap::new(),
                possible_point: 100,
                earned_point: score as u32,
                score,
                passed: score >= 60.0,
                grader_id: None,
                completed_at: Some(Utc::now()),
                confirmed_at: confirmed.then(Utc::now),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    // ==================== Engagement Tests ====================

    #[tokio::test]
    async fn second_engagement_conflicts() {
        let store = Arc::new(MemoryStore::new());
        store.put_course(course("c1")).await;
        let svc = CourseService::new(store.clone(), config());
        let now = Utc::now();

        svc.start_engagement("c1", "u1", now).await.unwrap();
        let result = svc.start_engagement("c1", "u1", now).await;
        assert!(matches!(
            result,
            Err(CoreError::Course(CourseError::AlreadyEngaged))
        ));
    }

    #[tokio::test]
    async fn active_context_routes_through_the_engagement() {
        let store = Arc::new(MemoryStore::new());
        store.put_course(course("c1")).await;
        let svc = CourseService::new(store.clone(), config());

        assert_eq!(svc.active_context(None, "u1").await.unwrap(), "");

        let engagement = svc.start_engagement("c1", "u1", Utc::now()).await.unwrap();
        assert_eq!(
            svc.active_context(Some("c1"), "u1").await.unwrap(),
            engagement.issue_context()
        );
    }

    #[test]
    fn normalize_context_reduces_to_course_form() {
        assert_eq!(normalize_context(""), "");
        assert_eq!(normalize_context("course::c1::abc"), "course=c1");
        assert_eq!(normalize_context("garbage"), "");
    }

    // ==================== Gradebook Tests ====================

    #[tokio::test]
    async fn ungraded_item_fails_the_course_but_graded_one_contributes() {
        let store = Arc::new(MemoryStore::new());
        seed_course(&store, &[("a", 30), ("b", 70)], 0).await;
        let svc = CourseService::new(store.clone(), config());
        let now = Utc::now();

        let engagement = svc.start_engagement("c1", "u1", now).await.unwrap();
        let context = engagement.issue_context();
        seed_confirmed_grade(&store, "b", "u1", &context, 80.0, true).await;

        let gradebook = svc.grade_course("c1", "u1", None, now).await.unwrap();

        // Only the graded item contributes: 80 * 70 / 100.
        assert!((gradebook.score - 56.0).abs() < 1e-9);
        assert!(!gradebook.passed);
        assert_eq!(gradebook.details["a"], None);
        assert!(gradebook.details["b"].is_some());
    }

    #[tokio::test]
    async fn unconfirmed_grades_count_as_missing() {
        let store = Arc::new(MemoryStore::new());
        seed_course(&store, &[("a", 100)], 0).await;
        let svc = CourseService::new(store.clone(), config());
        let now = Utc::now();

        let engagement = svc.start_engagement("c1", "u1", now).await.unwrap();
        seed_confirmed_grade(&store, "a", "u1", &engagement.issue_context(), 90.0, false).await;

        let gradebook = svc.grade_course("c1", "u1", None, now).await.unwrap();
        assert_eq!(gradebook.details["a"], None);
        assert_eq!(gradebook.score, 0.0);
        assert!(!gradebook.passed);
    }

    #[tokio::test]
    async fn all_criteria_passing_passes_the_course() {
        let store = Arc::new(MemoryStore::new());
        seed_course(&store, &[("a", 50), ("b", 50)], 0).await;
        let svc = CourseService::new(store.clone(), config());
        let now = Utc::now();

        let engagement = svc.start_engagement("c1", "u1", now).await.unwrap();
        let context = engagement.issue_context();
        seed_confirmed_grade(&store, "a", "u1", &context, 70.0, true).await;
        seed_confirmed_grade(&store, "b", "u1", &context, 90.0, true).await;

        let gradebook = svc.grade_course("c1", "u1", None, now).await.unwrap();
        assert!((gradebook.score - 80.0).abs() < 1e-9);
        assert!(gradebook.passed);
    }

    #[tokio::test]
    async fn completion_rate_counts_only_fully_passed_lessons() {
        let store = Arc::new(MemoryStore::new());
        seed_course(&store, &[("a", 100)], 50).await;
        for (id, media) in [(1u64, vec!["m1", "m2"]), (2, vec!["m3"]), (3, vec![])] {
            store
                .put_lesson(Lesson {
                    id,
                    course_id: "c1".to_string(),
                    title: format!("Lesson {id}"),
                    ordering: id as u32,
                    start_offset_days: 0,
                    end_offset_days: None,
                    media_ids: media.iter().map(|m| m.to_string()).collect(),
                })
                .await;
        }

        let svc = CourseService::new(store.clone(), config());
        let now = Utc::now();
        let engagement = svc.start_engagement("c1", "u1", now).await.unwrap();
        let context = engagement.issue_context();

        for (media, passed) in [("m1", true), ("m2", false), ("m3", true)] {
            store
                .put_watch(WatchRecord {
                    media_id: media.to_string(),
                    user_id: "u1".to_string(),
                    context: context.clone(),
                    rate: 100.0,
                    passed,
                })
                .await
                .unwrap();
        }

        let gradebook = svc.grade_course("c1", "u1", None, now).await.unwrap();
        // Lesson 2 is the only one whose every media item is passed; lesson
        // 3 has no media and can never pass.
        assert!((gradebook.completion_rate - 100.0 / 3.0).abs() < 1e-9);
        assert!(!gradebook.passed);
    }

    #[tokio::test]
    async fn recompute_preserves_confirmation() {
        let store = Arc::new(MemoryStore::new());
        seed_course(&store, &[("a", 100)], 0).await;
        let svc = CourseService::new(store.clone(), config());
        let now = Utc::now();

        let engagement = svc.start_engagement("c1", "u1", now).await.unwrap();
        seed_confirmed_grade(&store, "a", "u1", &engagement.issue_context(), 90.0, true).await;

        svc.grade_course("c1", "u1", None, now).await.unwrap();
        let confirmed = svc
            .confirm_gradebook("c1", "u1", "grader1", now)
            .await
            .unwrap();
        assert!(confirmed.confirmed_at.is_some());

        let recomputed = svc.grade_course("c1", "u1", None, now).await.unwrap();
        assert_eq!(recomputed.confirmed_at, confirmed.confirmed_at);
    }

    // ==================== Certificate Tests ====================

    struct StubIssuer;

    #[async_trait]
    impl CertificateIssuer for StubIssuer {
        async fn issue(&self, request: CertificateRequest) -> Result<CertificateAward, CoreError> {
            Ok(CertificateAward {
                award_id: format!("award-{}", request.certificate_id),
                certificate_id: request.certificate_id,
                issued_at: request.confirmed_at,
            })
        }
    }

    #[tokio::test]
    async fn certificate_requires_confirmed_passing_gradebook() {
        let store = Arc::new(MemoryStore::new());
        seed_course(&store, &[("a", 100)], 0).await;
        let svc = CourseService::new(store.clone(), config());
        let now = Utc::now();

        let engagement = svc.start_engagement("c1", "u1", now).await.unwrap();
        seed_confirmed_grade(&store, "a", "u1", &engagement.issue_context(), 90.0, true).await;

        // Unknown certificate id.
        let result = svc
            .request_certificate("c1", "u1", "other", &StubIssuer)
            .await;
        assert!(matches!(
            result,
            Err(CoreError::Course(CourseError::CertificateNotInCourse))
        ));

        // No gradebook yet.
        let result = svc
            .request_certificate("c1", "u1", "cert1", &StubIssuer)
            .await;
        assert!(matches!(
            result,
            Err(CoreError::Course(CourseError::NotQualified))
        ));

        // Graded but unconfirmed.
        svc.grade_course("c1", "u1", None, now).await.unwrap();
        let result = svc
            .request_certificate("c1", "u1", "cert1", &StubIssuer)
            .await;
        assert!(matches!(
            result,
            Err(CoreError::Course(CourseError::NotQualified))
        ));

        // Confirmed and passed: issued.
        svc.confirm_gradebook("c1", "u1", "grader1", now).await.unwrap();
        let award = svc
            .request_certificate("c1", "u1", "cert1", &StubIssuer)
            .await
            .unwrap();
        assert_eq!(award.certificate_id, "cert1");
    }
}
