//! Attempt lifecycle
//!
//! One parametrized state machine covers every item kind; the kind only
//! supplies content selection, deadline policy, and submission validation.
//! The current state is never stored - [`SessionService::session`] derives
//! it from what exists: attempt, submission, grade timestamps.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use cohort_models::{AccessWindow, GradingDates, ItemKind, SessionStep};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::content;
use crate::error::{AttemptError, CoreError};
use crate::grading;
use crate::record::{
    Appeal, AssessableItem, AttachmentMeta, Attempt, Grade, Question, ScratchAnswer, Solution,
    Submission,
};
use crate::stats::{self, ScoreStats};
use crate::store::{Store, StoreError};
use crate::verification;

/// Result of a successful [`SessionService::start_attempt`].
#[derive(Debug, Clone, Serialize)]
pub struct StartedAttempt {
    pub attempt: Attempt,
    pub questions: Vec<Question>,
}

/// Submit request body; kinds read the fields they care about.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SubmitPayload {
    /// Exam answers keyed by question id.
    pub answers: BTreeMap<String, String>,
    /// Assignment answer body (may contain markup).
    pub answer: String,
    /// Assignment attachment metadata.
    pub attachments: Vec<AttachmentMeta>,
}

/// Post/reply counts for a discussion session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCounts {
    pub posts: usize,
    pub replies: usize,
    pub valid_posts: usize,
    pub valid_replies: usize,
}

/// The derived session view: everything a client needs to render where the
/// learner stands with one item.
#[derive(Debug, Clone, Serialize)]
pub struct LearningSession {
    pub access_window: AccessWindow,
    pub grading_dates: GradingDates,
    pub step: SessionStep,
    pub item: AssessableItem,
    pub attempt: Option<Attempt>,
    pub questions: Vec<Question>,
    pub scratch: Option<ScratchAnswer>,
    pub submission: Option<Submission>,
    pub grade: Option<Grade>,
    /// Keyed by question id; present from the reviewing step on.
    pub solutions: BTreeMap<String, Solution>,
    /// Keyed by question id; present from the reviewing step on.
    pub appeals: BTreeMap<String, Appeal>,
    pub post_counts: Option<PostCounts>,
    pub stats: Option<ScoreStats>,
    /// Present only before the first attempt of verification-required items.
    pub verification_token: Option<String>,
}

/// Attempt lifecycle operations for one item kind family.
///
/// Access gating happens at the call boundary (the resolver runs before any
/// of these); the service enforces lifecycle and deadline rules.
pub struct SessionService {
    store: Arc<dyn Store>,
    config: CoreConfig,
}

impl SessionService {
    pub fn new(store: Arc<dyn Store>, config: CoreConfig) -> Self {
        Self { store, config }
    }

    /// Start a new attempt: verification gate, content selection, and an
    /// insert-time uniqueness check so concurrent starts admit exactly one.
    pub async fn start_attempt(
        &self,
        item_id: &str,
        learner_id: &str,
        context: &str,
        now: DateTime<Utc>,
    ) -> Result<StartedAttempt, CoreError> {
        let item = self.store.item(item_id).await?;

        verification::require_verified(
            self.store.as_ref(),
            &self.config,
            item.verification_required,
            learner_id,
            item.kind.into(),
            item_id,
            now,
        )
        .await?;

        let pool_questions = self.store.pool_questions(&item.question_pool_id).await?;
        let question_ids = match item.kind {
            ItemKind::Exam => {
                let pool = self.store.pool(&item.question_pool_id).await?;
                content::compose_exam_set(&pool, &pool_questions)
            }
            ItemKind::Assignment | ItemKind::Discussion => {
                vec![content::draw_question(&pool_questions)?.id]
            }
        };

        let attempt = Attempt {
            id: Uuid::new_v4(),
            item_id: item_id.to_string(),
            learner_id: learner_id.to_string(),
            context: context.to_string(),
            // Biased one second forward so a read racing this insert never
            // sees a deadline already in the past.
            started_at: now + Duration::seconds(1),
            active: true,
            question_ids,
        };

        let attempt = match self.store.insert_attempt(attempt).await {
            Ok(attempt) => attempt,
            Err(StoreError::Conflict { .. }) => return Err(AttemptError::AlreadyStarted.into()),
            Err(other) => return Err(other.into()),
        };

        // A discussion accrues points as posts land, so its preliminary
        // grade exists from the start.
        if item.kind == ItemKind::Discussion {
            grading::grade_attempt(self.store.as_ref(), &item, &attempt, None, None, now).await?;
        }

        let questions = self.store.questions(&attempt.question_ids).await?;
        tracing::debug!(item_id, learner_id, attempt_id = %attempt.id, "attempt started");

        Ok(StartedAttempt { attempt, questions })
    }

    /// Merge partial answers into the scratch record. Time-boxed kinds only;
    /// never touches the submission.
    pub async fn save_progress(
        &self,
        item_id: &str,
        learner_id: &str,
        context: &str,
        answers: BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<ScratchAnswer, CoreError> {
        let item = self.store.item(item_id).await?;
        if !item.kind.has_deadline() {
            return Err(AttemptError::NotTimeBoxed.into());
        }
        if answers.is_empty() {
            return Err(AttemptError::NoAnswers.into());
        }

        let attempt = self.require_active_attempt(item_id, learner_id, context).await?;
        if self.store.submission(attempt.id).await?.is_some() {
            return Err(AttemptError::AlreadySubmitted.into());
        }
        self.check_deadline(&item, &attempt, now)?;

        Ok(self.store.merge_scratch(attempt.id, answers, now).await?)
    }

    /// Create the attempt's single submission and compute its preliminary
    /// grade. The deadline is re-checked here, at commit time, to close the
    /// window between a session read and a late submit.
    pub async fn submit(
        &self,
        item_id: &str,
        learner_id: &str,
        context: &str,
        payload: SubmitPayload,
        now: DateTime<Utc>,
    ) -> Result<Submission, CoreError> {
        let item = self.store.item(item_id).await?;
        let attempt = self.require_active_attempt(item_id, learner_id, context).await?;
        self.check_deadline(&item, &attempt, now)?;

        let questions = self.store.questions(&attempt.question_ids).await?;
        let submission = self
            .build_submission(&item, &attempt, &questions, payload, now)
            .await?;

        let submission = match self.store.insert_submission(submission).await {
            Ok(submission) => submission,
            Err(StoreError::Conflict { .. }) => return Err(AttemptError::AlreadySubmitted.into()),
            Err(other) => return Err(other.into()),
        };

        grading::grade_attempt(self.store.as_ref(), &item, &attempt, None, None, now).await?;
        tracing::debug!(item_id, learner_id, attempt_id = %attempt.id, "attempt submitted");

        Ok(submission)
    }

    /// Release the active attempt so a new one can be started, unless the
    /// attempt budget is already spent.
    pub async fn deactivate(
        &self,
        item_id: &str,
        learner_id: &str,
        context: &str,
    ) -> Result<(), CoreError> {
        let item = self.store.item(item_id).await?;
        let mut attempt = self.require_active_attempt(item_id, learner_id, context).await?;

        let total = self.store.attempt_count(item_id, learner_id, context).await?;
        if item.max_attempts != 0 && total >= item.max_attempts {
            return Err(AttemptError::MaxAttemptsReached {
                max: item.max_attempts,
            }
            .into());
        }

        attempt.active = false;
        self.store.update_attempt(attempt).await?;
        Ok(())
    }

    /// Assemble the derived session view. The caller has already resolved
    /// (and checked) the access window.
    pub async fn session(
        &self,
        item_id: &str,
        learner_id: &str,
        context: &str,
        window: AccessWindow,
        now: DateTime<Utc>,
    ) -> Result<LearningSession, CoreError> {
        let item = self.store.item(item_id).await?;
        let grading_dates = item.grading_dates(&window);

        let mut session = LearningSession {
            access_window: window,
            grading_dates,
            step: SessionStep::Ready,
            item: item.clone(),
            attempt: None,
            questions: vec![],
            scratch: None,
            submission: None,
            grade: None,
            solutions: BTreeMap::new(),
            appeals: BTreeMap::new(),
            post_counts: None,
            stats: None,
            verification_token: None,
        };

        let Some(attempt) = self
            .store
            .active_attempt(item_id, learner_id, context)
            .await?
        else {
            if item.verification_required {
                session.verification_token = verification::issue_token(
                    &self.config,
                    learner_id,
                    item.kind.into(),
                    item_id,
                    now,
                );
            }
            return Ok(session);
        };

        session.questions = self.store.questions(&attempt.question_ids).await?;
        session.scratch = self.store.scratch(attempt.id).await?;
        let submission = self.store.submission(attempt.id).await?;
        let grade = self.store.grade(attempt.id).await?;

        if item.kind == ItemKind::Discussion {
            session.post_counts = Some(self.post_counts(&attempt, &session.questions).await?);
        }

        session.step = match item.kind {
            ItemKind::Discussion => match &grade {
                Some(g) if g.completed_at.is_some() => match g.confirmed_at {
                    Some(_) => SessionStep::Final,
                    None => SessionStep::Reviewing,
                },
                _ => SessionStep::Sitting,
            },
            ItemKind::Exam | ItemKind::Assignment => match &submission {
                None => {
                    match item.deadline_for(attempt.started_at) {
                        Some(deadline) if now >= deadline => SessionStep::Timeout,
                        _ => SessionStep::Sitting,
                    }
                }
                Some(_) => match &grade {
                    Some(g) if g.completed_at.is_some() => match g.confirmed_at {
                        Some(_) => SessionStep::Final,
                        None => SessionStep::Reviewing,
                    },
                    _ => SessionStep::Grading,
                },
            },
        };

        session.attempt = Some(attempt.clone());
        session.submission = submission;
        session.grade = grade;

        if session.step >= SessionStep::Reviewing {
            let solutions = self.store.solutions(&attempt.question_ids).await?;
            session.solutions = solutions
                .into_iter()
                .map(|(id, solution)| (id.to_string(), solution))
                .collect();
            let appeals = self
                .store
                .appeals_for(learner_id, &attempt.question_ids)
                .await?;
            session.appeals = appeals
                .into_iter()
                .map(|appeal| (appeal.question_id.to_string(), appeal))
                .collect();
        }

        if session.step == SessionStep::Final {
            session.stats = Some(
                stats::score_stats(self.store.as_ref(), item_id, self.config.score_bucket_size)
                    .await?,
            );
        }

        Ok(session)
    }

    async fn require_active_attempt(
        &self,
        item_id: &str,
        learner_id: &str,
        context: &str,
    ) -> Result<Attempt, CoreError> {
        self.store
            .active_attempt(item_id, learner_id, context)
            .await?
            .ok_or_else(|| {
                StoreError::not_found("attempt", format!("{item_id}/{learner_id}/{context}")).into()
            })
    }

    fn check_deadline(
        &self,
        item: &AssessableItem,
        attempt: &Attempt,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        if let Some(deadline) = item.deadline_for(attempt.started_at) {
            let grace = Duration::seconds(self.config.submission_grace_secs);
            if now > deadline + grace {
                return Err(AttemptError::Expired.into());
            }
        }
        Ok(())
    }

    async fn build_submission(
        &self,
        item: &AssessableItem,
        attempt: &Attempt,
        questions: &[Question],
        payload: SubmitPayload,
        now: DateTime<Utc>,
    ) -> Result<Submission, CoreError> {
        let mut submission = Submission {
            attempt_id: attempt.id,
            answers: BTreeMap::new(),
            answer: String::new(),
            attachments: vec![],
            extracted_text: String::new(),
            created_at: now,
        };

        match item.kind {
            ItemKind::Exam => {
                if payload.answers.is_empty() {
                    return Err(AttemptError::NoAnswers.into());
                }
                submission.extracted_text = payload
                    .answers
                    .values()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" ");
                submission.answers = payload.answers;
            }
            ItemKind::Assignment => {
                let required = questions
                    .iter()
                    .map(|q| q.attachment_file_count)
                    .max()
                    .unwrap_or(0);
                validate_attachments(
                    required,
                    &payload.attachments,
                    self.config.attachment_max_bytes,
                )?;

                let text = strip_tags(&payload.answer);
                if text.is_empty() {
                    return Err(AttemptError::EmptyAnswer.into());
                }
                submission.extracted_text = text;
                submission.answer = payload.answer;
                submission.attachments = payload.attachments;
            }
            ItemKind::Discussion => {
                let posts = self.store.posts(attempt.id).await?;
                let min_chars = questions
                    .iter()
                    .find_map(|q| q.requirements.as_ref())
                    .map(|r| r.post_min_characters)
                    .unwrap_or(0);
                let has_valid_post = posts
                    .iter()
                    .any(|p| p.parent_id.is_none() && p.body.chars().count() >= min_chars);
                if !has_valid_post {
                    return Err(AttemptError::EmptyAnswer.into());
                }
                submission.extracted_text = posts
                    .iter()
                    .map(|p| p.body.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
            }
        }

        Ok(submission)
    }

    async fn post_counts(
        &self,
        attempt: &Attempt,
        questions: &[Question],
    ) -> Result<PostCounts, CoreError> {
        let posts = self.store.posts(attempt.id).await?;
        let Some(req) = questions.iter().find_map(|q| q.requirements.as_ref()) else {
            return Ok(PostCounts::default());
        };

        let mut counts = PostCounts::default();
        for post in &posts {
            match post.parent_id {
                None => {
                    counts.posts += 1;
                    if post.body.chars().count() >= req.post_min_characters {
                        counts.valid_posts += 1;
                    }
                }
                Some(_) => {
                    counts.replies += 1;
                    if post.body.chars().count() >= req.reply_min_characters
                        && post.parent_author_id.as_deref() != Some(attempt.learner_id.as_str())
                    {
                        counts.valid_replies += 1;
                    }
                }
            }
        }
        Ok(counts)
    }
}

fn validate_attachments(
    required: u32,
    attachments: &[AttachmentMeta],
    max_bytes: u64,
) -> Result<(), AttemptError> {
    if required == 0 {
        return Ok(());
    }
    let got = attachments.len() as u32;
    if got < required {
        return Err(AttemptError::AttachmentTooFew { required, got });
    }
    if got > required {
        return Err(AttemptError::AttachmentTooMany { max: required, got });
    }
    if attachments.iter().any(|a| a.size_bytes > max_bytes) {
        return Err(AttemptError::AttachmentTooLarge { max_bytes });
    }
    Ok(())
}

/// Strip markup and collapse whitespace to derive searchable text.
fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
