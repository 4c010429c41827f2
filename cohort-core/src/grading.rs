//! Per-item grade aggregation
//!
//! A grade is always recomputed from current source data, so re-invoking the
//! aggregator after any input change is safe and produces the same result
//! for unchanged inputs. Subjective components stay `None` until a grader
//! supplies points; `None` is excluded from the earned sum.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use cohort_models::ItemKind;

use crate::error::{CoreError, GradingError};
use crate::record::{
    AssessableItem, Attempt, EarnedDetails, Grade, Post, Question, Solution, Submission,
};
use crate::store::{Store, StoreError};

/// Compute (or recompute) the grade of one attempt from its sources.
///
/// `existing` carries forward previously supplied subjective points;
/// `overrides` merges grader-supplied points on top.
pub fn compute_grade(
    item: &AssessableItem,
    attempt: &Attempt,
    questions: &[Question],
    solutions: &HashMap<u64, Solution>,
    submission: Option<&Submission>,
    posts: &[Post],
    existing: Option<&Grade>,
    overrides: Option<&EarnedDetails>,
    grader_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Grade, GradingError> {
    if questions.is_empty() {
        return Err(GradingError::NoQuestion);
    }

    let mut earned_details: EarnedDetails = existing
        .map(|g| g.earned_details.clone())
        .unwrap_or_default();

    let possible_point = match item.kind {
        ItemKind::Exam => {
            grade_exam_answers(questions, solutions, submission, &mut earned_details);
            questions.iter().map(|q| q.point).sum()
        }
        ItemKind::Assignment => {
            let mut possible = 0;
            for criterion in questions.iter().flat_map(|q| &q.rubric) {
                possible += criterion.max_point;
                earned_details.entry(criterion.name.clone()).or_insert(None);
            }
            possible
        }
        ItemKind::Discussion => grade_discussion_posts(
            &attempt.learner_id,
            questions,
            posts,
            &mut earned_details,
        ),
    };

    if let Some(overrides) = overrides {
        for (component, value) in overrides {
            earned_details.insert(component.clone(), *value);
        }
        if item.kind == ItemKind::Discussion {
            cap_discussion_details(questions, &mut earned_details);
        }
    }

    let earned_point: i64 = earned_details.values().filter_map(|v| *v).sum();
    let earned_point = earned_point.max(0) as u32;

    let score = if possible_point > 0 {
        f64::from(earned_point) * 100.0 / f64::from(possible_point)
    } else {
        0.0
    };

    Ok(Grade {
        attempt_id: attempt.id,
        earned_details,
        possible_point,
        earned_point,
        score,
        passed: score >= f64::from(item.passing_point),
        grader_id: grader_id
            .map(str::to_string)
            .or_else(|| existing.and_then(|g| g.grader_id.clone())),
        completed_at: existing.and_then(|g| g.completed_at),
        confirmed_at: existing.and_then(|g| g.confirmed_at),
        created_at: existing.map(|g| g.created_at).unwrap_or(now),
    })
}

/// Exam answers: objective formats match exactly against the accepted
/// answers, then numerically, so "3" and "3.0" are equivalent. Questions
/// with no accepted answers stay `None` until a grader scores them.
fn grade_exam_answers(
    questions: &[Question],
    solutions: &HashMap<u64, Solution>,
    submission: Option<&Submission>,
    earned_details: &mut EarnedDetails,
) {
    let points: HashMap<String, u32> = questions
        .iter()
        .map(|q| (q.id.to_string(), q.point))
        .collect();
    let accepted: HashMap<String, Vec<String>> = questions
        .iter()
        .filter_map(|q| {
            solutions
                .get(&q.id)
                .filter(|s| !s.correct_answers.is_empty())
                .map(|s| (q.id.to_string(), s.correct_answers.clone()))
        })
        .collect();

    let Some(submission) = submission else {
        return;
    };

    for (question_id, answer) in &submission.answers {
        match accepted.get(question_id) {
            Some(correct) => {
                let point = points.get(question_id).copied().unwrap_or(0);
                let earned = if answer_matches(answer, correct) {
                    i64::from(point)
                } else {
                    0
                };
                earned_details.insert(question_id.clone(), Some(earned));
            }
            None => {
                earned_details.entry(question_id.clone()).or_insert(None);
            }
        }
    }
}

fn answer_matches(answer: &str, accepted: &[String]) -> bool {
    if accepted.iter().any(|c| c == answer) {
        return true;
    }
    let Ok(value) = answer.trim().parse::<f64>() else {
        return false;
    };
    accepted
        .iter()
        .any(|c| c.trim().parse::<f64>().map(|v| v == value).unwrap_or(false))
}

/// Discussion points: valid posts and replies counted from the stored
/// posts, capped at the question's point requirements; the tutor assessment
/// keeps whatever was supplied so far (capped too). Returns the possible
/// point total.
fn grade_discussion_posts(
    learner_id: &str,
    questions: &[Question],
    posts: &[Post],
    earned_details: &mut EarnedDetails,
) -> u32 {
    let Some(req) = questions.iter().find_map(|q| q.requirements.as_ref()) else {
        return 0;
    };

    let valid_posts = posts
        .iter()
        .filter(|p| p.parent_id.is_none() && p.body.chars().count() >= req.post_min_characters)
        .count() as i64;
    let valid_replies = posts
        .iter()
        .filter(|p| {
            p.parent_id.is_some()
                && p.body.chars().count() >= req.reply_min_characters
                && p.parent_author_id.as_deref() != Some(learner_id)
        })
        .count() as i64;

    let tutor = earned_details
        .get("tutor_assessment")
        .copied()
        .flatten()
        .unwrap_or(0);

    earned_details.insert(
        "post".to_string(),
        Some(valid_posts.min(i64::from(req.post_point))),
    );
    earned_details.insert(
        "reply".to_string(),
        Some(valid_replies.min(i64::from(req.reply_point))),
    );
    earned_details.insert(
        "tutor_assessment".to_string(),
        Some(tutor.min(i64::from(req.tutor_assessment_point))),
    );

    req.total()
}

fn cap_discussion_details(questions: &[Question], earned_details: &mut EarnedDetails) {
    let Some(req) = questions.iter().find_map(|q| q.requirements.as_ref()) else {
        return;
    };
    for (component, cap) in [
        ("post", req.post_point),
        ("reply", req.reply_point),
        ("tutor_assessment", req.tutor_assessment_point),
    ] {
        if let Some(Some(value)) = earned_details.get_mut(component).map(|v| v.as_mut()) {
            *value = (*value).min(i64::from(cap));
        }
    }
}

/// Recompute and persist the grade of an attempt from current store state.
pub async fn grade_attempt(
    store: &dyn Store,
    item: &AssessableItem,
    attempt: &Attempt,
    overrides: Option<&EarnedDetails>,
    grader_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Grade, CoreError> {
    let questions = store.questions(&attempt.question_ids).await?;
    let solutions = store.solutions(&attempt.question_ids).await?;
    let submission = store.submission(attempt.id).await?;
    let posts = if item.kind == ItemKind::Discussion {
        store.posts(attempt.id).await?
    } else {
        Vec::new()
    };
    let existing = store.grade(attempt.id).await?;

    let grade = compute_grade(
        item,
        attempt,
        &questions,
        &solutions,
        submission.as_ref(),
        &posts,
        existing.as_ref(),
        overrides,
        grader_id,
        now,
    )?;
    store.upsert_grade(grade.clone()).await?;
    Ok(grade)
}

/// Grader finalization: merge supplied points, regrade, and mark the grade
/// completed. The completion timestamp is written once and never moves on
/// later regrades.
pub async fn complete(
    store: &dyn Store,
    item_id: &str,
    learner_id: &str,
    context: &str,
    overrides: EarnedDetails,
    grader_id: &str,
    now: DateTime<Utc>,
) -> Result<Grade, CoreError> {
    let item = store.item(item_id).await?;
    let attempt = store
        .active_attempt(item_id, learner_id, context)
        .await?
        .ok_or_else(|| StoreError::not_found("attempt", format!("{item_id}/{learner_id}")))?;

    let mut grade =
        grade_attempt(store, &item, &attempt, Some(&overrides), Some(grader_id), now).await?;
    if grade.completed_at.is_none() {
        grade.completed_at = Some(now);
        store.upsert_grade(grade.clone()).await?;
    }
    Ok(grade)
}

/// Grader confirmation. A grade can only be confirmed once completed.
pub async fn confirm(
    store: &dyn Store,
    item_id: &str,
    learner_id: &str,
    context: &str,
    grader_id: &str,
    now: DateTime<Utc>,
) -> Result<Grade, CoreError> {
    let attempt = store
        .active_attempt(item_id, learner_id, context)
        .await?
        .ok_or_else(|| StoreError::not_found("attempt", format!("{item_id}/{learner_id}")))?;
    let mut grade = store
        .grade(attempt.id)
        .await?
        .ok_or_else(|| StoreError::not_found("grade", attempt.id.to_string()))?;

    if grade.completed_at.is_none() {
        return Err(GradingError::NotCompleted.into());
    }
    if grade.confirmed_at.is_none() {
        grade.confirmed_at = Some(now);
        grade.grader_id = Some(grader_id.to_string());
        store.upsert_grade(grade.clone()).await?;
    }
    Ok(grade)
}
