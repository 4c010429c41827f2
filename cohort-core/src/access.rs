//! Access window resolution
//!
//! Computes the [start, end, archive] window gating every session operation
//! from enrollment and public-access sources, with an optional course-scoped
//! override. Pure with respect to time: `now` is always a parameter and
//! nothing here writes to the store.

use chrono::{DateTime, Duration, Utc};
use cohort_models::{AccessWindow, ContentKind, WindowPhase};

use crate::error::{AccessError, CoreError};
use crate::store::Store;

/// Resolve the access window for a learner/content pair.
///
/// With a `course_id`, enrollment is checked against the course and the
/// course's own schedule for the content overrides the merged window.
pub async fn resolve_window(
    store: &dyn Store,
    learner_id: &str,
    content_kind: ContentKind,
    content_id: &str,
    course_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<AccessWindow, CoreError> {
    let enrollment_key = match course_id {
        Some(course_id) => (ContentKind::Course, course_id),
        None => (content_kind, content_id),
    };

    let enrollment = store
        .active_enrollment(learner_id, enrollment_key.0, enrollment_key.1)
        .await?;

    let public_access = if content_kind == ContentKind::Media {
        store.public_access(content_id, now).await?
    } else {
        None
    };

    let merged = favorable_window(
        enrollment.as_ref().map(|e| e.window()),
        public_access.as_ref().map(|p| p.window()),
    )
    .ok_or(AccessError::Denied)?;

    match course_id {
        Some(course_id) => {
            course_effective_window(store, course_id, content_kind, content_id, merged).await
        }
        None => Ok(merged),
    }
}

/// Evaluate a resolved window against `now`. Read-only operations stay
/// permitted between end and archive; mutating ones do not.
pub fn check_access(
    window: &AccessWindow,
    now: DateTime<Utc>,
    mutating: bool,
) -> Result<(), AccessError> {
    match window.phase(now) {
        WindowPhase::NotYetAvailable => Err(AccessError::NotAvailable),
        WindowPhase::Archived => Err(AccessError::ReviewPeriodOver),
        WindowPhase::ReadOnly if mutating => Err(AccessError::ReadOnly),
        WindowPhase::ReadOnly | WindowPhase::Open => Ok(()),
    }
}

/// Resolve and evaluate in one step.
pub async fn resolve(
    store: &dyn Store,
    learner_id: &str,
    content_kind: ContentKind,
    content_id: &str,
    course_id: Option<&str>,
    now: DateTime<Utc>,
    mutating: bool,
) -> Result<AccessWindow, CoreError> {
    let window = resolve_window(store, learner_id, content_kind, content_id, course_id, now).await?;
    check_access(&window, now, mutating)?;
    Ok(window)
}

/// The more favorable merge of two windows: earliest start, latest end,
/// latest archive.
pub fn favorable_window(a: Option<AccessWindow>, b: Option<AccessWindow>) -> Option<AccessWindow> {
    match (a, b) {
        (Some(a), Some(b)) => Some(AccessWindow {
            start: a.start.min(b.start),
            end: a.end.max(b.end),
            archive: a.archive.max(b.archive),
        }),
        (one, other) => one.or(other),
    }
}

/// Override the merged window with the course's schedule for this content.
async fn course_effective_window(
    store: &dyn Store,
    course_id: &str,
    content_kind: ContentKind,
    content_id: &str,
    course_window: AccessWindow,
) -> Result<AccessWindow, CoreError> {
    let (start_offset, end_offset) = match content_kind {
        ContentKind::Exam | ContentKind::Assignment | ContentKind::Discussion => {
            let kind = match content_kind {
                ContentKind::Exam => cohort_models::ItemKind::Exam,
                ContentKind::Assignment => cohort_models::ItemKind::Assignment,
                _ => cohort_models::ItemKind::Discussion,
            };
            match store.assessment(course_id, kind, content_id).await? {
                Some(assessment) => (assessment.start_offset_days, assessment.end_offset_days),
                None => {
                    tracing::debug!(course_id, content_id, "content is not assessed in course");
                    return Err(AccessError::Denied.into());
                }
            }
        }
        ContentKind::Media => match store.lesson_for_media(course_id, content_id).await? {
            Some(lesson) => (lesson.start_offset_days, lesson.end_offset_days),
            None => {
                tracing::debug!(course_id, content_id, "media is not scheduled in course");
                return Err(AccessError::Denied.into());
            }
        },
        ContentKind::Course => return Ok(course_window),
    };

    let start = course_window.start + Duration::days(i64::from(start_offset));
    let end = match end_offset {
        Some(days) => start + Duration::days(i64::from(days)),
        None => course_window.end,
    };

    Ok(AccessWindow {
        start,
        end,
        archive: course_window.archive,
    })
}
