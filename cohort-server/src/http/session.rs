//! Per-item session handlers
//!
//! Every handler runs the same gate: learner identity, active context
//! (through the course engagement when `?course=` is given), then the
//! access window resolver with the operation's mutability.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use cohort_core::access;
use cohort_core::{LearningSession, ScratchAnswer, StartedAttempt, SubmitPayload, Submission};
use cohort_models::{AccessWindow, ErrorCode, ItemKind};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::http::learner_id;

/// Optional course scope carried on every item route.
#[derive(Debug, Default, Deserialize)]
pub struct CourseQuery {
    pub course: Option<String>,
}

struct RequestScope {
    learner: String,
    context: String,
    window: AccessWindow,
    now: DateTime<Utc>,
}

fn parse_kind(kind: &str) -> Result<ItemKind, ApiError> {
    ItemKind::parse(kind)
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, format!("unknown item kind: {kind}")))
}

async fn scope(
    state: &AppState,
    kind: ItemKind,
    item_id: &str,
    course: Option<&str>,
    headers: &HeaderMap,
    mutating: bool,
) -> Result<RequestScope, ApiError> {
    let learner = learner_id(headers)?;
    let now = Utc::now();
    let context = state.courses.active_context(course, &learner).await?;
    let window = access::resolve(
        state.store.as_ref(),
        &learner,
        kind.into(),
        item_id,
        course,
        now,
        mutating,
    )
    .await?;

    Ok(RequestScope {
        learner,
        context,
        window,
        now,
    })
}

/// GET /api/{kind}/{id}/session
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    Query(query): Query<CourseQuery>,
    headers: HeaderMap,
) -> Result<Json<LearningSession>, ApiError> {
    let kind = parse_kind(&kind)?;
    let scope = scope(&state, kind, &id, query.course.as_deref(), &headers, false).await?;

    let session = state
        .sessions
        .session(&id, &scope.learner, &scope.context, scope.window, scope.now)
        .await?;
    Ok(Json(session))
}

/// POST /api/{kind}/{id}/attempt
pub async fn start_attempt(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    Query(query): Query<CourseQuery>,
    headers: HeaderMap,
) -> Result<Json<StartedAttempt>, ApiError> {
    let kind = parse_kind(&kind)?;
    let scope = scope(&state, kind, &id, query.course.as_deref(), &headers, true).await?;

    let started = state
        .sessions
        .start_attempt(&id, &scope.learner, &scope.context, scope.now)
        .await?;
    Ok(Json(started))
}

/// POST /api/{kind}/{id}/attempt/save
pub async fn save_progress(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    Query(query): Query<CourseQuery>,
    headers: HeaderMap,
    Json(answers): Json<BTreeMap<String, String>>,
) -> Result<Json<ScratchAnswer>, ApiError> {
    let kind = parse_kind(&kind)?;
    let scope = scope(&state, kind, &id, query.course.as_deref(), &headers, true).await?;

    let scratch = state
        .sessions
        .save_progress(&id, &scope.learner, &scope.context, answers, scope.now)
        .await?;
    Ok(Json(scratch))
}

/// POST /api/{kind}/{id}/attempt/submit
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    Query(query): Query<CourseQuery>,
    headers: HeaderMap,
    Json(payload): Json<SubmitPayload>,
) -> Result<Json<Submission>, ApiError> {
    let kind = parse_kind(&kind)?;
    let scope = scope(&state, kind, &id, query.course.as_deref(), &headers, true).await?;

    let submission = state
        .sessions
        .submit(&id, &scope.learner, &scope.context, payload, scope.now)
        .await?;
    Ok(Json(submission))
}

/// DELETE /api/{kind}/{id}/attempt/deactivate
pub async fn deactivate(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    Query(query): Query<CourseQuery>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let kind = parse_kind(&kind)?;
    let scope = scope(&state, kind, &id, query.course.as_deref(), &headers, true).await?;

    state
        .sessions
        .deactivate(&id, &scope.learner, &scope.context)
        .await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
