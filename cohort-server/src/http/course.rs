//! Course-level handlers

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use chrono::Utc;
use cohort_core::access;
use cohort_core::{CertificateAward, CourseSession, Engagement, Gradebook};
use cohort_models::ContentKind;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::http::learner_id;

/// GET /api/course/{id}/session
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<CourseSession>, ApiError> {
    let learner = learner_id(&headers)?;
    let now = Utc::now();
    let window = access::resolve(
        state.store.as_ref(),
        &learner,
        ContentKind::Course,
        &id,
        None,
        now,
        false,
    )
    .await?;

    let session = state.courses.session(&id, &learner, window, now).await?;
    Ok(Json(session))
}

/// POST /api/course/{id}/engage
pub async fn engage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Engagement>, ApiError> {
    let learner = learner_id(&headers)?;
    let now = Utc::now();
    access::resolve(
        state.store.as_ref(),
        &learner,
        ContentKind::Course,
        &id,
        None,
        now,
        true,
    )
    .await?;

    let engagement = state.courses.start_engagement(&id, &learner, now).await?;
    Ok(Json(engagement))
}

/// POST /api/course/{id}/grade
///
/// On-demand gradebook recompute; idempotent, so learners may poll it.
pub async fn grade(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Gradebook>, ApiError> {
    let learner = learner_id(&headers)?;
    let gradebook = state
        .courses
        .grade_course(&id, &learner, None, Utc::now())
        .await?;
    Ok(Json(gradebook))
}

/// Body of a certificate request.
#[derive(Debug, Serialize, Deserialize)]
pub struct CertificateRequestBody {
    pub certificate_id: String,
}

/// POST /api/course/{id}/certificate/request
pub async fn request_certificate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CertificateRequestBody>,
) -> Result<Json<CertificateAward>, ApiError> {
    let learner = learner_id(&headers)?;
    let award = state
        .courses
        .request_certificate(
            &id,
            &learner,
            &body.certificate_id,
            state.certificate_issuer.as_ref(),
        )
        .await?;
    Ok(Json(award))
}
