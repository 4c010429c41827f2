//! HTTP server module

mod api;
mod course;
mod session;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::Router;
use cohort_models::ErrorCode;
use tower_http::cors::CorsLayer;

use crate::AppState;
use crate::error::ApiError;

pub use api::{HealthResponse, TimestampResponse};
pub use course::CertificateRequestBody;

/// Create the HTTP router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(api::health))
        .route("/api/timestamp", get(api::timestamp))
        // course-level session
        .route("/api/course/:id/session", get(course::get_session))
        .route("/api/course/:id/engage", post(course::engage))
        .route("/api/course/:id/grade", post(course::grade))
        .route(
            "/api/course/:id/certificate/request",
            post(course::request_certificate),
        )
        // per-item session
        .route("/api/:kind/:id/session", get(session::get_session))
        .route("/api/:kind/:id/attempt", post(session::start_attempt))
        .route("/api/:kind/:id/attempt/save", post(session::save_progress))
        .route("/api/:kind/:id/attempt/submit", post(session::submit))
        .route(
            "/api/:kind/:id/attempt/deactivate",
            delete(session::deactivate),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The learner identity established by the fronting auth layer.
/// Authentication itself is out of scope; absence means no access.
pub(crate) fn learner_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-learner-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::new(ErrorCode::AccessDenied, "missing learner identity"))
}
