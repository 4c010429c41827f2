//! Service-level handlers

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the server
    pub status: String,
    /// Server version
    pub version: String,
    /// Seconds since server started
    pub uptime_seconds: i64,
}

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Server wall-clock response, for clients that render countdowns.
#[derive(Debug, Serialize, Deserialize)]
pub struct TimestampResponse {
    pub timestamp: f64,
}

/// Current server time as a Unix timestamp with sub-second precision.
pub async fn timestamp() -> Json<TimestampResponse> {
    Json(TimestampResponse {
        timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;

    use crate::http::create_router;

    #[tokio::test]
    async fn health_reports_version_and_uptime() {
        let state = Arc::new(AppState::default());
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server.get("/api/health").await;
        response.assert_status_ok();

        let body: HealthResponse = response.json();
        assert_eq!(body.status, "ok");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
        assert!(body.uptime_seconds >= 0);
    }

    #[tokio::test]
    async fn timestamp_is_close_to_now() {
        let state = Arc::new(AppState::default());
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server.get("/api/timestamp").await;
        response.assert_status_ok();

        let body: TimestampResponse = response.json();
        let now = Utc::now().timestamp_millis() as f64 / 1000.0;
        assert!((now - body.timestamp).abs() < 5.0);
    }
}
