//! Shared application state for the cohort server

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cohort_core::{
    CertificateAward, CertificateIssuer, CertificateRequest, CoreConfig, CoreError, CourseService,
    MemoryStore, SessionService, Store,
};
use cohort_models::tuid;

/// Certificate issuer used when no external collaborator is wired in:
/// acknowledges the request with a receipt and leaves rendering to whoever
/// consumes the log.
pub struct ReceiptCertificateIssuer;

#[async_trait]
impl CertificateIssuer for ReceiptCertificateIssuer {
    async fn issue(&self, request: CertificateRequest) -> Result<CertificateAward, CoreError> {
        tracing::info!(
            certificate_id = %request.certificate_id,
            learner_id = %request.learner_id,
            course_id = %request.course_id,
            "certificate request forwarded"
        );
        Ok(CertificateAward {
            award_id: tuid(),
            certificate_id: request.certificate_id,
            issued_at: request.confirmed_at,
        })
    }
}

/// Shared application state accessible by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Backing store, exposed for seeding and tests
    pub store: Arc<MemoryStore>,
    /// Attempt lifecycle operations
    pub sessions: Arc<SessionService>,
    /// Course-level operations
    pub courses: Arc<CourseService>,
    /// External certificate collaborator
    pub certificate_issuer: Arc<dyn CertificateIssuer>,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create a new AppState with default components
    pub fn new(config: CoreConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let store_dyn: Arc<dyn Store> = store.clone();

        Self {
            sessions: Arc::new(SessionService::new(store_dyn.clone(), config.clone())),
            courses: Arc::new(CourseService::new(store_dyn, config)),
            certificate_issuer: Arc::new(ReceiptCertificateIssuer),
            store,
            started_at: Utc::now(),
        }
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(CoreConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_state_tracks_uptime() {
        let state = AppState::default();
        assert!(state.uptime_seconds() >= 0);
    }

    #[tokio::test]
    async fn receipt_issuer_returns_an_award() {
        let issuer = ReceiptCertificateIssuer;
        let award = issuer
            .issue(CertificateRequest {
                certificate_id: "cert1".to_string(),
                course_id: "c1".to_string(),
                course_title: "Course".to_string(),
                learner_id: "u1".to_string(),
                context: "course::c1::x".to_string(),
                engaged_at: Utc::now(),
                confirmed_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(award.certificate_id, "cert1");
        assert!(!award.award_id.is_empty());
    }
}
