//! Verification gate
//!
//! Items and courses can require a fresh proof of verification before a
//! learner may enter. The external OTP flow records the outcome; this module
//! only checks freshness and issues the short-lived token the client hands
//! to that flow.

use chrono::{DateTime, Duration, Utc};
use cohort_models::ContentKind;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::error::{AccessError, CoreError};
use crate::store::Store;

/// Claims inside a proof-of-verification token.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerificationClaims {
    pub sub: String,
    pub kind: ContentKind,
    pub consumer: String,
    pub exp: i64,
}

/// True iff the learner holds a successful verification for this consumer
/// that is still fresh.
pub async fn is_verified(
    store: &dyn Store,
    config: &CoreConfig,
    learner_id: &str,
    consumer_kind: ContentKind,
    consumer_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, CoreError> {
    let record = store
        .latest_verification(learner_id, consumer_kind, consumer_id)
        .await?;

    let cutoff = now - Duration::seconds(config.verification_expiry_secs);
    Ok(record
        .map(|r| r.success && r.created_at >= cutoff)
        .unwrap_or(false))
}

/// Fail with `OTP_VERIFICATION_REQUIRED` unless the learner is freshly
/// verified. Items that don't require verification always pass.
pub async fn require_verified(
    store: &dyn Store,
    config: &CoreConfig,
    required: bool,
    learner_id: &str,
    consumer_kind: ContentKind,
    consumer_id: &str,
    now: DateTime<Utc>,
) -> Result<(), CoreError> {
    if !required {
        return Ok(());
    }
    if is_verified(store, config, learner_id, consumer_kind, consumer_id, now).await? {
        return Ok(());
    }
    Err(AccessError::VerificationRequired.into())
}

/// Issue the token embedded in session views of verification-required
/// content the learner has not yet entered.
pub fn issue_token(
    config: &CoreConfig,
    learner_id: &str,
    consumer_kind: ContentKind,
    consumer_id: &str,
    now: DateTime<Utc>,
) -> Option<String> {
    let claims = VerificationClaims {
        sub: learner_id.to_string(),
        kind: consumer_kind,
        consumer: consumer_id.to_string(),
        exp: (now + Duration::seconds(config.verification_expiry_secs)).timestamp(),
    };

    let key = EncodingKey::from_secret(config.verification_token_secret.as_bytes());
    match encode(&Header::default(), &claims, &key) {
        Ok(token) => Some(token),
        Err(error) => {
            tracing::error!(%error, "failed to sign verification token");
            None
        }
    }
}
