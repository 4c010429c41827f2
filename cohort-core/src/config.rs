//! Core configuration

use serde::{Deserialize, Serialize};

/// Tunables shared by every core service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Seconds past a timed attempt's deadline during which a submit or
    /// save is still accepted.
    pub submission_grace_secs: i64,
    /// How long a successful verification stays fresh, in seconds.
    pub verification_expiry_secs: i64,
    /// HS256 secret for proof-of-verification tokens.
    pub verification_token_secret: String,
    /// Width of the score distribution buckets.
    pub score_bucket_size: u32,
    /// Upper bound on attachment size for assignment submissions, in bytes.
    pub attachment_max_bytes: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            submission_grace_secs: 30,
            verification_expiry_secs: 600,
            verification_token_secret: "insecure-dev-secret".to_string(),
            score_bucket_size: 5,
            attachment_max_bytes: 100 * 1024 * 1024,
        }
    }
}
