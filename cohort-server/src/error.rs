//! API error mapping
//!
//! Every recoverable domain error becomes a 4xx response carrying its
//! stable machine-readable code; anything unanticipated is fatal to the
//! request only, logged, and returned as a bare 500.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cohort_core::CoreError;
use cohort_models::ErrorCode;
use serde::{Deserialize, Serialize};

/// Wire form of an error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// A request-scoped error with its HTTP mapping.
#[derive(Debug)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self.code {
            ErrorCode::AccessDenied
            | ErrorCode::ContentNotAvailable
            | ErrorCode::ContentReadOnly
            | ErrorCode::ReviewPeriodOver
            | ErrorCode::OtpVerificationRequired => StatusCode::FORBIDDEN,

            ErrorCode::NotFound => StatusCode::NOT_FOUND,

            ErrorCode::AttemptAlreadyStarted
            | ErrorCode::AttemptAlreadySubmitted
            | ErrorCode::AlreadyExists
            | ErrorCode::MaxAttemptsReached
            | ErrorCode::AttemptHasExpired
            | ErrorCode::GradeNotCompleted
            | ErrorCode::CertificateNotInCourse
            | ErrorCode::NotQualifiedForCertificate => StatusCode::CONFLICT,

            ErrorCode::NoAnswers
            | ErrorCode::EmptyAnswer
            | ErrorCode::AttachmentTooFew
            | ErrorCode::AttachmentTooMany
            | ErrorCode::AttachmentTooLarge
            | ErrorCode::NoQuestion
            | ErrorCode::QuestionPoolEmpty
            | ErrorCode::UnknownCourseContent => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(code = %self.code, message = %self.message, "request failed");
        (
            self.status(),
            Json(ErrorBody {
                code: self.code,
                message: self.message,
            }),
        )
            .into_response()
    }
}
