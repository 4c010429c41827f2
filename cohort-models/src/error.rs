//! Stable machine-readable error codes
//!
//! Every recoverable domain error maps 1:1 to one of these codes; the HTTP
//! surface returns them verbatim so clients can branch without parsing
//! messages.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // access & authorization
    AccessDenied,
    ContentNotAvailable,
    ContentReadOnly,
    ReviewPeriodOver,
    OtpVerificationRequired,

    // lifecycle conflicts
    AttemptAlreadyStarted,
    AttemptAlreadySubmitted,
    MaxAttemptsReached,
    AttemptHasExpired,
    AlreadyExists,
    GradeNotCompleted,

    // validation
    NoAnswers,
    EmptyAnswer,
    AttachmentTooFew,
    AttachmentTooMany,
    AttachmentTooLarge,

    // aggregation preconditions
    NoQuestion,
    QuestionPoolEmpty,
    UnknownCourseContent,

    // certificates
    CertificateNotInCourse,
    NotQualifiedForCertificate,

    NotFound,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "ACCESS_DENIED",
            Self::ContentNotAvailable => "CONTENT_NOT_AVAILABLE",
            Self::ContentReadOnly => "CONTENT_READ_ONLY",
            Self::ReviewPeriodOver => "REVIEW_PERIOD_OVER",
            Self::OtpVerificationRequired => "OTP_VERIFICATION_REQUIRED",
            Self::AttemptAlreadyStarted => "ATTEMPT_ALREADY_STARTED",
            Self::AttemptAlreadySubmitted => "ATTEMPT_ALREADY_SUBMITTED",
            Self::MaxAttemptsReached => "MAX_ATTEMPTS_REACHED",
            Self::AttemptHasExpired => "ATTEMPT_HAS_EXPIRED",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::GradeNotCompleted => "GRADE_NOT_COMPLETED",
            Self::NoAnswers => "NO_ANSWERS",
            Self::EmptyAnswer => "EMPTY_ANSWER",
            Self::AttachmentTooFew => "ATTACHMENT_TOO_FEW",
            Self::AttachmentTooMany => "ATTACHMENT_TOO_MANY",
            Self::AttachmentTooLarge => "ATTACHMENT_TOO_LARGE",
            Self::NoQuestion => "NO_QUESTION",
            Self::QuestionPoolEmpty => "QUESTION_POOL_EMPTY",
            Self::UnknownCourseContent => "UNKNOWN_COURSE_CONTENT",
            Self::CertificateNotInCourse => "CERTIFICATE_NOT_IN_COURSE",
            Self::NotQualifiedForCertificate => "NOT_QUALIFIED_FOR_CERTIFICATE",
            Self::NotFound => "NOT_FOUND",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_matches_as_str() {
        for code in [
            ErrorCode::AccessDenied,
            ErrorCode::OtpVerificationRequired,
            ErrorCode::AttemptAlreadyStarted,
            ErrorCode::AttachmentTooLarge,
            ErrorCode::NotQualifiedForCertificate,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn deserializes_from_wire_form() {
        let code: ErrorCode = serde_json::from_str("\"MAX_ATTEMPTS_REACHED\"").unwrap();
        assert_eq!(code, ErrorCode::MaxAttemptsReached);
    }
}
