//! Error types for cohort-core

use cohort_models::ErrorCode;
use thiserror::Error;

use crate::store::StoreError;

/// Top-level error type for cohort-core
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("Attempt error: {0}")]
    Attempt(#[from] AttemptError),

    #[error("Grading error: {0}")]
    Grading(#[from] GradingError),

    #[error("Course error: {0}")]
    Course(#[from] CourseError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CoreError {
    /// The stable machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Access(e) => e.code(),
            Self::Attempt(e) => e.code(),
            Self::Grading(e) => e.code(),
            Self::Course(e) => e.code(),
            Self::Store(e) => e.code(),
        }
    }
}

/// Errors from the access window resolver and verification gate
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("no access source for this learner/content pair")]
    Denied,

    #[error("content is not yet available")]
    NotAvailable,

    #[error("access window has ended; content is read-only")]
    ReadOnly,

    #[error("review period is over")]
    ReviewPeriodOver,

    #[error("a fresh verification is required before entry")]
    VerificationRequired,
}

impl AccessError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Denied => ErrorCode::AccessDenied,
            Self::NotAvailable => ErrorCode::ContentNotAvailable,
            Self::ReadOnly => ErrorCode::ContentReadOnly,
            Self::ReviewPeriodOver => ErrorCode::ReviewPeriodOver,
            Self::VerificationRequired => ErrorCode::OtpVerificationRequired,
        }
    }
}

/// Errors from attempt lifecycle operations
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("an active attempt already exists for this key")]
    AlreadyStarted,

    #[error("this attempt already has a submission")]
    AlreadySubmitted,

    #[error("max attempts ({max}) reached")]
    MaxAttemptsReached { max: u32 },

    #[error("the attempt deadline has passed")]
    Expired,

    #[error("no answers were provided")]
    NoAnswers,

    #[error("the answer is empty")]
    EmptyAnswer,

    #[error("expected at least {required} attachments, got {got}")]
    AttachmentTooFew { required: u32, got: u32 },

    #[error("expected at most {max} attachments, got {got}")]
    AttachmentTooMany { max: u32, got: u32 },

    #[error("attachment exceeds {max_bytes} bytes")]
    AttachmentTooLarge { max_bytes: u64 },

    #[error("the question pool has no questions")]
    PoolEmpty,

    #[error("this item kind does not support saving progress")]
    NotTimeBoxed,
}

impl AttemptError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyStarted => ErrorCode::AttemptAlreadyStarted,
            Self::AlreadySubmitted => ErrorCode::AttemptAlreadySubmitted,
            Self::MaxAttemptsReached { .. } => ErrorCode::MaxAttemptsReached,
            Self::Expired => ErrorCode::AttemptHasExpired,
            Self::NoAnswers => ErrorCode::NoAnswers,
            Self::EmptyAnswer => ErrorCode::EmptyAnswer,
            Self::AttachmentTooFew { .. } => ErrorCode::AttachmentTooFew,
            Self::AttachmentTooMany { .. } => ErrorCode::AttachmentTooMany,
            Self::AttachmentTooLarge { .. } => ErrorCode::AttachmentTooLarge,
            Self::PoolEmpty => ErrorCode::QuestionPoolEmpty,
            Self::NotTimeBoxed => ErrorCode::NotFound,
        }
    }
}

/// Errors from per-item grading
#[derive(Error, Debug)]
pub enum GradingError {
    #[error("the attempt has no questions to grade")]
    NoQuestion,

    #[error("a grade cannot be confirmed before it is completed")]
    NotCompleted,
}

impl GradingError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoQuestion => ErrorCode::NoQuestion,
            Self::NotCompleted => ErrorCode::GradeNotCompleted,
        }
    }
}

/// Errors from course engagement and gradebook aggregation
#[derive(Error, Debug)]
pub enum CourseError {
    #[error("an active engagement already exists for this course")]
    AlreadyEngaged,

    #[error("content does not belong to this course")]
    UnknownContent,

    #[error("an appeal already exists for this question")]
    AppealExists,

    #[error("the certificate does not belong to this course")]
    CertificateNotInCourse,

    #[error("the gradebook is not confirmed and passed")]
    NotQualified,
}

impl CourseError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyEngaged => ErrorCode::AlreadyExists,
            Self::UnknownContent => ErrorCode::UnknownCourseContent,
            Self::AppealExists => ErrorCode::AlreadyExists,
            Self::CertificateNotInCourse => ErrorCode::CertificateNotInCourse,
            Self::NotQualified => ErrorCode::NotQualifiedForCertificate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_errors_map_to_access_codes() {
        assert_eq!(AccessError::Denied.code(), ErrorCode::AccessDenied);
        assert_eq!(AccessError::ReadOnly.code(), ErrorCode::ContentReadOnly);
        assert_eq!(
            AccessError::VerificationRequired.code(),
            ErrorCode::OtpVerificationRequired
        );
    }

    #[test]
    fn attempt_conflicts_map_to_conflict_codes() {
        assert_eq!(
            AttemptError::AlreadyStarted.code(),
            ErrorCode::AttemptAlreadyStarted
        );
        assert_eq!(
            AttemptError::MaxAttemptsReached { max: 1 }.code(),
            ErrorCode::MaxAttemptsReached
        );
    }

    #[test]
    fn core_error_converts_from_parts() {
        let err: CoreError = AccessError::Denied.into();
        assert_eq!(err.code(), ErrorCode::AccessDenied);

        let err: CoreError = GradingError::NoQuestion.into();
        assert_eq!(err.code(), ErrorCode::NoQuestion);
    }

    #[test]
    fn display_includes_context() {
        let err = AttemptError::AttachmentTooFew {
            required: 2,
            got: 1,
        };
        assert!(err.to_string().contains("at least 2"));
    }
}
