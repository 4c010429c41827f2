//! cohort-core: the learning session engine
//!
//! This crate owns the hard parts of the cohort platform:
//!
//! - **Access windows** - [`access`] resolves and evaluates the
//!   [start, end, archive] window gating every session operation
//! - **Attempt lifecycle** - [`attempt::SessionService`] drives one
//!   parametrized state machine across exams, assignments, and discussions,
//!   with the one-active-attempt invariant enforced at storage insert time
//! - **Grading** - [`grading`] recomputes per-item grades from current
//!   sources; [`course`] and [`engagement::CourseService`] roll them up into
//!   the weighted course gradebook
//! - **Storage** - [`store::Store`] is the persistence seam;
//!   [`store::MemoryStore`] is the in-process implementation
//!
//! Operations take `now` explicitly, so deadline and window behavior is
//! fully deterministic under test.

pub mod access;
pub mod appeal;
pub mod attempt;
pub mod config;
pub mod content;
pub mod course;
pub mod engagement;
pub mod error;
pub mod grading;
pub mod record;
pub mod stats;
pub mod store;
pub mod verification;

// Re-export key types for convenience
pub use attempt::{LearningSession, PostCounts, SessionService, StartedAttempt, SubmitPayload};
pub use config::CoreConfig;
pub use course::{CriterionKind, GradingCriterion};
pub use engagement::{
    CertificateAward, CertificateIssuer, CertificateRequest, CourseService, CourseSession,
    LessonSchedule, normalize_context,
};
pub use error::{AccessError, AttemptError, CoreError, CourseError, GradingError};
pub use record::{
    Appeal, AssessableItem, Assessment, AttachmentMeta, Attempt, Course, CriterionResult,
    EarnedDetails, Engagement, Enrollment, Grade, Gradebook, GradingPolicy, Lesson, Post,
    PointRequirements, PublicAccessWindow, Question, QuestionPool, RubricCriterion, ScratchAnswer,
    Solution, Submission, VerificationRecord, WatchRecord,
};
pub use stats::ScoreStats;
pub use store::{MemoryStore, Store, StoreError};
