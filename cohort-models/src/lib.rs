//! cohort-models: shared domain types for the cohort learning platform
//!
//! This crate holds the value types every other cohort crate speaks in:
//!
//! - **Ids** - [`tuid`] time-prefixed short ids for learning objects
//! - **Kinds** - [`ItemKind`] for assessable items, [`ContentKind`] for
//!   everything a learner can be enrolled in
//! - **Session steps** - [`SessionStep`], the derived lifecycle position of
//!   one attempt
//! - **Windows** - [`AccessWindow`] and the [`GradingDates`] derived from it
//! - **Error codes** - [`ErrorCode`], the stable machine-readable codes the
//!   HTTP surface returns

mod error;
mod id;
mod types;

pub use error::ErrorCode;
pub use id::{tuid, tuid_at};
pub use types::{
    AccessWindow, ContentKind, GradingDates, ItemKind, QuestionFormat, SessionStep, WindowPhase,
};
