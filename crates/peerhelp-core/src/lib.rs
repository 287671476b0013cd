//! peerhelp-core: Forum state engine for AI-moderated peer tutoring.
//!
//! This crate holds the data model, the judge and store traits, and the
//! components that keep forum state consistent: the question lifecycle,
//! response evaluation, the escalation workflow, the karma ledger and the
//! analytics aggregations.

pub mod analytics;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod evaluator;
pub mod ledger;
pub mod lifecycle;
pub mod model;
pub mod store;
pub mod traits;

pub use engine::{Forum, ForumConfig};
pub use error::{ErrorKind, ForumError, JudgeError};
pub use evaluator::Submission;
pub use store::{MemoryStore, StateFile};
pub use traits::{Judge, JudgeRequest, Verdict, VerdictCategory};
