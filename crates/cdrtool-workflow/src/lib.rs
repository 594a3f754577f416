//! Envelope lifecycle orchestration over a [`Repository`](cdrtool_client::Repository).
//!
//! Every driver here is strictly sequential: one envelope is processed to
//! completion before the next begins. A failure for one envelope is logged,
//! recorded in the returned report, and the batch moves on.

pub mod clone;
pub mod delete;
pub mod feedback;
pub mod listing;
pub mod qa;

#[cfg(test)]
mod fake;

pub use clone::{CloneReport, CloneResult, CloneTarget, clone_envelopes};
pub use delete::{DeleteReport, delete_envelopes};
pub use feedback::{FeedbackErrorRow, FeedbackReport, collect_feedback_errors};
pub use listing::query_countries;
pub use qa::{QaDecision, QaOutcome, QaPolicy, QaReport, activate_qa, decide};

/// An envelope whose processing was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeFailure {
    pub url: String,
    pub reason: String,
}

impl EnvelopeFailure {
    pub(crate) fn new(url: &str, err: &impl std::fmt::Display) -> Self {
        Self {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
