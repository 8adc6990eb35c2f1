//! Safety review for synthesized tool code.
//!
//! A candidate passes only when both the deterministic [`scanner`] and the
//! model-backed classifier accept it. [`reviewer::GatedReviewer`] combines the
//! two and fails closed.

#![warn(missing_docs, clippy::pedantic)]

pub mod reviewer;
pub mod scanner;
pub mod verdict;

mod source;

pub use reviewer::{
    ClassifierReviewer, GatedReviewer, ReviewError, ReviewResult, SafetyReviewer, StaticReviewer,
    parse_classification,
};
pub use scanner::{
    ALLOWED_IMPORTS, Finding, ForbiddenCapability, SourceAnalysis, analyze,
    extract_credential_names,
};
pub use verdict::{SafetyVerdict, VerdictKind};
