//! Decay - documentation staleness auditor
//!
//! Walks a documentation tree (a GitHub repository folder or a Confluence
//! page tree), classifies every document as stale or fresh against an age
//! threshold, and can notify owners, email an administrator report and mark
//! stale documents in the source.

pub mod audit;
pub mod backends;
pub mod cli;
pub mod notify;

pub use audit::{
    AnalysisRecord, ChangeSetTarget, DocumentSource, EmailAddress, Feedback, StalenessPolicy,
    TraversalFilter, TraversalReport, Traverser,
};
