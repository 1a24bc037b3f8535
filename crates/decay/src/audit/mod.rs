//! Audit - traversal, classification and marking
//!
//! Walks a documentation source, builds one analysis record per document,
//! classifies it against the staleness policy, groups the results for
//! notification and optionally marks stale documents in place.

pub mod aggregate;
pub mod email;
pub mod error;
pub mod feedback;
pub mod marker;
pub mod metadata;
pub mod policy;
pub mod source;
pub mod traversal;
pub mod types;

pub use aggregate::{admin_summary, group_by_recipient, AdminSummary, NotificationPlan};
pub use email::{EmailAddress, InvalidEmail};
pub use error::{MarkingError, MetadataError, SourceError, SourceResult};
pub use feedback::{Feedback, FeedbackEntry, FeedbackLevel, RecordingFeedback, TracingFeedback};
pub use marker::{mark_stale_documents, MarkOutcome, Marker};
pub use metadata::{parse_front_matter, FrontMatter};
pub use policy::{is_stale, StalenessPolicy};
pub use source::{
    ChangeSet, ChangeSetTarget, DocumentSource, Properties, PropertyDelta, StaleMark,
    StoredDocument,
};
pub use traversal::{
    normalize_extension, normalize_path, sort_by_last_change, SubtreeFailure, TraversalFilter,
    TraversalReport, Traverser,
};
pub use types::{AnalysisRecord, ChangeInfo, DocumentContent, Node, NodeKind};
