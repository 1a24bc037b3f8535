//! Core types for the audit pipeline
//!
//! A run walks a [`DocumentSource`](super::source::DocumentSource) and turns
//! every matching document into one [`AnalysisRecord`].

use super::email::EmailAddress;
use super::policy::StalenessPolicy;
use chrono::{DateTime, Utc};
use serde::Serialize;

// ============================================================================
// Source nodes
// ============================================================================

/// What a node in the source tree is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A file, or a wiki page without children.
    Leaf,
    /// A directory.
    Container,
    /// A wiki page that has children: analyzed as a document, then descended into.
    ParentDocument,
}

impl NodeKind {
    pub fn is_document(&self) -> bool {
        matches!(self, Self::Leaf | Self::ParentDocument)
    }

    pub fn has_children(&self) -> bool {
        matches!(self, Self::Container | Self::ParentDocument)
    }
}

/// One entry encountered during traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /// File path (relative to the repository root) or page id.
    pub identifier: String,
    /// Short name for feedback (file name or page title).
    pub name: String,
}

impl Node {
    pub fn new(kind: NodeKind, identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            name: name.into(),
        }
    }

    pub fn leaf(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let name = base_name(&identifier).to_string();
        Self::new(NodeKind::Leaf, identifier, name)
    }

    pub fn container(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let name = base_name(&identifier).to_string();
        Self::new(NodeKind::Container, identifier, name)
    }
}

fn base_name(identifier: &str) -> &str {
    identifier.rsplit('/').next().unwrap_or(identifier)
}

/// Most recent modification of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeInfo {
    pub when: DateTime<Utc>,
    pub actor_name: Option<String>,
    pub actor_email: Option<String>,
}

/// Current content of a leaf.
#[derive(Debug, Clone, Default)]
pub struct DocumentContent {
    pub bytes: Vec<u8>,
    /// URL for people to open the document.
    pub content_link: String,
}

// ============================================================================
// Analysis record
// ============================================================================

/// Everything learned about one document during a run.
///
/// `changed_recently` is derived from `last_change` and the policy when the
/// record is created and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRecord {
    pub identifier: String,
    pub display_name: String,
    pub link: String,
    pub last_change: Option<DateTime<Utc>>,
    changed_recently: bool,
    pub changed_by_name: Option<String>,
    pub changed_by_email: Option<String>,
    pub owner: Option<EmailAddress>,
}

impl AnalysisRecord {
    /// Start a record from the change history of `identifier`.
    pub fn new(
        identifier: impl Into<String>,
        history: Option<ChangeInfo>,
        policy: &StalenessPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        let identifier = identifier.into();
        let (last_change, changed_by_name, changed_by_email) = match history {
            Some(info) => (Some(info.when), info.actor_name, info.actor_email),
            None => (None, None, None),
        };
        Self {
            display_name: identifier.clone(),
            identifier,
            link: String::new(),
            last_change,
            changed_recently: policy.changed_recently(last_change, now),
            changed_by_name,
            changed_by_email,
            owner: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_owner(mut self, owner: Option<EmailAddress>) -> Self {
        self.owner = owner;
        self
    }

    pub fn changed_recently(&self) -> bool {
        self.changed_recently
    }

    pub fn is_stale(&self) -> bool {
        !self.changed_recently
    }

    /// Whole days since the last change, `None` when the history is unknown.
    pub fn age_in_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_change.map(|changed| (now - changed).num_days())
    }

    /// Who changed the document last, preferring the email address.
    pub fn changed_by(&self) -> Option<&str> {
        self.changed_by_email
            .as_deref()
            .or(self.changed_by_name.as_deref())
    }
}
