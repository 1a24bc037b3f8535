//! Document source abstraction.
//!
//! The traversal engine only talks to [`DocumentSource`]; the marking engine
//! additionally needs [`ChangeSetTarget`]. Each backend implements both and is
//! chosen once, at configuration time.

use super::error::SourceResult;
use super::types::{ChangeInfo, DocumentContent, Node};
use serde_yaml::{Mapping, Value};

/// Read side of a documentation backend.
pub trait DocumentSource {
    /// Short description used in reports, e.g. `acme/handbook@main`.
    fn describe(&self) -> String;

    /// Immediate children of a container node, in backend order.
    fn list_children(&self, identifier: &str) -> SourceResult<Vec<Node>>;

    /// Most recent modification of a leaf. `None` when the backend has no
    /// revision for it.
    fn get_change_history(&self, identifier: &str) -> SourceResult<Option<ChangeInfo>>;

    /// Raw content plus a link for people to open the document.
    fn get_content(&self, identifier: &str) -> SourceResult<DocumentContent>;

    /// Title known to the backend itself (wiki page title). Sources whose
    /// titles live in front matter return `None`.
    fn get_display_metadata(&self, identifier: &str) -> SourceResult<Option<String>>;

    /// Whether the extension allow-list applies to this source's leaves.
    fn uses_file_extensions(&self) -> bool {
        true
    }

    /// The root itself when it is a document (wiki parent page).
    fn root_node(&self, _root: &str) -> SourceResult<Option<Node>> {
        Ok(None)
    }
}

/// How a backend flags a stale document.
#[derive(Debug, Clone, PartialEq)]
pub enum StaleMark {
    /// Set a front matter key, e.g. `out_of_date: true`.
    Flag { key: String, value: Value },
    /// Append a suffix to the document title, e.g. ` (Stale)`.
    TitleSuffix(String),
}

impl StaleMark {
    pub fn out_of_date_flag() -> Self {
        Self::Flag {
            key: "out_of_date".to_string(),
            value: Value::Bool(true),
        }
    }

    /// Minimal change needed for `current` to carry this mark, `None` when it
    /// already does.
    pub fn delta(&self, current: &Properties) -> Option<PropertyDelta> {
        match self {
            Self::Flag { key, value } => {
                if current.fields.get(key.as_str()) == Some(value) {
                    return None;
                }
                let mut fields = Mapping::new();
                fields.insert(Value::String(key.clone()), value.clone());
                Some(PropertyDelta { fields, title: None })
            }
            Self::TitleSuffix(suffix) => {
                let title = current.title.as_deref().unwrap_or_default();
                if title.ends_with(suffix.as_str()) {
                    return None;
                }
                Some(PropertyDelta {
                    fields: Mapping::new(),
                    title: Some(format!("{}{}", title, suffix)),
                })
            }
        }
    }
}

/// Stored, markable properties of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    pub title: Option<String>,
    pub fields: Mapping,
}

/// Properties as read from the backend, with the revision they were read at.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub identifier: String,
    pub properties: Properties,
    /// Document body without the properties (markdown after the front
    /// matter, or the page's storage markup). Written back unchanged.
    pub body: String,
    /// Blob sha or page version; passed back on write.
    pub revision: String,
}

/// Properties to change on one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyDelta {
    pub fields: Mapping,
    pub title: Option<String>,
}

impl PropertyDelta {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.title.is_none()
    }

    /// Names of the changed properties, for commit messages and feedback.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .fields
            .keys()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect();
        if self.title.is_some() {
            keys.push("title".to_string());
        }
        keys
    }
}

/// Handle to the batch of edits made during one marking pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// Branch name, or a label for sources that edit in place.
    pub name: String,
    /// Revision the change-set is anchored at.
    pub base_revision: String,
}

/// Write side of a documentation backend, used only by the marking engine.
pub trait ChangeSetTarget {
    fn stale_mark(&self) -> StaleMark;

    fn read_properties(&self, identifier: &str) -> SourceResult<StoredDocument>;

    /// Create the branch (or equivalent) that edits are applied against.
    fn create_change_set(&self) -> SourceResult<ChangeSet>;

    fn write_properties(
        &self,
        change_set: &ChangeSet,
        stored: &StoredDocument,
        delta: &PropertyDelta,
    ) -> SourceResult<()>;

    /// Publish the change-set as one reviewable unit. Returns its URL when
    /// the backend creates one.
    fn publish_change_set(&self, change_set: &ChangeSet, edits: usize) -> SourceResult<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_delta_only_when_different() {
        let mark = StaleMark::out_of_date_flag();
        let mut props = Properties::default();
        let delta = mark.delta(&props).unwrap();
        assert_eq!(delta.keys(), vec!["out_of_date".to_string()]);

        props
            .fields
            .insert(Value::String("out_of_date".into()), Value::Bool(false));
        assert!(mark.delta(&props).is_some());

        props
            .fields
            .insert(Value::String("out_of_date".into()), Value::Bool(true));
        assert!(mark.delta(&props).is_none());
    }

    #[test]
    fn title_suffix_is_not_doubled() {
        let mark = StaleMark::TitleSuffix(" (Stale)".into());
        let props = Properties {
            title: Some("Runbook".into()),
            fields: Mapping::new(),
        };
        let delta = mark.delta(&props).unwrap();
        assert_eq!(delta.title.as_deref(), Some("Runbook (Stale)"));
        assert_eq!(delta.keys(), vec!["title".to_string()]);

        let marked = Properties {
            title: Some("Runbook (Stale)".into()),
            fields: Mapping::new(),
        };
        assert!(mark.delta(&marked).is_none());
    }
}
