//! In-memory document tree implementing both source traits.
//!
//! Two flavors:
//! - file trees ([`InMemorySource::files`]): identifiers are paths, the parent
//!   is derived from the path, documents carry front matter and are marked
//!   with `out_of_date: true`
//! - page trees ([`InMemorySource::pages`]): identifiers are page ids, every
//!   page is a document, pages with children are parent documents, marking
//!   appends ` (Stale)` to the title

use decay::audit::{
    parse_front_matter, ChangeInfo, ChangeSet, ChangeSetTarget, DocumentContent, DocumentSource,
    FrontMatter, Node, NodeKind, Properties, PropertyDelta, SourceError, SourceResult, StaleMark,
    StoredDocument,
};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

/// Root identifier of file trees.
pub const ROOT: &str = "/";

/// One document to put in the tree.
#[derive(Debug, Clone, Default)]
pub struct Doc {
    pub history: Option<ChangeInfo>,
    pub fields: Mapping,
    pub body: String,
    /// Page title (page trees only).
    pub title: Option<String>,
    /// Replaces the generated content entirely when set.
    pub raw: Option<String>,
}

impl Doc {
    pub fn with_history(history: Option<ChangeInfo>) -> Self {
        Self {
            history,
            body: "# Notes\n".to_string(),
            ..Self::default()
        }
    }

    pub fn owner(self, owner: &str) -> Self {
        self.field("owner", Value::String(owner.to_string()))
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self.field("title", Value::String(title.to_string()))
    }

    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(Value::String(key.to_string()), value);
        self
    }

    /// Raw file content, e.g. broken front matter.
    pub fn raw(mut self, content: &str) -> Self {
        self.raw = Some(content.to_string());
        self
    }

    fn content(&self) -> String {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }
        FrontMatter {
            fields: self.fields.clone(),
            body: self.body.clone(),
            present: !self.fields.is_empty(),
        }
        .render()
        .unwrap_or_else(|_| self.body.clone())
    }
}

#[derive(Debug, Clone)]
struct Entry {
    kind: NodeKind,
    name: String,
    parent: String,
    history: Option<ChangeInfo>,
    content: String,
    title: Option<String>,
    revision: u64,
}

/// One edit applied through [`ChangeSetTarget::write_properties`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEdit {
    pub change_set: String,
    pub identifier: String,
    pub delta: PropertyDelta,
}

#[derive(Debug, Default)]
struct Failures {
    listing: HashSet<String>,
    history: HashSet<String>,
    content: HashSet<String>,
    read: HashSet<String>,
    write: HashSet<String>,
    create: bool,
    publish: bool,
}

#[derive(Debug, Default)]
struct MarkState {
    change_sets_created: usize,
    edits: Vec<RecordedEdit>,
    published: Vec<(String, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Files,
    Pages,
}

pub struct InMemorySource {
    name: String,
    flavor: Flavor,
    /// Insertion order is the listing order.
    order: Vec<String>,
    entries: Mutex<BTreeMap<String, Entry>>,
    failures: Failures,
    state: Mutex<MarkState>,
}

impl InMemorySource {
    /// A file tree rooted at [`ROOT`].
    pub fn files(name: &str) -> Self {
        Self::with_flavor(name, Flavor::Files)
    }

    /// A page tree; add the root page first with [`InMemorySource::page`].
    pub fn pages(name: &str) -> Self {
        Self::with_flavor(name, Flavor::Pages)
    }

    fn with_flavor(name: &str, flavor: Flavor) -> Self {
        Self {
            name: name.to_string(),
            flavor,
            order: Vec::new(),
            entries: Mutex::new(BTreeMap::new()),
            failures: Failures::default(),
            state: Mutex::new(MarkState::default()),
        }
    }

    fn insert(&mut self, identifier: &str, entry: Entry) {
        self.order.push(identifier.to_string());
        self.entries
            .get_mut()
            .expect("entries lock")
            .insert(identifier.to_string(), entry);
    }

    /// Add a directory. Parents are not created implicitly.
    pub fn dir(mut self, path: &str) -> Self {
        let entry = Entry {
            kind: NodeKind::Container,
            name: base_name(path).to_string(),
            parent: parent_of(path),
            history: None,
            content: String::new(),
            title: None,
            revision: 1,
        };
        self.insert(path, entry);
        self
    }

    /// Add a file.
    pub fn file(mut self, path: &str, doc: Doc) -> Self {
        let entry = Entry {
            kind: NodeKind::Leaf,
            name: base_name(path).to_string(),
            parent: parent_of(path),
            history: doc.history.clone(),
            content: doc.content(),
            title: None,
            revision: 1,
        };
        self.insert(path, entry);
        self
    }

    /// Add a page below `parent` (empty for the root page).
    pub fn page(mut self, parent: &str, id: &str, doc: Doc) -> Self {
        let title = doc.title.clone().unwrap_or_else(|| id.to_string());
        let entry = Entry {
            kind: NodeKind::Leaf,
            name: title.clone(),
            parent: parent.to_string(),
            history: doc.history.clone(),
            content: String::new(),
            title: Some(title),
            revision: 1,
        };
        self.insert(id, entry);
        self
    }

    pub fn fail_listing(mut self, identifier: &str) -> Self {
        self.failures.listing.insert(identifier.to_string());
        self
    }

    pub fn fail_history(mut self, identifier: &str) -> Self {
        self.failures.history.insert(identifier.to_string());
        self
    }

    pub fn fail_content(mut self, identifier: &str) -> Self {
        self.failures.content.insert(identifier.to_string());
        self
    }

    pub fn fail_read(mut self, identifier: &str) -> Self {
        self.failures.read.insert(identifier.to_string());
        self
    }

    pub fn fail_write(mut self, identifier: &str) -> Self {
        self.failures.write.insert(identifier.to_string());
        self
    }

    pub fn fail_create_change_set(mut self) -> Self {
        self.failures.create = true;
        self
    }

    pub fn fail_publish(mut self) -> Self {
        self.failures.publish = true;
        self
    }

    // === Inspection ===

    pub fn change_sets_created(&self) -> usize {
        self.state.lock().map(|s| s.change_sets_created).unwrap_or(0)
    }

    pub fn edits(&self) -> Vec<RecordedEdit> {
        self.state.lock().map(|s| s.edits.clone()).unwrap_or_default()
    }

    /// `(change-set name, edit count)` per publish call.
    pub fn published(&self) -> Vec<(String, usize)> {
        self.state.lock().map(|s| s.published.clone()).unwrap_or_default()
    }

    /// Current front matter of a file.
    pub fn front_matter(&self, identifier: &str) -> Option<FrontMatter> {
        let entries = self.entries.lock().ok()?;
        parse_front_matter(entries.get(identifier)?.content.as_bytes()).ok()
    }

    /// Current title of a page.
    pub fn title_of(&self, identifier: &str) -> Option<String> {
        self.entries.lock().ok()?.get(identifier)?.title.clone()
    }

    // === Internals ===

    fn entry(&self, identifier: &str) -> SourceResult<Entry> {
        self.entries
            .lock()
            .map_err(|_| SourceError::unexpected(identifier, "poisoned"))?
            .get(identifier)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(identifier.to_string()))
    }

    fn has_children(&self, identifier: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.values().any(|e| e.parent == identifier))
            .unwrap_or(false)
    }

    fn node(&self, identifier: &str, entry: &Entry) -> Node {
        let kind = match (self.flavor, entry.kind) {
            (Flavor::Pages, _) if self.has_children(identifier) => NodeKind::ParentDocument,
            (_, kind) => kind,
        };
        Node::new(kind, identifier, entry.name.clone())
    }

    fn link(identifier: &str) -> String {
        format!("memory://{}", identifier)
    }
}

impl DocumentSource for InMemorySource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn list_children(&self, identifier: &str) -> SourceResult<Vec<Node>> {
        if self.failures.listing.contains(identifier) {
            return Err(SourceError::unavailable(identifier, "listing failed"));
        }
        let entries = self
            .entries
            .lock()
            .map_err(|_| SourceError::unexpected(identifier, "poisoned"))?
            .clone();
        let children = self
            .order
            .iter()
            .filter_map(|id| entries.get(id).map(|entry| (id, entry)))
            .filter(|(_, entry)| entry.parent == identifier)
            .map(|(id, entry)| self.node(id, entry))
            .collect();
        Ok(children)
    }

    fn get_change_history(&self, identifier: &str) -> SourceResult<Option<ChangeInfo>> {
        if self.failures.history.contains(identifier) {
            return Err(SourceError::unavailable(identifier, "history failed"));
        }
        Ok(self.entry(identifier)?.history)
    }

    fn get_content(&self, identifier: &str) -> SourceResult<DocumentContent> {
        if self.failures.content.contains(identifier) {
            return Err(SourceError::unavailable(identifier, "content failed"));
        }
        let entry = self.entry(identifier)?;
        Ok(DocumentContent {
            bytes: entry.content.into_bytes(),
            content_link: Self::link(identifier),
        })
    }

    fn get_display_metadata(&self, identifier: &str) -> SourceResult<Option<String>> {
        match self.flavor {
            Flavor::Files => Ok(None),
            Flavor::Pages => Ok(self.entry(identifier)?.title),
        }
    }

    fn uses_file_extensions(&self) -> bool {
        self.flavor == Flavor::Files
    }

    fn root_node(&self, root: &str) -> SourceResult<Option<Node>> {
        match self.flavor {
            Flavor::Files => Ok(None),
            Flavor::Pages => {
                let entry = self.entry(root)?;
                Ok(Some(Node::new(NodeKind::ParentDocument, root, entry.name)))
            }
        }
    }
}

impl ChangeSetTarget for InMemorySource {
    fn stale_mark(&self) -> StaleMark {
        match self.flavor {
            Flavor::Files => StaleMark::out_of_date_flag(),
            Flavor::Pages => StaleMark::TitleSuffix(" (Stale)".to_string()),
        }
    }

    fn read_properties(&self, identifier: &str) -> SourceResult<StoredDocument> {
        if self.failures.read.contains(identifier) {
            return Err(SourceError::unavailable(identifier, "read failed"));
        }
        let entry = self.entry(identifier)?;
        let (properties, body) = match self.flavor {
            Flavor::Files => {
                let front_matter = parse_front_matter(entry.content.as_bytes())
                    .map_err(|e| SourceError::unexpected(identifier, e))?;
                (
                    Properties {
                        title: front_matter.title(),
                        fields: front_matter.fields,
                    },
                    front_matter.body,
                )
            }
            Flavor::Pages => (
                Properties {
                    title: entry.title.clone(),
                    fields: Mapping::new(),
                },
                String::new(),
            ),
        };
        Ok(StoredDocument {
            identifier: identifier.to_string(),
            properties,
            body,
            revision: entry.revision.to_string(),
        })
    }

    fn create_change_set(&self) -> SourceResult<ChangeSet> {
        if self.failures.create {
            return Err(SourceError::unavailable("change-set", "branch creation failed"));
        }
        let mut state = self
            .state
            .lock()
            .map_err(|_| SourceError::unexpected("change-set", "poisoned"))?;
        state.change_sets_created += 1;
        Ok(ChangeSet {
            name: format!("decay-marker-{}", state.change_sets_created),
            base_revision: "head".to_string(),
        })
    }

    fn write_properties(
        &self,
        change_set: &ChangeSet,
        stored: &StoredDocument,
        delta: &PropertyDelta,
    ) -> SourceResult<()> {
        let id = stored.identifier.as_str();
        if self.failures.write.contains(id) {
            return Err(SourceError::unavailable(id, "write failed"));
        }

        {
            let mut entries = self
                .entries
                .lock()
                .map_err(|_| SourceError::unexpected(id, "poisoned"))?;
            let entry = entries
                .get_mut(id)
                .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
            match self.flavor {
                Flavor::Files => {
                    let mut front_matter = FrontMatter {
                        fields: stored.properties.fields.clone(),
                        body: stored.body.clone(),
                        present: true,
                    };
                    for (key, value) in &delta.fields {
                        if let Some(key) = key.as_str() {
                            front_matter.set(key, value.clone());
                        }
                    }
                    entry.content = front_matter
                        .render()
                        .map_err(|e| SourceError::unexpected(id, e))?;
                }
                Flavor::Pages => {
                    if let Some(title) = &delta.title {
                        entry.title = Some(title.clone());
                        entry.name = title.clone();
                    }
                }
            }
            entry.revision += 1;
        }

        tracing::debug!(document = id, change_set = %change_set.name, "Recorded edit");
        self.state
            .lock()
            .map_err(|_| SourceError::unexpected(id, "poisoned"))?
            .edits
            .push(RecordedEdit {
                change_set: change_set.name.clone(),
                identifier: id.to_string(),
                delta: delta.clone(),
            });
        Ok(())
    }

    fn publish_change_set(&self, change_set: &ChangeSet, edits: usize) -> SourceResult<Option<String>> {
        if self.failures.publish {
            return Err(SourceError::unavailable(&change_set.name, "publish failed"));
        }
        self.state
            .lock()
            .map_err(|_| SourceError::unexpected(&change_set.name, "poisoned"))?
            .published
            .push((change_set.name.clone(), edits));
        Ok(match self.flavor {
            Flavor::Files => Some(format!("memory://review/{}", change_set.name)),
            Flavor::Pages => None,
        })
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(index) => path[..index].to_string(),
        None => ROOT.to_string(),
    }
}
