//! Recursive walk over a document source.
//!
//! # Design
//!
//! - Depth-first descent from the configured root, one backend call at a time
//! - Leaves are filtered by extension and ignore-file list, containers by the
//!   ignore-path list
//! - Every subtree returns its own [`TraversalReport`]; a failing subtree
//!   contributes a [`SubtreeFailure`] instead of aborting its siblings
//! - The merged result is re-sorted oldest change first, so merge order
//!   never matters

use super::email::EmailAddress;
use super::error::SourceError;
use super::feedback::Feedback;
use super::metadata::parse_front_matter;
use super::policy::StalenessPolicy;
use super::source::DocumentSource;
use super::types::{AnalysisRecord, Node};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Strip leading and trailing slashes: `/docs/guide/` becomes `docs/guide`.
/// A lone `/` is kept as is.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.len() <= 1 {
        return trimmed.to_string();
    }
    let stripped = trimmed.trim_start_matches('/').trim_end_matches('/');
    if stripped.is_empty() {
        "/".to_string()
    } else {
        stripped.to_string()
    }
}

/// Normalize an extension to lowercase with a leading dot: `MD` becomes `.md`.
pub fn normalize_extension(extension: &str) -> String {
    let ext = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    format!(".{}", ext)
}

fn extension_of(identifier: &str) -> Option<String> {
    Path::new(identifier)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_extension)
}

/// Which nodes a traversal visits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalFilter {
    extensions: Vec<String>,
    ignore_paths: Vec<String>,
    ignore_files: Vec<String>,
}

impl TraversalFilter {
    pub fn new<E, P, F>(extensions: E, ignore_paths: P, ignore_files: F) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .filter(|e| !e.as_ref().trim().is_empty())
                .map(|e| normalize_extension(e.as_ref()))
                .collect(),
            ignore_paths: ignore_paths
                .into_iter()
                .map(|p| normalize_path(p.as_ref()))
                .collect(),
            ignore_files: ignore_files
                .into_iter()
                .map(|f| normalize_path(f.as_ref()))
                .collect(),
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn ignore_paths(&self) -> &[String] {
        &self.ignore_paths
    }

    pub fn ignore_files(&self) -> &[String] {
        &self.ignore_files
    }

    /// Whether a document node should be analyzed.
    pub fn accepts_document(&self, node: &Node, check_extension: bool) -> bool {
        if check_extension {
            match extension_of(&node.identifier) {
                Some(ext) if self.extensions.contains(&ext) => {}
                _ => return false,
            }
        }
        !self.ignore_files.contains(&normalize_path(&node.identifier))
    }

    /// Whether a container node should be descended into.
    pub fn descends_into(&self, node: &Node) -> bool {
        !self.ignore_paths.contains(&normalize_path(&node.identifier))
    }
}

/// A subtree or document that could not be read.
#[derive(Debug)]
pub struct SubtreeFailure {
    pub identifier: String,
    pub error: SourceError,
}

/// Records collected by a traversal, plus what could not be reached.
#[derive(Debug, Default)]
pub struct TraversalReport {
    pub records: Vec<AnalysisRecord>,
    pub failures: Vec<SubtreeFailure>,
}

impl TraversalReport {
    fn merge(&mut self, other: TraversalReport) {
        self.records.extend(other.records);
        self.failures.extend(other.failures);
    }

    pub fn stale_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_stale()).count()
    }
}

/// Sort oldest change first. Unknown history sorts before every known date
/// so those documents stay visible at the top of review lists. Stable, so
/// ties keep traversal order.
pub fn sort_by_last_change(records: &mut [AnalysisRecord]) {
    records.sort_by_key(|record| record.last_change);
}

/// Walks one source with one configuration.
pub struct Traverser<'a> {
    source: &'a dyn DocumentSource,
    filter: &'a TraversalFilter,
    policy: StalenessPolicy,
    now: DateTime<Utc>,
    feedback: &'a dyn Feedback,
}

impl<'a> Traverser<'a> {
    pub fn new(
        source: &'a dyn DocumentSource,
        filter: &'a TraversalFilter,
        policy: StalenessPolicy,
        now: DateTime<Utc>,
        feedback: &'a dyn Feedback,
    ) -> Self {
        Self {
            source,
            filter,
            policy,
            now,
            feedback,
        }
    }

    /// Analyze every matching document below `root`, oldest change first.
    pub fn traverse(&self, root: &str) -> TraversalReport {
        let root = normalize_path(root);
        let mut report = TraversalReport::default();

        match self.source.root_node(&root) {
            Ok(Some(node)) if node.kind.is_document() => {
                if self
                    .filter
                    .accepts_document(&node, self.source.uses_file_extensions())
                {
                    self.visit_document(&node, 0, &mut report);
                }
            }
            Ok(_) => {}
            Err(error) => {
                self.feedback.error(
                    0,
                    &format!("Unable to read root document {}: {}", root, error),
                );
                report.failures.push(SubtreeFailure {
                    identifier: root.clone(),
                    error,
                });
            }
        }

        report.merge(self.walk(&root, 0));
        sort_by_last_change(&mut report.records);
        report
    }

    fn walk(&self, identifier: &str, depth: usize) -> TraversalReport {
        let mut report = TraversalReport::default();

        let children = match self.source.list_children(identifier) {
            Ok(children) => children,
            Err(error) => {
                self.feedback.error(
                    depth + 1,
                    &format!("Received an error while processing {}: {}", identifier, error),
                );
                report.failures.push(SubtreeFailure {
                    identifier: identifier.to_string(),
                    error,
                });
                return report;
            }
        };

        for child in children {
            if child.kind.is_document()
                && self
                    .filter
                    .accepts_document(&child, self.source.uses_file_extensions())
            {
                self.visit_document(&child, depth, &mut report);
            }

            if child.kind.has_children() {
                if self.filter.descends_into(&child) {
                    report.merge(self.walk(&child.identifier, depth + 1));
                } else {
                    tracing::debug!(path = %child.identifier, "Skipping ignored path");
                }
            }
        }

        report
    }

    fn visit_document(&self, node: &Node, depth: usize, report: &mut TraversalReport) {
        match self.analyze_document(node, depth) {
            Ok(record) => report.records.push(record),
            Err(error) => {
                self.feedback.error(
                    depth + 1,
                    &format!("Unable to analyze {}: {}", node.identifier, error),
                );
                report.failures.push(SubtreeFailure {
                    identifier: node.identifier.clone(),
                    error,
                });
            }
        }
    }

    /// Build the record for one document.
    ///
    /// Without change history nothing is known about the document, so that
    /// failure skips it. Later failures leave a partial record.
    pub fn analyze_document(&self, node: &Node, depth: usize) -> Result<AnalysisRecord, SourceError> {
        let id = node.identifier.as_str();
        self.feedback.info(depth, &format!("Checking {}...", id));

        let history = self.source.get_change_history(id)?;
        let mut record = AnalysisRecord::new(id, history, &self.policy, self.now);
        let mut title = None;
        let mut raw_owner = None;

        match self.source.get_content(id) {
            Ok(content) => {
                record = record.with_link(content.content_link);
                if !content.bytes.is_empty() {
                    match parse_front_matter(&content.bytes) {
                        Ok(front_matter) => {
                            title = front_matter.title();
                            raw_owner = front_matter.owner();
                        }
                        Err(e) => self.feedback.warning(
                            depth + 1,
                            &format!("There was a problem reading the front matter for {}: {}", id, e),
                        ),
                    }
                }
            }
            Err(e) => self.feedback.warning(
                depth + 1,
                &format!("Unable to load content for {}: {}", id, e),
            ),
        }

        match self.source.get_display_metadata(id) {
            Ok(Some(display)) => title = Some(display),
            Ok(None) => {}
            Err(e) => self.feedback.warning(
                depth + 1,
                &format!("Unable to load the title of {}: {}", id, e),
            ),
        }
        if let Some(title) = title {
            record = record.with_display_name(title);
        }

        if let Some(raw) = raw_owner {
            match EmailAddress::parse(&raw) {
                Ok(owner) => record = record.with_owner(Some(owner)),
                Err(e) => self.feedback.warning(
                    depth + 1,
                    &format!("Found an owner but the email {} is not valid: {}", raw, e),
                ),
            }
        }

        self.report_details(&record, depth + 1);
        Ok(record)
    }

    fn report_details(&self, record: &AnalysisRecord, depth: usize) {
        let not_found = "Not found".to_string();
        self.feedback.info(
            depth,
            &format!(
                "Owner: {}",
                record.owner.as_ref().map(|o| o.to_string()).unwrap_or_else(|| not_found.clone())
            ),
        );
        self.feedback.info(
            depth,
            &format!(
                "Changed On: {}",
                record
                    .last_change
                    .map(|when| when.to_rfc3339())
                    .unwrap_or_else(|| not_found.clone())
            ),
        );
        self.feedback.info(
            depth,
            &format!("Is Stale: {}", if record.is_stale() { "Yes" } else { "No" }),
        );
        self.feedback.info(
            depth,
            &format!("Changed By: {}", record.changed_by().unwrap_or("Not found")),
        );
    }
}
