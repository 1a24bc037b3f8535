//! In-place marking of stale documents.
//!
//! One pass per run, against one backend:
//!
//! ```text
//! NoChangeSetYet ──first required edit──▶ ChangeSetCreated ──▶ Done
//!        │                                                      ▲
//!        └────────────── no edit needed anywhere ───────────────┘
//! ```
//!
//! The change-set (branch) is only created once some document actually needs
//! an edit, and only published when at least one edit was made.

use super::error::MarkingError;
use super::feedback::Feedback;
use super::source::{ChangeSet, ChangeSetTarget};
use super::types::AnalysisRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
enum MarkerState {
    NoChangeSetYet,
    ChangeSetCreated(ChangeSet),
    Done,
}

/// Result of a marking pass.
#[derive(Debug, Default)]
pub struct MarkOutcome {
    /// Identifiers that were edited, in edit order.
    pub edited: Vec<String>,
    /// Stale documents that already carried the mark.
    pub already_marked: Vec<String>,
    /// Stale documents whose stored properties could not be read.
    pub unreadable: Vec<String>,
    pub change_set: Option<ChangeSet>,
    /// URL of the published change-set (pull request), if any.
    pub published: Option<String>,
    /// Set when marking stopped early.
    pub failure: Option<MarkingError>,
}

impl MarkOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Applies the backend's stale mark to every stale record.
pub struct Marker<'a> {
    target: &'a dyn ChangeSetTarget,
    feedback: &'a dyn Feedback,
    state: MarkerState,
}

impl<'a> Marker<'a> {
    pub fn new(target: &'a dyn ChangeSetTarget, feedback: &'a dyn Feedback) -> Self {
        Self {
            target,
            feedback,
            state: MarkerState::NoChangeSetYet,
        }
    }

    /// Mark every stale record. Failures stop the pass and are reported in
    /// [`MarkOutcome::failure`]; edits made before the failure stay in place.
    pub fn run(mut self, records: &[AnalysisRecord]) -> MarkOutcome {
        let mut outcome = MarkOutcome::default();
        let stale: Vec<&AnalysisRecord> = records.iter().filter(|r| r.is_stale()).collect();
        self.feedback.info(
            0,
            &format!("Checking {} stale documents for marking...", stale.len()),
        );

        for record in stale {
            if let Err(error) = self.mark_one(record, &mut outcome) {
                self.feedback.error(1, &format!("Marking stopped: {}", error));
                outcome.failure = Some(error);
                outcome.change_set = self.current_change_set();
                return outcome;
            }
        }

        outcome.change_set = self.current_change_set();
        if let Err(error) = self.finish(&mut outcome) {
            self.feedback.error(1, &format!("Marking stopped: {}", error));
            outcome.failure = Some(error);
        }
        outcome
    }

    fn current_change_set(&self) -> Option<ChangeSet> {
        match &self.state {
            MarkerState::ChangeSetCreated(change_set) => Some(change_set.clone()),
            _ => None,
        }
    }

    fn mark_one(&mut self, record: &AnalysisRecord, outcome: &mut MarkOutcome) -> Result<(), MarkingError> {
        let id = record.identifier.as_str();
        let stored = match self.target.read_properties(id) {
            Ok(stored) => stored,
            Err(e) => {
                self.feedback
                    .warning(1, &format!("Unable to read properties of {}: {}", id, e));
                outcome.unreadable.push(id.to_string());
                return Ok(());
            }
        };

        let delta = match self.target.stale_mark().delta(&stored.properties) {
            Some(delta) if !delta.is_empty() => delta,
            _ => {
                tracing::debug!(document = id, "Already marked");
                outcome.already_marked.push(id.to_string());
                return Ok(());
            }
        };

        let change_set = self.ensure_change_set()?;
        self.target
            .write_properties(&change_set, &stored, &delta)
            .map_err(|source| MarkingError::Write {
                identifier: id.to_string(),
                source,
            })?;

        self.feedback.success(
            1,
            &format!("Marked {} ({})", id, delta.keys().join(",")),
        );
        outcome.edited.push(id.to_string());
        Ok(())
    }

    /// The change-set for this pass, created on first use.
    fn ensure_change_set(&mut self) -> Result<ChangeSet, MarkingError> {
        if let MarkerState::ChangeSetCreated(change_set) = &self.state {
            return Ok(change_set.clone());
        }
        let change_set = self
            .target
            .create_change_set()
            .map_err(MarkingError::CreateChangeSet)?;
        self.feedback.info(
            1,
            &format!("Created change-set {} at {}", change_set.name, change_set.base_revision),
        );
        self.state = MarkerState::ChangeSetCreated(change_set.clone());
        Ok(change_set)
    }

    fn finish(&mut self, outcome: &mut MarkOutcome) -> Result<(), MarkingError> {
        let state = std::mem::replace(&mut self.state, MarkerState::Done);
        let change_set = match state {
            MarkerState::ChangeSetCreated(change_set) => change_set,
            MarkerState::NoChangeSetYet | MarkerState::Done => {
                self.feedback.info(1, "No documents needed marking");
                return Ok(());
            }
        };

        let published = self
            .target
            .publish_change_set(&change_set, outcome.edited.len())
            .map_err(|source| MarkingError::Publish {
                change_set: change_set.name.clone(),
                source,
            })?;

        match &published {
            Some(url) => self.feedback.success(
                1,
                &format!("Published {} edits for review: {}", outcome.edited.len(), url),
            ),
            None => self
                .feedback
                .success(1, &format!("Applied {} edits", outcome.edited.len())),
        }
        outcome.published = published;
        Ok(())
    }
}

/// Convenience wrapper around [`Marker::run`].
pub fn mark_stale_documents(
    records: &[AnalysisRecord],
    target: &dyn ChangeSetTarget,
    feedback: &dyn Feedback,
) -> MarkOutcome {
    Marker::new(target, feedback).run(records)
}
