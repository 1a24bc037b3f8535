//! Marking stale documents through the change-set primitives.

use decay::audit::{
    mark_stale_documents, FeedbackLevel, MarkingError, RecordingFeedback, StalenessPolicy,
    TraversalFilter, Traverser,
};
use decay::AnalysisRecord;
use decay_test_utils::fixtures::{changed_days_ago, fixed_now};
use decay_test_utils::{Doc, InMemorySource, ROOT};
use serde_yaml::Value;

fn analyze(source: &InMemorySource, root: &str) -> Vec<AnalysisRecord> {
    let filter = TraversalFilter::new([".md"], Vec::<String>::new(), Vec::<String>::new());
    let feedback = RecordingFeedback::new();
    Traverser::new(source, &filter, StalenessPolicy::new(30), fixed_now(), &feedback)
        .traverse(root)
        .records
}

fn flagged(source: &InMemorySource, id: &str) -> bool {
    source
        .front_matter(id)
        .and_then(|fm| fm.get("out_of_date").cloned())
        == Some(Value::Bool(true))
}

#[test]
fn stale_files_are_flagged_on_one_change_set() {
    let source = InMemorySource::files("memory")
        .file("old.md", Doc::with_history(Some(changed_days_ago(90))).owner("o@x.com"))
        .file("older.md", Doc::with_history(Some(changed_days_ago(400))))
        .file("fresh.md", Doc::with_history(Some(changed_days_ago(3))));
    let records = analyze(&source, ROOT);
    let feedback = RecordingFeedback::new();

    let outcome = mark_stale_documents(&records, &source, &feedback);

    assert!(outcome.is_complete());
    assert_eq!(outcome.edited, vec!["older.md".to_string(), "old.md".to_string()]);
    assert_eq!(source.change_sets_created(), 1);
    let edits = source.edits();
    assert!(edits.iter().all(|e| e.change_set == "decay-marker-1"));
    assert_eq!(edits[0].delta.keys(), vec!["out_of_date".to_string()]);
    assert_eq!(source.published(), vec![("decay-marker-1".to_string(), 2)]);
    assert_eq!(outcome.published.as_deref(), Some("memory://review/decay-marker-1"));

    assert!(flagged(&source, "old.md"));
    assert!(flagged(&source, "older.md"));
    assert!(!flagged(&source, "fresh.md"));
    // Existing fields survive the edit.
    let front_matter = source.front_matter("old.md").unwrap();
    assert_eq!(front_matter.owner().as_deref(), Some("o@x.com"));
    assert_eq!(front_matter.body, "# Notes\n");
}

#[test]
fn already_marked_documents_create_no_change_set() {
    let source = InMemorySource::files("memory")
        .file(
            "a.md",
            Doc::with_history(Some(changed_days_ago(90))).field("out_of_date", Value::Bool(true)),
        )
        .file(
            "b.md",
            Doc::with_history(Some(changed_days_ago(120))).field("out_of_date", Value::Bool(true)),
        );
    let records = analyze(&source, ROOT);
    let feedback = RecordingFeedback::new();

    let outcome = mark_stale_documents(&records, &source, &feedback);

    assert!(outcome.is_complete());
    assert!(outcome.edited.is_empty());
    assert_eq!(outcome.already_marked.len(), 2);
    assert_eq!(source.change_sets_created(), 0);
    assert!(source.published().is_empty());
    assert!(outcome.change_set.is_none());
    assert!(feedback.contains(FeedbackLevel::Info, "No documents needed marking"));
}

#[test]
fn second_run_is_a_no_op() {
    let source = InMemorySource::files("memory")
        .file("a.md", Doc::with_history(Some(changed_days_ago(90))));
    let records = analyze(&source, ROOT);

    mark_stale_documents(&records, &source, &RecordingFeedback::new());
    let again = mark_stale_documents(&records, &source, &RecordingFeedback::new());

    assert!(again.edited.is_empty());
    assert_eq!(source.change_sets_created(), 1);
    assert_eq!(source.published().len(), 1);
}

#[test]
fn change_set_creation_failure_stops_marking() {
    let source = InMemorySource::files("memory")
        .file("a.md", Doc::with_history(Some(changed_days_ago(90))))
        .fail_create_change_set();
    let records = analyze(&source, ROOT);
    let feedback = RecordingFeedback::new();

    let outcome = mark_stale_documents(&records, &source, &feedback);

    assert!(matches!(outcome.failure, Some(MarkingError::CreateChangeSet(_))));
    assert!(source.edits().is_empty());
    assert!(source.published().is_empty());
    assert!(feedback.contains(FeedbackLevel::Error, "Marking stopped"));
}

#[test]
fn write_failure_keeps_earlier_edits_and_skips_publish() {
    let source = InMemorySource::files("memory")
        .file("first.md", Doc::with_history(Some(changed_days_ago(400))))
        .file("second.md", Doc::with_history(Some(changed_days_ago(300))))
        .file("third.md", Doc::with_history(Some(changed_days_ago(200))))
        .fail_write("second.md");
    let records = analyze(&source, ROOT);

    let outcome = mark_stale_documents(&records, &source, &RecordingFeedback::new());

    assert_eq!(outcome.edited, vec!["first.md".to_string()]);
    match &outcome.failure {
        Some(MarkingError::Write { identifier, .. }) => assert_eq!(identifier, "second.md"),
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(flagged(&source, "first.md"));
    assert!(!flagged(&source, "third.md"));
    assert!(source.published().is_empty());
    assert_eq!(outcome.change_set.map(|c| c.name).as_deref(), Some("decay-marker-1"));
}

#[test]
fn publish_failure_is_reported() {
    let source = InMemorySource::files("memory")
        .file("a.md", Doc::with_history(Some(changed_days_ago(90))))
        .fail_publish();
    let records = analyze(&source, ROOT);

    let outcome = mark_stale_documents(&records, &source, &RecordingFeedback::new());

    assert_eq!(outcome.edited.len(), 1);
    assert!(matches!(outcome.failure, Some(MarkingError::Publish { .. })));
}

#[test]
fn unreadable_document_is_skipped() {
    let source = InMemorySource::files("memory")
        .file("locked.md", Doc::with_history(Some(changed_days_ago(400))))
        .file("open.md", Doc::with_history(Some(changed_days_ago(90))))
        .fail_read("locked.md");
    let records = analyze(&source, ROOT);
    let feedback = RecordingFeedback::new();

    let outcome = mark_stale_documents(&records, &source, &feedback);

    assert!(outcome.is_complete());
    assert_eq!(outcome.unreadable, vec!["locked.md".to_string()]);
    assert_eq!(outcome.edited, vec!["open.md".to_string()]);
    assert!(feedback.contains(FeedbackLevel::Warning, "locked.md"));
}

#[test]
fn pages_get_a_title_suffix_without_publish_url() {
    let source = InMemorySource::pages("wiki")
        .page("", "1", Doc::with_history(Some(changed_days_ago(5))).title("Home"))
        .page("1", "2", Doc::with_history(Some(changed_days_ago(90))).title("Runbook"))
        .page("1", "3", Doc::with_history(Some(changed_days_ago(90))).title("Old (Stale)"));
    let records = analyze(&source, "1");

    let outcome = mark_stale_documents(&records, &source, &RecordingFeedback::new());

    assert_eq!(outcome.edited, vec!["2".to_string()]);
    assert_eq!(outcome.already_marked, vec!["3".to_string()]);
    assert_eq!(source.title_of("2").as_deref(), Some("Runbook (Stale)"));
    assert_eq!(source.title_of("1").as_deref(), Some("Home"));
    assert!(outcome.published.is_none());
    assert_eq!(source.published().len(), 1);
}
