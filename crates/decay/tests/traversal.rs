//! Traversal over in-memory file and page trees.

use decay::audit::{
    group_by_recipient, admin_summary, FeedbackLevel, NodeKind, RecordingFeedback,
    StalenessPolicy, TraversalFilter, TraversalReport, Traverser,
};
use decay::DocumentSource;
use decay_test_utils::fixtures::{changed_days_ago, email, fixed_now};
use decay_test_utils::{Doc, InMemorySource, ROOT};

fn default_filter() -> TraversalFilter {
    TraversalFilter::new([".md", ".html"], Vec::<String>::new(), Vec::<String>::new())
}

fn traverse(
    source: &InMemorySource,
    filter: &TraversalFilter,
    root: &str,
    feedback: &RecordingFeedback,
) -> TraversalReport {
    Traverser::new(source, filter, StalenessPolicy::new(30), fixed_now(), feedback).traverse(root)
}

fn ids(report: &TraversalReport) -> Vec<&str> {
    report.records.iter().map(|r| r.identifier.as_str()).collect()
}

#[test]
fn example_scenario() {
    let source = InMemorySource::files("memory")
        .dir("docs")
        .file(
            "docs/a.md",
            Doc::with_history(Some(changed_days_ago(10))).owner("alice@x.com"),
        )
        .file("docs/b.md", Doc::with_history(Some(changed_days_ago(400))));
    let feedback = RecordingFeedback::new();
    let report = traverse(&source, &default_filter(), ROOT, &feedback);

    assert_eq!(ids(&report), vec!["docs/b.md", "docs/a.md"]);
    assert!(report.failures.is_empty());
    let b = &report.records[0];
    let a = &report.records[1];
    assert!(b.is_stale());
    assert!(a.changed_recently());
    assert_eq!(a.owner.as_ref().map(|o| o.as_str()), Some("alice@x.com"));
    assert_eq!(a.link, "memory://docs/a.md");

    let admin = email("admin@x.com");
    let plan = group_by_recipient(&report.records, Some(&admin), &feedback);
    assert_eq!(plan.recipient_count(), 1);
    assert_eq!(plan.records_for(&admin).len(), 1);
    assert_eq!(plan.records_for(&admin)[0].identifier, "docs/b.md");

    let summary = admin_summary(&report.records, true, Some(&admin)).unwrap();
    let listed: Vec<&str> = summary.records.iter().map(|r| r.identifier.as_str()).collect();
    assert_eq!(listed, vec!["docs/b.md", "docs/a.md"]);
}

#[test]
fn unknown_history_sorts_first_then_oldest() {
    let source = InMemorySource::files("memory")
        .file("fresh.md", Doc::with_history(Some(changed_days_ago(1))))
        .file("unknown.md", Doc::with_history(None))
        .file("old.md", Doc::with_history(Some(changed_days_ago(300))))
        .file("middle.md", Doc::with_history(Some(changed_days_ago(40))))
        .file("unknown2.md", Doc::with_history(None));
    let report = traverse(&source, &default_filter(), ROOT, &RecordingFeedback::new());

    assert_eq!(
        ids(&report),
        vec!["unknown.md", "unknown2.md", "old.md", "middle.md", "fresh.md"]
    );
    let dates: Vec<_> = report.records.iter().map(|r| r.last_change).collect();
    assert!(dates.windows(2).all(|w| w[0] <= w[1]));
    assert!(report.records[0].changed_recently());
}

#[test]
fn filters_apply_at_every_depth() {
    let source = InMemorySource::files("memory")
        .file("readme.md", Doc::with_history(Some(changed_days_ago(90))))
        .file("notes.txt", Doc::with_history(Some(changed_days_ago(90))))
        .dir("docs")
        .file("docs/GUIDE.MD", Doc::with_history(Some(changed_days_ago(90))))
        .file("docs/skip.md", Doc::with_history(Some(changed_days_ago(90))))
        .dir("docs/archive")
        .file("docs/archive/old.md", Doc::with_history(Some(changed_days_ago(900))))
        .dir("docs/deep")
        .dir("docs/deep/er")
        .file("docs/deep/er/page.html", Doc::with_history(Some(changed_days_ago(90))))
        .file("docs/deep/er/image.png", Doc::with_history(Some(changed_days_ago(90))));
    let filter = TraversalFilter::new(["md", ".html"], ["/docs/archive/"], ["/docs/skip.md"]);
    let report = traverse(&source, &filter, ROOT, &RecordingFeedback::new());

    let mut found = ids(&report);
    found.sort();
    assert_eq!(found, vec!["docs/GUIDE.MD", "docs/deep/er/page.html", "readme.md"]);
}

#[test]
fn ignore_paths_match_full_source_paths_below_a_nested_root() {
    let source = InMemorySource::files("memory")
        .dir("docs")
        .file("docs/keep.md", Doc::with_history(Some(changed_days_ago(90))))
        .dir("docs/archive")
        .file("docs/archive/old.md", Doc::with_history(Some(changed_days_ago(900))));

    let root_relative = TraversalFilter::new([".md"], ["archive"], Vec::<String>::new());
    let report = traverse(&source, &root_relative, "docs", &RecordingFeedback::new());
    let mut found = ids(&report);
    found.sort();
    assert_eq!(found, vec!["docs/archive/old.md", "docs/keep.md"]);

    let full_path = TraversalFilter::new([".md"], ["docs/archive"], Vec::<String>::new());
    let report = traverse(&source, &full_path, "docs", &RecordingFeedback::new());
    assert_eq!(ids(&report), vec!["docs/keep.md"]);
}

#[test]
fn failing_subtree_does_not_hide_siblings() {
    let source = InMemorySource::files("memory")
        .dir("broken")
        .file("broken/lost.md", Doc::with_history(Some(changed_days_ago(90))))
        .dir("fine")
        .file("fine/kept.md", Doc::with_history(Some(changed_days_ago(90))))
        .file("top.md", Doc::with_history(Some(changed_days_ago(5))))
        .fail_listing("broken");
    let feedback = RecordingFeedback::new();
    let report = traverse(&source, &default_filter(), ROOT, &feedback);

    assert_eq!(ids(&report), vec!["fine/kept.md", "top.md"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].identifier, "broken");
    assert!(feedback.contains(FeedbackLevel::Error, "broken"));
}

#[test]
fn history_failure_skips_document_but_content_failure_keeps_it() {
    let source = InMemorySource::files("memory")
        .file("no-history.md", Doc::with_history(Some(changed_days_ago(90))))
        .file("no-content.md", Doc::with_history(Some(changed_days_ago(90))).owner("o@x.com"))
        .fail_history("no-history.md")
        .fail_content("no-content.md");
    let feedback = RecordingFeedback::new();
    let report = traverse(&source, &default_filter(), ROOT, &feedback);

    assert_eq!(ids(&report), vec!["no-content.md"]);
    let partial = &report.records[0];
    assert!(partial.is_stale());
    assert!(partial.owner.is_none());
    assert_eq!(partial.link, "");
    assert_eq!(report.failures.len(), 1);
    assert!(feedback.contains(FeedbackLevel::Warning, "Unable to load content for no-content.md"));
}

#[test]
fn invalid_owner_and_broken_front_matter_leave_owner_absent() {
    let source = InMemorySource::files("memory")
        .file("bad-owner.md", Doc::with_history(Some(changed_days_ago(90))).owner("not an email"))
        .file(
            "broken.md",
            Doc::with_history(Some(changed_days_ago(90))).raw("---\nowner: [unclosed\n---\nbody\n"),
        )
        .file(
            "titled.md",
            Doc::with_history(Some(changed_days_ago(90))).title("Deploy Guide"),
        );
    let feedback = RecordingFeedback::new();
    let report = traverse(&source, &default_filter(), ROOT, &feedback);

    assert_eq!(report.records.len(), 3);
    assert!(report.records.iter().all(|r| r.owner.is_none()));
    assert!(feedback.contains(FeedbackLevel::Warning, "email not an email is not valid"));
    assert!(feedback.contains(FeedbackLevel::Warning, "front matter for broken.md"));

    let titled = report.records.iter().find(|r| r.identifier == "titled.md").unwrap();
    assert_eq!(titled.display_name, "Deploy Guide");
}

#[test]
fn per_document_details_are_reported() {
    let source = InMemorySource::files("memory")
        .file("a.md", Doc::with_history(Some(changed_days_ago(90))).owner("a@x.com"));
    let feedback = RecordingFeedback::new();
    traverse(&source, &default_filter(), ROOT, &feedback);

    let entries = feedback.entries();
    assert_eq!(entries[0].message, "Checking a.md...");
    assert_eq!(entries[0].depth, 0);
    let details: Vec<&str> = entries[1..].iter().map(|e| e.message.as_str()).collect();
    assert_eq!(details[0], "Owner: a@x.com");
    assert!(details[1].starts_with("Changed On: 2024-03-03"));
    assert_eq!(details[2], "Is Stale: Yes");
    assert_eq!(details[3], "Changed By: dana@example.com");
    assert!(entries[1..].iter().all(|e| e.depth == 1));
}

#[test]
fn page_tree_analyzes_root_and_parent_pages() {
    let source = InMemorySource::pages("wiki")
        .page("", "100", Doc::with_history(Some(changed_days_ago(200))).title("Handbook"))
        .page("100", "101", Doc::with_history(Some(changed_days_ago(5))).title("Onboarding"))
        .page("101", "102", Doc::with_history(Some(changed_days_ago(60))).title("Laptop setup"))
        .page("100", "103", Doc::with_history(None).title("Drafts"));
    let filter = TraversalFilter::new([".md"], Vec::<String>::new(), Vec::<String>::new());
    let report = traverse(&source, &filter, "100", &RecordingFeedback::new());

    assert_eq!(ids(&report), vec!["103", "100", "102", "101"]);
    let names: Vec<&str> = report.records.iter().map(|r| r.display_name.as_str()).collect();
    assert_eq!(names, vec!["Drafts", "Handbook", "Laptop setup", "Onboarding"]);

    let children = source.list_children("100").unwrap();
    assert_eq!(children[0].kind, NodeKind::ParentDocument);
    assert_eq!(children[1].kind, NodeKind::Leaf);
}
