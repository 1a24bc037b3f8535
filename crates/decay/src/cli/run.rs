//! The run pipeline: analyze, then mark, then send reports.

use super::config::{Action, RunConfig};
use super::error::HelpfulError;
use super::output;
use crate::audit::{
    admin_summary, group_by_recipient, mark_stale_documents, normalize_path, ChangeSetTarget,
    DocumentSource, Feedback, MarkOutcome, TracingFeedback, TraversalReport, Traverser,
};
use crate::notify::{DeliverySummary, Mailer, Notifier, ReportParameters, SendGridMailer};
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Everything a run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub report: TraversalReport,
    pub marking: Option<MarkOutcome>,
    pub delivery: Option<DeliverySummary>,
    /// Stale documents nobody could be notified about.
    pub unassigned: usize,
}

/// Connect to the configured backend and run every requested action.
pub fn run(config: &RunConfig) -> Result<()> {
    let backend = config
        .backend()
        .connect()
        .map_err(|e| HelpfulError::source_unreachable(config.backend().name(), &e.to_string()))?;

    let mailer = match config.email() {
        Some(settings) => Some(SendGridMailer::new(settings.sendgrid_api_key.clone())?),
        None => None,
    };

    let now = Utc::now();
    let feedback = TracingFeedback;
    let summary = execute(
        config,
        backend.source(),
        backend.target(),
        mailer.as_ref().map(|m| m as &dyn Mailer),
        &feedback,
        now,
    )?;

    if config.json() {
        output::print_json(&summary.report.records)?;
    } else {
        output::print_summary(&summary, now);
    }
    Ok(())
}

/// Run the pipeline against explicit collaborators.
///
/// Fails only when the root itself cannot be read. Per-document, marking and
/// delivery failures are logged and reported in the summary.
pub fn execute(
    config: &RunConfig,
    source: &dyn DocumentSource,
    target: &dyn ChangeSetTarget,
    mailer: Option<&dyn Mailer>,
    feedback: &dyn Feedback,
    now: DateTime<Utc>,
) -> Result<RunSummary> {
    let root = normalize_path(config.backend().root());
    feedback.info(0, &format!("Analyzing {} from {}...", source.describe(), root));

    let traverser = Traverser::new(source, config.filter(), config.policy(), now, feedback);
    let report = traverser.traverse(&root);
    if report.records.is_empty() {
        if let Some(failure) = report.failures.iter().find(|f| f.identifier == root) {
            return Err(HelpfulError::source_unreachable(&source.describe(), &failure.error.to_string()).into());
        }
    }
    tracing::info!(
        documents = report.records.len(),
        stale = report.stale_count(),
        failures = report.failures.len(),
        "Analysis complete"
    );

    let marking = config
        .wants(Action::MarkStale)
        .then(|| mark_stale_documents(&report.records, target, feedback));

    let mut summary = RunSummary {
        report,
        marking,
        delivery: None,
        unassigned: 0,
    };

    let (settings, mailer) = match (config.email(), mailer) {
        (Some(settings), Some(mailer)) => (settings, mailer),
        _ => return Ok(summary),
    };
    let parameters = ReportParameters {
        source: source.describe(),
        root,
        max_age_days: config.policy().threshold_days(),
    };
    let notifier = Notifier::new(mailer, settings.from.clone(), parameters, now, feedback);
    let mut delivery = DeliverySummary::default();

    if config.wants(Action::NotifyOwners) {
        feedback.info(
            0,
            &format!(
                "Preparing to send email to owners for {} documents...",
                summary.report.records.len()
            ),
        );
        let plan = group_by_recipient(&summary.report.records, config.administrator(), feedback);
        summary.unassigned = plan.unassigned.len();
        delivery.merge(notifier.send_owner_reports(&plan));
    }

    let requested = config.wants(Action::SendAdminReport);
    if let Some(admin) = admin_summary(&summary.report.records, requested, config.administrator()) {
        delivery.merge(notifier.send_admin_report(&admin));
    }

    summary.delivery = Some(delivery);
    Ok(summary)
}
