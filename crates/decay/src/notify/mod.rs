//! Notification - report rendering and delivery
//!
//! Owner reports go to every recipient in a [`NotificationPlan`], the admin
//! report to the administrator. A failed delivery is logged and recorded; the
//! remaining reports are still sent.

pub mod report;
pub mod sendgrid;

pub use report::{RenderedReport, Report, ReportKind, ReportParameters, ADMIN_SUBJECT};
pub use sendgrid::{DeliveryError, EmailMessage, Mailer, SendGridMailer, SENDGRID_ENDPOINT};

use crate::audit::{AdminSummary, EmailAddress, Feedback, NotificationPlan};
use chrono::{DateTime, Utc};

/// What happened to the reports of one run.
#[derive(Debug, Default)]
pub struct DeliverySummary {
    /// Recipient lists of the reports that were accepted.
    pub sent: Vec<String>,
    pub failures: Vec<DeliveryError>,
}

impl DeliverySummary {
    pub fn merge(&mut self, other: DeliverySummary) {
        self.sent.extend(other.sent);
        self.failures.extend(other.failures);
    }

    pub fn all_sent(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Renders reports and hands them to a [`Mailer`].
pub struct Notifier<'a> {
    mailer: &'a dyn Mailer,
    from: EmailAddress,
    parameters: ReportParameters,
    now: DateTime<Utc>,
    feedback: &'a dyn Feedback,
}

impl<'a> Notifier<'a> {
    pub fn new(
        mailer: &'a dyn Mailer,
        from: EmailAddress,
        parameters: ReportParameters,
        now: DateTime<Utc>,
        feedback: &'a dyn Feedback,
    ) -> Self {
        Self {
            mailer,
            from,
            parameters,
            now,
            feedback,
        }
    }

    /// One report per recipient, in recipient order.
    pub fn send_owner_reports(&self, plan: &NotificationPlan) -> DeliverySummary {
        let mut summary = DeliverySummary::default();
        self.feedback.info(
            1,
            &format!("Sending {} owner report emails...", plan.recipient_count()),
        );
        for (recipient, records) in &plan.groups {
            let report = Report::owner(recipient.clone(), records.clone(), self.parameters.clone());
            summary.merge(self.deliver(&report));
        }
        summary
    }

    pub fn send_admin_report(&self, admin: &AdminSummary) -> DeliverySummary {
        self.feedback.info(
            0,
            &format!(
                "Preparing to send the administrator report via email for {} documents...",
                admin.records.len()
            ),
        );
        self.deliver(&Report::admin(admin, self.parameters.clone()))
    }

    fn deliver(&self, report: &Report) -> DeliverySummary {
        let rendered = report.render(self.now);
        let message = EmailMessage {
            from: self.from.clone(),
            to: report.recipients.clone(),
            subject: rendered.subject,
            plain_text: rendered.markdown,
            html: rendered.html,
        };
        let recipients = message.recipient_list();

        let mut summary = DeliverySummary::default();
        match self.mailer.send(&message) {
            Ok(()) => {
                self.feedback.success(
                    2,
                    &format!(
                        "Successfully sent email to {} regarding {} files",
                        recipients,
                        report.records.len()
                    ),
                );
                summary.sent.push(recipients);
            }
            Err(error) => {
                self.feedback.error(
                    2,
                    &format!("{} (regarding {} files)", error, report.records.len()),
                );
                summary.failures.push(error);
            }
        }
        summary
    }
}
