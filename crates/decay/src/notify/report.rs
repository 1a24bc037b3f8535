//! Report rendering.
//!
//! Each report is a Markdown document (sent as the plain-text part) and an
//! HTML rendering of the same tables (sent as the HTML part).

use crate::audit::{AdminSummary, AnalysisRecord, EmailAddress};
use chrono::{DateTime, Utc};

pub const ADMIN_SUBJECT: &str = "Documentation Checker Admin Report";
const NEVER_UPDATED: &str = "Never updated";

const REPORT_CSS: &str = r#"<style>
    tr:nth-child(even) {
        background: #efefef;
    }
    th {
        font-weight: bold;
        text-align: left;
        border-bottom: 1px solid #333;
    }
    th, td {
        padding: 7px;
    }
</style>"#;

/// Run parameters echoed at the bottom of every report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportParameters {
    /// Source description, e.g. `acme/handbook@main`.
    pub source: String,
    pub root: String,
    pub max_age_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Stale documents for one owner (or the administrator as fallback).
    Owner,
    /// Every analyzed document, for the administrator.
    Admin,
}

/// One email-ready report.
#[derive(Debug, Clone)]
pub struct Report {
    pub kind: ReportKind,
    pub recipients: Vec<EmailAddress>,
    pub records: Vec<AnalysisRecord>,
    pub parameters: ReportParameters,
}

/// A rendered report body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub subject: String,
    pub markdown: String,
    pub html: String,
}

impl Report {
    pub fn owner(
        recipient: EmailAddress,
        records: Vec<AnalysisRecord>,
        parameters: ReportParameters,
    ) -> Self {
        Self {
            kind: ReportKind::Owner,
            recipients: vec![recipient],
            records,
            parameters,
        }
    }

    pub fn admin(summary: &AdminSummary, parameters: ReportParameters) -> Self {
        Self {
            kind: ReportKind::Admin,
            recipients: vec![summary.administrator.clone()],
            records: summary.records.clone(),
            parameters,
        }
    }

    pub fn title(&self) -> &'static str {
        match self.kind {
            ReportKind::Owner => "Documentation Owner Report",
            ReportKind::Admin => "Documentation Admin Report",
        }
    }

    pub fn subject(&self) -> String {
        match self.kind {
            ReportKind::Owner => format!(
                "Documentation Checker Owner Report - {} docs found that are more than {} days old",
                self.records.len(),
                self.parameters.max_age_days
            ),
            ReportKind::Admin => ADMIN_SUBJECT.to_string(),
        }
    }

    pub fn render(&self, now: DateTime<Utc>) -> RenderedReport {
        RenderedReport {
            subject: self.subject(),
            markdown: self.render_markdown(now),
            html: self.render_html(now),
        }
    }

    pub fn render_markdown(&self, now: DateTime<Utc>) -> String {
        let mut out = String::new();
        out.push_str(&format!("## {}\n\n", self.title()));
        out.push_str("### Stale Docs\n\n");
        out.push_str("| Name | Age (Days) | Changed By | Link |\n");
        out.push_str("|------|------------|------------|------|\n");
        for row in self.rows(now) {
            out.push_str(&format!(
                "| {} | {} | {} | [{}]({}) |\n",
                markdown_cell(&row.name),
                row.age,
                markdown_cell(&row.changed_by),
                markdown_cell(&row.link),
                row.link
            ));
        }

        out.push_str("\n### Parameters\n\n");
        out.push_str("| Source | Root | Max Age |\n");
        out.push_str("|--------|------|---------|\n");
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            markdown_cell(&self.parameters.source),
            markdown_cell(&self.parameters.root),
            self.parameters.max_age_days
        ));
        out
    }

    pub fn render_html(&self, now: DateTime<Utc>) -> String {
        let mut out = String::new();
        out.push_str(&format!("<h2>{}</h2>\n", escape_html(self.title())));
        out.push_str("<h3>Stale Docs</h3>\n<table>\n");
        out.push_str(
            "<thead><tr><th>Name</th><th>Age (Days)</th><th>Changed By</th><th>Link</th></tr></thead>\n<tbody>\n",
        );
        for row in self.rows(now) {
            out.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td><a href=\"{}\">{}</a></td></tr>\n",
                escape_html(&row.name),
                escape_html(&row.age),
                escape_html(&row.changed_by),
                escape_html(&row.link),
                escape_html(&row.link)
            ));
        }
        out.push_str("</tbody>\n</table>\n");

        out.push_str("<h3>Parameters</h3>\n<table>\n");
        out.push_str("<thead><tr><th>Source</th><th>Root</th><th>Max Age</th></tr></thead>\n");
        out.push_str(&format!(
            "<tbody><tr><td>{}</td><td>{}</td><td>{}</td></tr></tbody>\n</table>\n",
            escape_html(&self.parameters.source),
            escape_html(&self.parameters.root),
            self.parameters.max_age_days
        ));
        out.push_str(REPORT_CSS);
        out.push('\n');
        out
    }

    fn rows(&self, now: DateTime<Utc>) -> Vec<ReportRow> {
        self.records
            .iter()
            .map(|record| ReportRow {
                name: record.display_name.clone(),
                age: record
                    .age_in_days(now)
                    .map(|days| days.to_string())
                    .unwrap_or_else(|| NEVER_UPDATED.to_string()),
                changed_by: record.changed_by().unwrap_or_default().to_string(),
                link: record.link.clone(),
            })
            .collect()
    }
}

struct ReportRow {
    name: String,
    age: String,
    changed_by: String,
    link: String,
}

fn markdown_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{ChangeInfo, StalenessPolicy};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn params() -> ReportParameters {
        ReportParameters {
            source: "acme/handbook@master".into(),
            root: "docs".into(),
            max_age_days: 30,
        }
    }

    fn stale(id: &str, days: i64) -> AnalysisRecord {
        let info = ChangeInfo {
            when: now() - Duration::days(days),
            actor_name: Some("Ann".into()),
            actor_email: Some("ann@acme.io".into()),
        };
        AnalysisRecord::new(id, Some(info), &StalenessPolicy::new(30), now())
            .with_link(format!("https://git.example/{}", id))
    }

    #[test]
    fn owner_subject_counts_documents() {
        let owner = EmailAddress::parse("owner@acme.io").unwrap();
        let report = Report::owner(owner, vec![stale("a.md", 40), stale("b.md", 90)], params());
        assert_eq!(
            report.subject(),
            "Documentation Checker Owner Report - 2 docs found that are more than 30 days old"
        );
        assert_eq!(report.recipients.len(), 1);
    }

    #[test]
    fn markdown_lists_rows_and_parameters() {
        let owner = EmailAddress::parse("owner@acme.io").unwrap();
        let report = Report::owner(owner, vec![stale("docs/a.md", 40)], params());
        let markdown = report.render_markdown(now());

        assert!(markdown.contains("| Name | Age (Days) | Changed By | Link |"));
        assert!(markdown.contains(
            "| docs/a.md | 40 | ann@acme.io | [https://git.example/docs/a.md](https://git.example/docs/a.md) |"
        ));
        assert!(markdown.contains("| acme/handbook@master | docs | 30 |"));
    }

    #[test]
    fn admin_report_shows_unknown_history() {
        let admin = EmailAddress::parse("admin@acme.io").unwrap();
        let unknown = AnalysisRecord::new("new.md", None, &StalenessPolicy::new(30), now());
        let summary = AdminSummary {
            administrator: admin,
            records: vec![unknown, stale("old.md", 100)],
        };
        let report = Report::admin(&summary, params());
        assert_eq!(report.subject(), ADMIN_SUBJECT);

        let markdown = report.render_markdown(now());
        assert!(markdown.contains("| new.md | Never updated |  |"));
        assert!(markdown.contains("| old.md | 100 |"));
    }

    #[test]
    fn html_escapes_cells_and_carries_css() {
        let owner = EmailAddress::parse("owner@acme.io").unwrap();
        let record = stale("a.md", 40).with_display_name("<Setup & Run>");
        let html = Report::owner(owner, vec![record], params()).render_html(now());

        assert!(html.contains("<td>&lt;Setup &amp; Run&gt;</td>"));
        assert!(html.contains("<a href=\"https://git.example/a.md\">"));
        assert!(html.contains("<style>"));
    }

    #[test]
    fn markdown_cells_escape_pipes() {
        assert_eq!(markdown_cell("a|b\nc"), "a\\|b c");
    }
}
