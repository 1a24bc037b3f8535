//! Console output for a finished run
//!
//! Provides:
//! - A table of analyzed documents, stale ones highlighted
//! - Totals for marking and delivery
//! - JSON output of the records for scripting

use super::run::RunSummary;
use crate::audit::AnalysisRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};

/// Build a table with the standard preset and cyan headers
pub fn create_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);
    table
}

/// One table row per record, in result order.
pub fn records_table(records: &[AnalysisRecord], now: DateTime<Utc>) -> Table {
    let mut table = create_table(&["Document", "Last Change", "Age (Days)", "Stale", "Owner"]);
    for record in records {
        let stale = if record.is_stale() {
            Cell::new("yes").fg(Color::Red)
        } else {
            Cell::new("no").fg(Color::Green)
        };
        table.add_row(vec![
            Cell::new(&record.display_name),
            Cell::new(
                record
                    .last_change
                    .map(|when| when.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(
                record
                    .age_in_days(now)
                    .map(|days| days.to_string())
                    .unwrap_or_else(|| "Never updated".to_string()),
            ),
            stale,
            Cell::new(
                record
                    .owner
                    .as_ref()
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]);
    }
    table
}

/// Summary lines printed below the table.
pub fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let report = &summary.report;
    let mut lines = vec![format!(
        "{} documents analyzed, {} stale, {} unreadable",
        report.records.len(),
        report.stale_count(),
        report.failures.len()
    )];

    if let Some(marking) = &summary.marking {
        let mut line = format!(
            "Marking: {} edited, {} already marked",
            marking.edited.len(),
            marking.already_marked.len()
        );
        if let Some(url) = &marking.published {
            line.push_str(&format!(", review at {}", url));
        }
        if let Some(failure) = &marking.failure {
            line.push_str(&format!(" (stopped: {})", failure));
        }
        lines.push(line);
    }

    if let Some(delivery) = &summary.delivery {
        lines.push(format!(
            "Email: {} sent, {} failed",
            delivery.sent.len(),
            delivery.failures.len()
        ));
    }

    if summary.unassigned > 0 {
        lines.push(format!(
            "{} stale documents had no owner and no administrator",
            summary.unassigned
        ));
    }
    lines
}

pub fn print_summary(summary: &RunSummary, now: DateTime<Utc>) {
    if summary.report.records.is_empty() {
        println!("No documents matched.");
    } else {
        println!("{}", records_table(&summary.report.records, now));
    }
    for line in summary_lines(summary) {
        println!("{}", line);
    }
}

pub fn print_json(records: &[AnalysisRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records).context("Failed to serialize records")?;
    println!("{}", json);
    Ok(())
}
