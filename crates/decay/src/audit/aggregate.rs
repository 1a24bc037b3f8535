//! Grouping of analysis results for notification.

use super::email::EmailAddress;
use super::feedback::Feedback;
use super::types::AnalysisRecord;
use std::collections::BTreeMap;

/// Stale documents grouped by who should hear about them.
#[derive(Debug, Default, Clone)]
pub struct NotificationPlan {
    /// One entry per recipient; records keep the traversal order.
    pub groups: BTreeMap<EmailAddress, Vec<AnalysisRecord>>,
    /// Stale records with neither an owner nor an administrator.
    pub unassigned: Vec<AnalysisRecord>,
}

impl NotificationPlan {
    pub fn recipient_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn records_for(&self, recipient: &EmailAddress) -> &[AnalysisRecord] {
        self.groups
            .get(recipient)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Group stale records by owner, falling back to the administrator.
pub fn group_by_recipient(
    records: &[AnalysisRecord],
    administrator: Option<&EmailAddress>,
    feedback: &dyn Feedback,
) -> NotificationPlan {
    let mut plan = NotificationPlan::default();

    for record in records.iter().filter(|r| r.is_stale()) {
        match record.owner.as_ref().or(administrator) {
            Some(recipient) => plan
                .groups
                .entry(recipient.clone())
                .or_default()
                .push(record.clone()),
            None => {
                feedback.warning(
                    1,
                    &format!(
                        "Found a stale document ({}) but there's no one to send it to. \
                         Consider setting --administrator so every stale document has a recipient.",
                        record.identifier
                    ),
                );
                plan.unassigned.push(record.clone());
            }
        }
    }

    plan
}

/// Everything the administrator report covers.
#[derive(Debug, Clone)]
pub struct AdminSummary {
    pub administrator: EmailAddress,
    pub records: Vec<AnalysisRecord>,
}

impl AdminSummary {
    pub fn stale_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_stale()).count()
    }
}

/// The full ordered result set for the administrator, when the report was
/// requested and an administrator is configured.
pub fn admin_summary(
    records: &[AnalysisRecord],
    requested: bool,
    administrator: Option<&EmailAddress>,
) -> Option<AdminSummary> {
    if !requested {
        return None;
    }
    administrator.map(|admin| AdminSummary {
        administrator: admin.clone(),
        records: records.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::feedback::{FeedbackLevel, RecordingFeedback};
    use crate::audit::policy::StalenessPolicy;
    use crate::audit::types::ChangeInfo;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn record(id: &str, age_days: i64, owner: Option<&str>) -> AnalysisRecord {
        let info = ChangeInfo {
            when: now() - Duration::days(age_days),
            actor_name: None,
            actor_email: None,
        };
        AnalysisRecord::new(id, Some(info), &StalenessPolicy::new(30), now())
            .with_owner(owner.map(|o| EmailAddress::parse(o).unwrap()))
    }

    fn email(raw: &str) -> EmailAddress {
        EmailAddress::parse(raw).unwrap()
    }

    #[test]
    fn groups_by_owner_with_admin_fallback() {
        let records = vec![
            record("old-owned.md", 100, Some("alice@x.com")),
            record("old-orphan.md", 90, None),
            record("fresh.md", 2, Some("alice@x.com")),
            record("old-owned-2.md", 60, Some("alice@x.com")),
        ];
        let admin = email("admin@x.com");
        let feedback = RecordingFeedback::new();

        let plan = group_by_recipient(&records, Some(&admin), &feedback);

        assert_eq!(plan.recipient_count(), 2);
        let alice: Vec<_> = plan
            .records_for(&email("alice@x.com"))
            .iter()
            .map(|r| r.identifier.as_str())
            .collect();
        assert_eq!(alice, vec!["old-owned.md", "old-owned-2.md"]);
        assert_eq!(plan.records_for(&admin).len(), 1);
        assert!(plan.unassigned.is_empty());
        assert!(feedback.at_level(FeedbackLevel::Warning).is_empty());
    }

    #[test]
    fn drops_orphans_without_admin() {
        let records = vec![record("old-orphan.md", 90, None)];
        let feedback = RecordingFeedback::new();

        let plan = group_by_recipient(&records, None, &feedback);

        assert!(plan.is_empty());
        assert_eq!(plan.unassigned.len(), 1);
        assert!(feedback.contains(FeedbackLevel::Warning, "old-orphan.md"));
    }

    #[test]
    fn admin_summary_requires_request_and_admin() {
        let records = vec![record("a.md", 1, None), record("b.md", 400, None)];
        let admin = email("admin@x.com");

        assert!(admin_summary(&records, false, Some(&admin)).is_none());
        assert!(admin_summary(&records, true, None).is_none());

        let summary = admin_summary(&records, true, Some(&admin)).unwrap();
        assert_eq!(summary.records.len(), 2);
        assert_eq!(summary.stale_count(), 1);
    }
}
