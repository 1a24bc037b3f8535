//! Fixed clock and record builders.

use chrono::{DateTime, Duration, TimeZone, Utc};
use decay::audit::{AnalysisRecord, ChangeInfo, EmailAddress, StalenessPolicy};

/// The instant every test run treats as "now".
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// A change `days` days before [`fixed_now`].
pub fn changed_days_ago(days: i64) -> ChangeInfo {
    ChangeInfo {
        when: fixed_now() - Duration::days(days),
        actor_name: Some("Dana Writer".to_string()),
        actor_email: Some("dana@example.com".to_string()),
    }
}

/// Record builder against [`fixed_now`].
pub fn record(
    identifier: &str,
    age_days: Option<i64>,
    owner: Option<&str>,
    threshold_days: u32,
) -> AnalysisRecord {
    AnalysisRecord::new(
        identifier,
        age_days.map(changed_days_ago),
        &StalenessPolicy::new(threshold_days),
        fixed_now(),
    )
    .with_owner(owner.and_then(|o| EmailAddress::parse(o).ok()))
}

pub fn email(raw: &str) -> EmailAddress {
    match EmailAddress::parse(raw) {
        Ok(email) => email,
        Err(e) => panic!("test address {} is invalid: {}", raw, e),
    }
}
