//! Staleness classification.

use chrono::{DateTime, Duration, Utc};

/// Decides whether a document changed recently enough.
///
/// All timestamps are UTC; backends convert offset-bearing API timestamps
/// before they reach the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    threshold_days: u32,
}

impl StalenessPolicy {
    pub fn new(threshold_days: u32) -> Self {
        Self { threshold_days }
    }

    pub fn threshold_days(&self) -> u32 {
        self.threshold_days
    }

    /// Oldest change that still counts as recent at `now`. Thresholds reaching
    /// past the representable range clamp to the earliest instant.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(Duration::days(i64::from(self.threshold_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// `true` when the document is not stale. Unknown history is never stale,
    /// and the boundary is inclusive.
    pub fn changed_recently(&self, last_change: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_change {
            None => true,
            Some(changed) => changed >= self.cutoff(now),
        }
    }

    pub fn is_stale(&self, last_change: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        !self.changed_recently(last_change, now)
    }
}

/// Free-function form of [`StalenessPolicy::is_stale`].
pub fn is_stale(last_change: Option<DateTime<Utc>>, threshold_days: u32, now: DateTime<Utc>) -> bool {
    StalenessPolicy::new(threshold_days).is_stale(last_change, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn boundary_is_inclusive() {
        let policy = StalenessPolicy::new(30);
        let exactly = now() - Duration::days(30);
        assert!(policy.changed_recently(Some(exactly), now()));
        assert!(!policy.is_stale(Some(exactly), now()));

        let one_second_older = exactly - Duration::seconds(1);
        assert!(!policy.changed_recently(Some(one_second_older), now()));
        assert!(is_stale(Some(one_second_older), 30, now()));
    }

    #[test]
    fn unknown_history_is_not_stale() {
        assert!(!is_stale(None, 0, now()));
        assert!(!is_stale(None, 30, now()));
        assert!(StalenessPolicy::new(1).changed_recently(None, now()));
    }

    #[test]
    fn zero_threshold_means_only_now_is_recent() {
        let policy = StalenessPolicy::new(0);
        assert!(policy.changed_recently(Some(now()), now()));
        assert!(policy.is_stale(Some(now() - Duration::seconds(1)), now()));
    }

    #[test]
    fn huge_threshold_clamps_instead_of_overflowing() {
        let policy = StalenessPolicy::new(u32::MAX);
        assert_eq!(policy.cutoff(now()), DateTime::<Utc>::MIN_UTC);
        assert!(policy.changed_recently(Some(now()), now()));
        assert!(!policy.is_stale(Some(now() - Duration::days(36_500)), now()));
    }

    #[test]
    fn future_timestamps_are_recent() {
        let policy = StalenessPolicy::new(30);
        assert!(policy.changed_recently(Some(now() + Duration::days(2)), now()));
    }
}
