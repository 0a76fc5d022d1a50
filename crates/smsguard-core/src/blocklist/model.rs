//! Blocklist data models.

use chrono::{DateTime, Duration, Utc};

/// A stored block for one sender identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    /// Raw sender identity, matched exactly.
    pub identifier: String,
    /// When the block lapses. `None` means blocked indefinitely.
    pub unblock_at: Option<DateTime<Utc>>,
    /// True once a future unblock has been scheduled.
    pub retention_armed: bool,
    /// When the identifier was blocked.
    pub blocked_at: DateTime<Utc>,
}

impl BlockRecord {
    /// Creates an indefinite block.
    #[must_use]
    pub fn new(identifier: impl Into<String>, blocked_at: DateTime<Utc>) -> Self {
        Self {
            identifier: identifier.into(),
            unblock_at: None,
            retention_armed: false,
            blocked_at,
        }
    }

    /// Returns true if the identifier is still blocked at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.unblock_at.is_none_or(|at| at > now)
    }

    /// Returns true if the record has lapsed and should be swept.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.is_active(now)
    }

    /// Returns true if a scheduled unblock is still counting down.
    ///
    /// While this holds, a new schedule request is rejected.
    #[must_use]
    pub fn has_pending_retention(&self, now: DateTime<Utc>) -> bool {
        self.retention_armed && self.unblock_at.is_some_and(|at| at > now)
    }

    /// Returns the time left until the block lapses, if one is scheduled.
    #[must_use]
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.unblock_at
            .filter(|at| *at > now)
            .map(|at| at - now)
    }
}

/// Result of a block request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The identifier was not blocked and now is.
    Blocked,
    /// The identifier was already active; nothing changed.
    AlreadyBlocked,
}

/// A successfully scheduled unblock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledUnblock {
    /// Identifier that will be unblocked.
    pub identifier: String,
    /// Instant at which the block lapses.
    pub unblock_at: DateTime<Utc>,
    /// Whole days until `unblock_at`, rounded up.
    pub days_remaining: i64,
}

impl ScheduledUnblock {
    /// User-facing confirmation text.
    #[must_use]
    pub fn description(&self) -> String {
        format!(
            "Number will be unblocked in {} {}",
            self.days_remaining,
            if self.days_remaining == 1 { "day" } else { "days" }
        )
    }
}

/// Converts a day count entered by the user into a retention duration.
///
/// No validation happens here; the engine rejects non-positive durations.
#[must_use]
pub fn retention_days(days: i64) -> Duration {
    Duration::try_days(days).unwrap_or(if days < 0 {
        Duration::MIN
    } else {
        Duration::MAX
    })
}

/// Whole days in `remaining`, counting any partial day as a full one.
///
/// Non-positive durations yield zero.
#[must_use]
pub fn days_remaining(remaining: Duration) -> i64 {
    if remaining <= Duration::zero() {
        return 0;
    }
    let days = remaining.num_days();
    if remaining - Duration::days(days) > Duration::zero() {
        days + 1
    } else {
        days
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_indefinite_record_is_active() {
        let record = BlockRecord::new("+15551230000", at(0));
        assert!(record.is_active(at(10_000_000)));
        assert!(!record.has_pending_retention(at(0)));
        assert_eq!(record.time_remaining(at(0)), None);
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let mut record = BlockRecord::new("+15551230000", at(0));
        record.unblock_at = Some(at(100));
        record.retention_armed = true;

        assert!(record.is_active(at(99)));
        assert!(record.has_pending_retention(at(99)));
        assert!(record.is_expired(at(100)));
        assert!(!record.has_pending_retention(at(100)));
    }

    #[test]
    fn test_days_remaining_rounds_up() {
        assert_eq!(days_remaining(Duration::hours(25)), 2);
        assert_eq!(days_remaining(Duration::hours(48)), 2);
        assert_eq!(days_remaining(Duration::hours(48) + Duration::seconds(1)), 3);
        assert_eq!(days_remaining(Duration::milliseconds(1)), 1);
    }

    #[test]
    fn test_days_remaining_non_positive() {
        assert_eq!(days_remaining(Duration::zero()), 0);
        assert_eq!(days_remaining(Duration::hours(-5)), 0);
    }

    #[test]
    fn test_retention_days() {
        assert_eq!(retention_days(3), Duration::days(3));
        assert_eq!(retention_days(-1), Duration::days(-1));
        assert_eq!(retention_days(i64::MAX), Duration::MAX);
    }

    #[test]
    fn test_description_pluralizes() {
        let mut scheduled = ScheduledUnblock {
            identifier: "+1".into(),
            unblock_at: at(0),
            days_remaining: 1,
        };
        assert_eq!(scheduled.description(), "Number will be unblocked in 1 day");
        scheduled.days_remaining = 3;
        assert_eq!(scheduled.description(), "Number will be unblocked in 3 days");
    }
}
