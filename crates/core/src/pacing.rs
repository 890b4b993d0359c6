//! Response pacing.
//!
//! Replies are delayed just enough to make the total turnaround look human:
//! the configured target latency minus the time already spent debouncing and
//! processing. Backlogged turns (oldest message older than ten minutes) are
//! answered immediately, unpaced.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Messages older than this at processing time are treated as backlog.
pub const BACKLOG_THRESHOLD_MS: i64 = 10 * 60 * 1000;

pub fn is_backlogged(message_timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let age_ms = now.signed_duration_since(message_timestamp).num_milliseconds();
    age_ms > BACKLOG_THRESHOLD_MS
}

/// Remaining wait before replying, never negative.
///
/// Returns zero when the message is backlogged, when pacing is disabled
/// (`target_ms <= 0`), or when processing already consumed the target.
pub fn response_delay(
    message_timestamp: DateTime<Utc>,
    processing_start: DateTime<Utc>,
    target_ms: i64,
) -> Duration {
    if is_backlogged(message_timestamp, processing_start) {
        return Duration::ZERO;
    }
    if target_ms <= 0 {
        return Duration::ZERO;
    }

    let elapsed_ms = processing_start.signed_duration_since(message_timestamp).num_milliseconds();
    let remaining_ms = (target_ms - elapsed_ms).max(0);
    Duration::from_millis(remaining_ms as u64)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeDelta, Utc};

    use super::{is_backlogged, response_delay};

    #[test]
    fn pads_up_to_the_target_latency() {
        let message = Utc::now();
        let start = message + TimeDelta::milliseconds(500);
        assert_eq!(response_delay(message, start, 2_300), Duration::from_millis(1_800));
    }

    #[test]
    fn slow_processing_leaves_no_remaining_delay() {
        let message = Utc::now();
        let start = message + TimeDelta::milliseconds(5_000);
        assert_eq!(response_delay(message, start, 2_300), Duration::ZERO);
    }

    #[test]
    fn backlogged_turns_are_answered_immediately() {
        let now = Utc::now();
        let stale = now - TimeDelta::minutes(11);
        assert!(is_backlogged(stale, now));
        assert_eq!(response_delay(stale, now, 2_300), Duration::ZERO);

        let fresh = now - TimeDelta::minutes(9);
        assert!(!is_backlogged(fresh, now));
    }

    #[test]
    fn disabled_pacing_returns_zero() {
        let message = Utc::now();
        assert_eq!(response_delay(message, message, 0), Duration::ZERO);
        assert_eq!(response_delay(message, message, -100), Duration::ZERO);
    }
}
