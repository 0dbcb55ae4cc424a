//! Decoding of backend-assigned message identifiers.
//!
//! Message ids are 64-bit snowflakes: the upper 42 bits hold milliseconds
//! since the backend epoch, the lower 22 bits are worker/sequence counters.
//! Only the timestamp is used, and only to decide which deletion endpoint a
//! message is eligible for.

use chrono::{DateTime, TimeDelta, Utc};

/// Backend epoch (2015-01-01T00:00:00Z) in Unix milliseconds.
pub const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;

/// Number of low bits that do not encode time.
const TIMESTAMP_SHIFT: u32 = 22;

/// Creation time of `id` in Unix milliseconds, or `None` if `id` is not a
/// snowflake.
pub fn timestamp_ms(id: &str) -> Option<u64> {
    let raw: u64 = id.parse().ok()?;
    (raw >> TIMESTAMP_SHIFT).checked_add(DISCORD_EPOCH_MS)
}

/// Creation time of `id`.
pub fn created_at(id: &str) -> Option<DateTime<Utc>> {
    let ms = i64::try_from(timestamp_ms(id)?).ok()?;
    DateTime::from_timestamp_millis(ms)
}

/// Compose a snowflake from a Unix-millisecond timestamp and a sequence
/// number (truncated to 22 bits).
///
/// Timestamps before the epoch saturate to the epoch.
pub fn compose(unix_ms: u64, sequence: u64) -> u64 {
    let since_epoch = unix_ms.saturating_sub(DISCORD_EPOCH_MS);
    (since_epoch << TIMESTAMP_SHIFT) | (sequence & ((1 << TIMESTAMP_SHIFT) - 1))
}

/// Returns `true` if `id` was created strictly after `now - window`.
///
/// Ids that cannot be decoded are never considered recent.
pub fn is_recent(id: &str, window: TimeDelta, now: DateTime<Utc>) -> bool {
    created_at(id).is_some_and(|created| created > now - window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_snowflake() {
        // 175928847299117063 is the example id from the backend's documentation,
        // created 2016-04-30T11:18:25.796Z.
        assert_eq!(timestamp_ms("175928847299117063"), Some(1_462_015_105_796));
        let created = created_at("175928847299117063").unwrap();
        assert_eq!(created.to_rfc3339(), "2016-04-30T11:18:25.796+00:00");
    }

    #[test]
    fn non_numeric_ids_do_not_decode() {
        assert_eq!(timestamp_ms("not-a-number"), None);
        assert_eq!(timestamp_ms(""), None);
        assert!(created_at("-1").is_none());
    }

    #[test]
    fn compose_inverts_decode() {
        let ms = 1_700_000_000_123;
        let id = compose(ms, 42).to_string();
        assert_eq!(timestamp_ms(&id), Some(ms));
    }

    #[test]
    fn recency_against_window() {
        let now = Utc::now();
        let window = TimeDelta::days(14);
        let now_ms = u64::try_from(now.timestamp_millis()).unwrap();

        let fresh = compose(now_ms - 60_000, 0).to_string();
        let stale = compose(now_ms - 15 * 24 * 3_600_000, 0).to_string();

        assert!(is_recent(&fresh, window, now));
        assert!(!is_recent(&stale, window, now));
        assert!(!is_recent("garbage", window, now));
    }
}
