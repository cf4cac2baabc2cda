//! Time utilities.
//!
//! Wall-clock timestamps plus the event-time normalization used at the
//! adapter boundary. Sources report trade times in incompatible shapes
//! (epoch milliseconds as a number, epoch seconds or microseconds as decimal
//! strings, ISO-8601 strings); everything is converted to **epoch
//! milliseconds** before a record enters the buffer.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

/// Current wall-clock time as **milliseconds** since Unix epoch.
#[inline]
pub fn now_ms() -> u64 {
    let d = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    d.as_millis() as u64
}

/// Current wall-clock time as **microseconds** since Unix epoch.
#[inline]
pub fn now_us() -> u64 {
    let d = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    d.as_micros() as u64
}

/// Normalize a JSON event-time value to epoch milliseconds.
///
/// Accepts either an epoch-millisecond number or an ISO-8601 / RFC 3339
/// string (e.g. `"2017-10-19T16:45:42.312Z"`). Returns `None` for anything
/// else.
pub fn event_time_ms(v: &Value) -> Option<u64> {
    if let Some(ms) = v.as_u64() {
        return Some(ms);
    }
    let s = v.as_str()?;
    let dt = chrono::DateTime::parse_from_rfc3339(s).ok()?;
    u64::try_from(dt.timestamp_millis()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_millis_pass_through() {
        assert_eq!(event_time_ms(&serde_json::json!(1700000000000u64)), Some(1700000000000));
    }

    #[test]
    fn iso_string_is_parsed() {
        let v = serde_json::json!("2017-10-19T16:45:42.312Z");
        assert_eq!(event_time_ms(&v), Some(1508431542312));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(event_time_ms(&serde_json::json!("not a time")), None);
        assert_eq!(event_time_ms(&serde_json::json!(-5)), None);
        assert_eq!(event_time_ms(&serde_json::json!({"t": 1})), None);
    }

    #[test]
    fn now_ms_is_sane() {
        // Past 2020-01-01, below 3000-01-01.
        let ms = now_ms();
        assert!(ms > 1_577_836_800_000);
        assert!(ms < 32_503_680_000_000);
    }
}
