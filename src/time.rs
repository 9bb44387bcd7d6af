//! Chromium timestamp conversion.
//!
//! Chromium stores times as microseconds since 1601-01-01 UTC. The importer
//! has always converted them with a lossy integer formula that goes through
//! FILETIME ticks (100ns), then milliseconds, then seconds. Downstream stores
//! compare against values produced this way, so the truncation order must not
//! change.

use chrono::{DateTime, Utc};

/// 1601-01-01 to 1970-01-01 in 100ns FILETIME ticks.
pub const FILETIME_UNIX_OFFSET: i64 = 0x19DB1DED53E8000;

/// Convert a Chromium timestamp to whole Unix seconds, as `f64`.
///
/// `((time * 10 - FILETIME_UNIX_OFFSET) / 10000) / 1000`, each division
/// truncating toward zero. Evaluated in `i128` so the multiplication cannot
/// overflow for any `i64` input.
pub fn chrome_time_to_double(time: i64) -> f64 {
    let ticks = i128::from(time) * 10 - i128::from(FILETIME_UNIX_OFFSET);
    let millis = ticks / 10_000;
    (millis / 1_000) as f64
}

/// Convert the output of [`chrome_time_to_double`] into a UTC datetime.
///
/// Returns `None` when the value is outside chrono's range.
pub fn unix_seconds_to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    DateTime::from_timestamp(seconds as i64, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_is_windows_epoch() {
        assert_eq!(chrome_time_to_double(0), -11_644_473_600.0);
    }

    #[test]
    fn test_known_timestamp() {
        // 2024-01-01 00:00:00 UTC
        let chrome = 1_704_067_200_i64 * 1_000_000 + 11_644_473_600_000_000;
        assert_eq!(chrome_time_to_double(chrome), 1_704_067_200.0);

        let dt = unix_seconds_to_datetime(chrome_time_to_double(chrome)).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_sub_second_precision_is_dropped() {
        let chrome = 1_704_067_200_i64 * 1_000_000 + 11_644_473_600_000_000 + 999_999;
        assert_eq!(chrome_time_to_double(chrome), 1_704_067_200.0);
    }

    #[test]
    fn test_truncates_toward_zero_before_unix_epoch() {
        // One millisecond before 1970: truncation toward zero lands on 0, not -1.
        let chrome = 11_644_473_600_000_000 - 1_000;
        assert_eq!(chrome_time_to_double(chrome), 0.0);
    }

    #[test]
    fn test_extremes_do_not_overflow() {
        assert!(chrome_time_to_double(i64::MAX) > 0.0);
        assert!(chrome_time_to_double(i64::MIN) < 0.0);
    }

    proptest! {
        #[test]
        fn prop_monotonic(a in any::<i64>(), b in any::<i64>()) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(chrome_time_to_double(lo) <= chrome_time_to_double(hi));
        }
    }
}
