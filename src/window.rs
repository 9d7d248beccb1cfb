//! Window partitioner: epoch-aligned window enumeration and row assignment.
//!
//! Alignment is defined against a fixed epoch (midnight UTC), never against
//! the first sample seen: every window start is an integer multiple of the
//! period. Only windows whose end lies at or before the latest available
//! sample (plus a small jitter tolerance) are eligible; a window still
//! receiving data must not be processed.

use crate::types::{CleanedRow, Window};
use chrono::{DateTime, Duration, Utc};

/// Clock jitter absorbed at the eligibility boundary.
const BOUNDARY_TOLERANCE_SECS: i64 = 1;

/// Floor a timestamp to the period grid (epoch = midnight UTC).
pub fn align_floor(t: DateTime<Utc>, period: Duration) -> DateTime<Utc> {
    let period_secs = period.num_seconds().max(1);
    let rem = t.timestamp().rem_euclid(period_secs);
    t - Duration::seconds(rem) - Duration::nanoseconds(i64::from(t.timestamp_subsec_nanos()))
}

/// First period-aligned boundary at or after a timestamp.
pub fn align_ceil(t: DateTime<Utc>, period: Duration) -> DateTime<Utc> {
    let floored = align_floor(t, period);
    if floored == t {
        floored
    } else {
        floored + period
    }
}

/// Enumerate the windows eligible for processing in one run.
///
/// Starting from the watermark, windows are emitted in strictly increasing
/// start order while their end does not exceed the latest available sample
/// timestamp (with tolerance). The first window never starts before the
/// watermark: an already-delivered interval must not be re-emitted.
pub fn eligible_windows(
    watermark: DateTime<Utc>,
    latest: DateTime<Utc>,
    period: Duration,
) -> Vec<Window> {
    let horizon = latest + Duration::seconds(BOUNDARY_TOLERANCE_SECS);
    let mut start = align_ceil(watermark, period);
    let mut windows = Vec::new();

    while start + period <= horizon {
        windows.push(Window {
            start,
            end: start + period,
        });
        start += period;
    }

    windows
}

/// Partition a chronologically sorted batch of cleaned rows by window.
///
/// Returns one sub-slice per window, in window order. Each row lands in
/// exactly one window (the interval containing its timestamp); rows outside
/// every window are dropped.
pub fn partition<'a>(rows: &'a [CleanedRow], windows: &[Window]) -> Vec<&'a [CleanedRow]> {
    windows
        .iter()
        .map(|w| {
            let lo = rows.partition_point(|r| r.timestamp < w.start);
            let hi = rows.partition_point(|r| r.timestamp < w.end);
            &rows[lo..hi]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::CHANNEL_COUNT;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, h, m, s).unwrap()
    }

    fn five_min() -> Duration {
        Duration::minutes(5)
    }

    fn cleaned_at(t: DateTime<Utc>) -> CleanedRow {
        CleanedRow {
            timestamp: t,
            values: [0.0; CHANNEL_COUNT],
            was_valid: [false; CHANNEL_COUNT],
        }
    }

    #[test]
    fn alignment_is_relative_to_epoch() {
        assert_eq!(align_floor(at(10, 7, 33), five_min()), at(10, 5, 0));
        assert_eq!(align_floor(at(10, 5, 0), five_min()), at(10, 5, 0));
        assert_eq!(align_ceil(at(10, 7, 33), five_min()), at(10, 10, 0));
        assert_eq!(align_ceil(at(10, 5, 0), five_min()), at(10, 5, 0));
    }

    #[test]
    fn every_window_start_is_a_period_multiple() {
        let windows = eligible_windows(at(10, 3, 17), at(11, 0, 0), five_min());
        assert!(!windows.is_empty());
        for w in &windows {
            assert_eq!(w.start.timestamp() % 300, 0);
            assert_eq!(w.end - w.start, five_min());
        }
    }

    #[test]
    fn first_window_never_starts_before_watermark() {
        // Flooring 10:03:17 would give 10:00, before data already
        // delivered. The first eligible start must be 10:05.
        let windows = eligible_windows(at(10, 3, 17), at(11, 0, 0), five_min());
        assert_eq!(windows[0].start, at(10, 5, 0));
    }

    #[test]
    fn incomplete_window_is_not_eligible() {
        // Latest sample at 10:09:58; the [10:05, 10:10) window is still
        // open and must wait.
        let windows = eligible_windows(at(10, 5, 0), at(10, 9, 58), five_min());
        assert!(windows.is_empty());
    }

    #[test]
    fn tolerance_absorbs_boundary_jitter() {
        // Latest at 10:09:59 + 1 s tolerance reaches the 10:10 boundary.
        let windows = eligible_windows(at(10, 5, 0), at(10, 9, 59), five_min());
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].end, at(10, 10, 0));
    }

    #[test]
    fn windows_are_consecutive_and_ordered() {
        let windows = eligible_windows(at(10, 0, 0), at(10, 20, 0), five_min());
        assert_eq!(windows.len(), 4);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn partition_assigns_each_row_exactly_once() {
        let windows = eligible_windows(at(10, 0, 0), at(10, 10, 0), five_min());
        let rows = vec![
            cleaned_at(at(10, 0, 30)),
            cleaned_at(at(10, 4, 59)),
            cleaned_at(at(10, 5, 0)), // boundary row → second window
            cleaned_at(at(10, 9, 59)),
        ];

        let parts = partition(&rows, &windows);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 2);
        assert_eq!(parts[1].len(), 2);
        assert_eq!(parts[1][0].timestamp, at(10, 5, 0));
    }

    #[test]
    fn rows_before_first_window_are_dropped() {
        // An unaligned watermark (earliest-data fallback) leaves a partial
        // lead-in that belongs to no complete window.
        let windows = eligible_windows(at(10, 2, 30), at(10, 10, 0), five_min());
        assert_eq!(windows[0].start, at(10, 5, 0));

        let rows = vec![cleaned_at(at(10, 3, 0)), cleaned_at(at(10, 6, 0))];
        let parts = partition(&rows, &windows);
        assert_eq!(parts[0].len(), 1);
        assert_eq!(parts[0][0].timestamp, at(10, 6, 0));
    }
}
