//! Stat aggregator: per-channel statistics over one window.
//!
//! Average/min/max run over the forward-filled values (never missing);
//! health runs over the pre-fill validity flags. The two deliberately see
//! different data: a fully forward-filled window can have a perfect average
//! and a health of 0.

use crate::channels::CHANNEL_COUNT;
use crate::types::{ChannelStat, CleanedRow};

/// Round to four decimal places, matching the backend's expected precision.
pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Health percentage: rounded share of originally valid samples.
fn health_percent(valid: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = (100.0 * valid as f64 / total as f64).round() as u8;
    pct
}

/// Compute statistics for one channel across the rows of a window.
///
/// With zero rows this returns all-zero stats rather than nulls; the output
/// schema has no optional fields.
pub fn channel_stat(rows: &[CleanedRow], idx: usize) -> ChannelStat {
    debug_assert!(idx < CHANNEL_COUNT);

    if rows.is_empty() {
        return ChannelStat::default();
    }

    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut valid = 0usize;

    for row in rows {
        let v = row.values[idx];
        sum += v;
        min = min.min(v);
        max = max.max(v);
        if row.was_valid[idx] {
            valid += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let average = round4(sum / rows.len() as f64);

    ChannelStat {
        average,
        min,
        max,
        health: health_percent(valid, rows.len()),
    }
}

/// Compute statistics for every channel at once.
pub fn window_stats(rows: &[CleanedRow]) -> [ChannelStat; CHANNEL_COUNT] {
    let mut stats = [ChannelStat::default(); CHANNEL_COUNT];
    for (idx, slot) in stats.iter_mut().enumerate() {
        *slot = channel_stat(rows, idx);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    const RAIN_1: usize = 0;

    fn row(sec: u32, value: f64, valid: bool) -> CleanedRow {
        let mut values = [0.0; CHANNEL_COUNT];
        let mut was_valid = [false; CHANNEL_COUNT];
        values[RAIN_1] = value;
        was_valid[RAIN_1] = valid;
        CleanedRow {
            timestamp: Utc.with_ymd_and_hms(2025, 5, 1, 10, 5, 0).unwrap()
                + Duration::seconds(i64::from(sec)),
            values,
            was_valid,
        }
    }

    #[test]
    fn worked_example_two_valid_samples() {
        // rain_1 = 2.70 and 2.91, both valid.
        let rows = vec![row(21, 2.70, true), row(23, 2.91, true)];
        let stat = channel_stat(&rows, RAIN_1);
        assert_eq!(stat.average, 2.805);
        assert_eq!(stat.min, 2.70);
        assert_eq!(stat.max, 2.91);
        assert_eq!(stat.health, 100);
    }

    #[test]
    fn forward_filled_sample_counts_toward_average_not_health() {
        // Third row forward-fills 2.91: average moves, health drops to
        // round(2/3 · 100) = 67.
        let rows = vec![row(21, 2.70, true), row(23, 2.91, true), row(60, 2.91, false)];
        let stat = channel_stat(&rows, RAIN_1);
        assert_eq!(stat.average, round4((2.70 + 2.91 + 2.91) / 3.0));
        assert_eq!(stat.health, 67);
    }

    #[test]
    fn zero_rows_yield_zeros_not_nulls() {
        let stat = channel_stat(&[], RAIN_1);
        assert_eq!(stat, ChannelStat::default());
    }

    #[test]
    fn health_is_independent_of_values() {
        // Identical values, different validity: same average, different health.
        let all_valid = vec![row(1, 5.0, true), row(2, 5.0, true)];
        let half_valid = vec![row(1, 5.0, true), row(2, 5.0, false)];
        let a = channel_stat(&all_valid, RAIN_1);
        let b = channel_stat(&half_valid, RAIN_1);
        assert_eq!(a.average, b.average);
        assert_eq!(a.health, 100);
        assert_eq!(b.health, 50);
    }

    #[test]
    fn average_rounds_to_four_decimals() {
        let rows = vec![row(1, 1.0, true), row(2, 2.0, true), row(3, 2.0, true)];
        let stat = channel_stat(&rows, RAIN_1);
        assert_eq!(stat.average, 1.6667);
    }

    #[test]
    fn window_stats_covers_all_channels() {
        let rows = vec![row(1, 3.0, true)];
        let stats = window_stats(&rows);
        assert_eq!(stats[RAIN_1].average, 3.0);
        // Channels with no valid readings in the fixture are all-zero fills.
        assert_eq!(stats[5].health, 0);
    }
}
