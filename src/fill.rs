//! Forward-filler: turns a chronological batch of raw rows into fully
//! populated cleaned rows.
//!
//! The cache is scoped to one processing run and seeded once from the most
//! recent persisted sample strictly before the batch, so continuity holds
//! across window and run boundaries. Cache entries only ever hold values
//! that already passed validation; a fill never needs re-validation and
//! never flips a row's validity flag.

use crate::channels::{CHANNELS, CHANNEL_COUNT};
use crate::types::{CleanedRow, RawRow};
use crate::validate::validate_channel;
use tracing::debug;

/// Value used when a channel has never produced a valid reading, in this
/// run or in history.
pub const DEFAULT_FILL: f64 = 0.0;

/// Per-run cache of the last valid value seen for each channel.
#[derive(Debug, Clone, Default)]
pub struct FillCache {
    values: [Option<f64>; CHANNEL_COUNT],
}

impl FillCache {
    /// Empty cache, every channel unseeded.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Seed the cache from a historical row, validating each value against
    /// its channel range. Channels whose historical value fails validation
    /// remain unseeded.
    pub fn seed_from(row: &RawRow) -> Self {
        let mut cache = Self::empty();
        for (idx, spec) in CHANNELS.iter().enumerate() {
            cache.values[idx] = validate_channel(row.values[idx], spec);
        }
        debug!(
            seeded = cache.seeded_count(),
            total = CHANNEL_COUNT,
            "Forward-fill cache seeded from history"
        );
        cache
    }

    /// Record a freshly validated value. Last one wins; entries are never
    /// cleared.
    pub fn observe(&mut self, idx: usize, value: f64) {
        self.values[idx] = Some(value);
    }

    /// Current cached value for a channel, if any reading has ever been
    /// valid.
    pub fn get(&self, idx: usize) -> Option<f64> {
        self.values[idx]
    }

    /// Number of channels with a cached value.
    pub fn seeded_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Clean a chronologically ordered batch of raw rows.
///
/// For each row and channel: a valid reading becomes the cleaned value
/// (flag true) and updates the cache; an invalid reading takes the cached
/// value (flag false), or [`DEFAULT_FILL`] if the channel has never been
/// seeded.
pub fn clean_batch(rows: &[RawRow], cache: &mut FillCache) -> Vec<CleanedRow> {
    let mut cleaned = Vec::with_capacity(rows.len());

    for row in rows {
        let mut values = [DEFAULT_FILL; CHANNEL_COUNT];
        let mut was_valid = [false; CHANNEL_COUNT];

        for (idx, spec) in CHANNELS.iter().enumerate() {
            match validate_channel(row.values[idx], spec) {
                Some(v) => {
                    values[idx] = v;
                    was_valid[idx] = true;
                    cache.observe(idx, v);
                }
                None => {
                    if let Some(last) = cache.get(idx) {
                        values[idx] = last;
                    }
                    // else: never seen a valid reading, DEFAULT_FILL stands
                }
            }
        }

        cleaned.push(CleanedRow {
            timestamp: row.timestamp,
            values,
            was_valid,
        });
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const RAIN_1: usize = 0;
    const DHT_TEMP_1: usize = 6;

    fn row_at(sec: u32) -> RawRow {
        RawRow::empty(Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, sec).unwrap())
    }

    #[test]
    fn valid_values_pass_through_and_update_cache() {
        let mut r1 = row_at(1);
        r1.values[RAIN_1] = Some(2.7);
        let mut r2 = row_at(2);
        r2.values[RAIN_1] = None;

        let mut cache = FillCache::empty();
        let cleaned = clean_batch(&[r1, r2], &mut cache);

        assert_eq!(cleaned[0].values[RAIN_1], 2.7);
        assert!(cleaned[0].was_valid[RAIN_1]);
        assert_eq!(cleaned[1].values[RAIN_1], 2.7); // forward-filled
        assert!(!cleaned[1].was_valid[RAIN_1]);
        assert_eq!(cache.get(RAIN_1), Some(2.7));
    }

    #[test]
    fn out_of_range_is_filled_not_propagated() {
        let mut r1 = row_at(1);
        r1.values[DHT_TEMP_1] = Some(25.0);
        let mut r2 = row_at(2);
        r2.values[DHT_TEMP_1] = Some(200.0); // above 60 °C ceiling

        let mut cache = FillCache::empty();
        let cleaned = clean_batch(&[r1, r2], &mut cache);

        assert_eq!(cleaned[1].values[DHT_TEMP_1], 25.0);
        assert!(!cleaned[1].was_valid[DHT_TEMP_1]);
        // Cache still holds the last valid value, not the garbled one.
        assert_eq!(cache.get(DHT_TEMP_1), Some(25.0));
    }

    #[test]
    fn never_valid_channel_defaults_to_zero() {
        let rows = vec![row_at(1), row_at(2), row_at(3)];
        let mut cache = FillCache::empty();
        let cleaned = clean_batch(&rows, &mut cache);

        for row in &cleaned {
            assert_eq!(row.values[RAIN_1], DEFAULT_FILL);
            assert!(!row.was_valid[RAIN_1]);
        }
        assert_eq!(cache.get(RAIN_1), None);
    }

    #[test]
    fn seeding_bridges_the_batch_start() {
        let mut history = row_at(0);
        history.values[RAIN_1] = Some(1.5);
        let mut cache = FillCache::seed_from(&history);

        let rows = vec![row_at(1)];
        let cleaned = clean_batch(&rows, &mut cache);

        assert_eq!(cleaned[0].values[RAIN_1], 1.5);
        assert!(!cleaned[0].was_valid[RAIN_1]);
    }

    #[test]
    fn seeding_validates_historical_values() {
        let mut history = row_at(0);
        history.values[RAIN_1] = Some(500.0); // out of 0–100 range
        let cache = FillCache::seed_from(&history);
        assert_eq!(cache.get(RAIN_1), None);
    }

    #[test]
    fn coverage_is_monotonic_within_a_batch() {
        // Once a channel has seen a valid value, no later row reports the
        // default.
        let mut rows: Vec<RawRow> = (0..10).map(row_at).collect();
        rows[3].values[RAIN_1] = Some(4.2);
        rows[7].values[RAIN_1] = Some(5.1);

        let mut cache = FillCache::empty();
        let cleaned = clean_batch(&rows, &mut cache);

        for (i, row) in cleaned.iter().enumerate() {
            if i < 3 {
                assert_eq!(row.values[RAIN_1], DEFAULT_FILL);
            } else {
                assert_ne!(row.values[RAIN_1], DEFAULT_FILL);
            }
        }
        assert_eq!(cleaned[6].values[RAIN_1], 4.2);
        assert_eq!(cleaned[9].values[RAIN_1], 5.1);
    }
}
