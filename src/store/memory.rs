//! In-memory store implementations for tests and minimal deployments.
//! Not durable; data is lost on restart.

use super::{SampleSource, StateStore, StoreError};
use crate::types::RawRow;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// Fixed set of rows served from memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    rows: Vec<RawRow>,
}

impl MemorySource {
    /// Build from a row set; rows are sorted by timestamp on construction.
    pub fn new(mut rows: Vec<RawRow>) -> Self {
        rows.sort_by_key(|r| r.timestamp);
        Self { rows }
    }
}

impl SampleSource for MemorySource {
    fn fetch_rows(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<RawRow>, StoreError> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp < end)
            .cloned()
            .collect())
    }

    fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.rows.last().map(|r| r.timestamp))
    }

    fn earliest_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.rows.first().map(|r| r.timestamp))
    }

    fn most_recent_before(&self, before: DateTime<Utc>) -> Result<Option<RawRow>, StoreError> {
        Ok(self
            .rows
            .iter()
            .rev()
            .find(|r| r.timestamp < before)
            .cloned())
    }
}

/// Thread-safe in-memory key-value state.
#[derive(Debug, Default)]
pub struct MemoryState {
    entries: RwLock<HashMap<String, String>>,
}

impl StateStore for MemoryState {
    fn get_state(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set_state(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_state(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row_at(m: u32) -> RawRow {
        RawRow::empty(Utc.with_ymd_and_hms(2025, 5, 1, 10, m, 0).unwrap())
    }

    #[test]
    fn unsorted_input_is_served_sorted() {
        let source = MemorySource::new(vec![row_at(9), row_at(1), row_at(5)]);
        let rows = source
            .fetch_rows(
                Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 5, 1, 11, 0, 0).unwrap(),
            )
            .unwrap();
        assert!(rows.windows(2).all(|p| p[0].timestamp < p[1].timestamp));
    }

    #[test]
    fn state_roundtrips() {
        let state = MemoryState::default();
        assert_eq!(state.get_state("k").unwrap(), None);
        state.set_state("k", "v").unwrap();
        assert_eq!(state.get_state("k").unwrap().as_deref(), Some("v"));
    }
}
