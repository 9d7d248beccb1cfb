//! Sled-backed telemetry store.
//!
//! Two trees in one database: `samples` keyed by big-endian millisecond
//! timestamps (sorts chronologically, so range scans are cheap) with JSON
//! row values, and `state` for scalar key-value entries like the watermark.
//! Sample writes rely on sled's background flushing; state writes flush
//! explicitly because the watermark must be durable before the run
//! proceeds to the next window.

use super::{SampleSource, StateStore, StoreError};
use crate::types::RawRow;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Sled database holding raw samples and pipeline state.
#[derive(Clone)]
pub struct SledTelemetryStore {
    db: Arc<sled::Db>,
    samples: sled::Tree,
    state: sled::Tree,
}

#[allow(clippy::cast_sign_loss)]
fn ts_key(t: DateTime<Utc>) -> [u8; 8] {
    (t.timestamp_millis() as u64).to_be_bytes()
}

fn decode_row(value: &[u8]) -> Option<RawRow> {
    match serde_json::from_slice::<RawRow>(value) {
        Ok(row) => Some(row),
        Err(e) => {
            warn!(error = %e, "Skipping corrupt sample row");
            None
        }
    }
}

impl SledTelemetryStore {
    /// Open or create the store at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let samples = db.open_tree("samples")?;
        let state = db.open_tree("state")?;
        Ok(Self {
            db: Arc::new(db),
            samples,
            state,
        })
    }

    /// Insert one raw sample row, keyed by its timestamp.
    pub fn insert_row(&self, row: &RawRow) -> Result<(), StoreError> {
        let value = serde_json::to_vec(row)?;
        self.samples.insert(ts_key(row.timestamp), value)?;
        Ok(())
    }

    /// Number of stored sample rows.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Wipe all samples and state. Destructive; behind `--reset-db`.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.samples.clear()?;
        self.state.clear()?;
        self.db.flush()?;
        Ok(())
    }
}

impl SampleSource for SledTelemetryStore {
    fn fetch_rows(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<RawRow>, StoreError> {
        let mut rows = Vec::new();
        for item in self.samples.range(ts_key(start)..ts_key(end)) {
            let (_key, value) = item?;
            if let Some(row) = decode_row(&value) {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        match self.samples.last()? {
            Some((_key, value)) => Ok(decode_row(&value).map(|r| r.timestamp)),
            None => Ok(None),
        }
    }

    fn earliest_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        match self.samples.first()? {
            Some((_key, value)) => Ok(decode_row(&value).map(|r| r.timestamp)),
            None => Ok(None),
        }
    }

    fn most_recent_before(&self, before: DateTime<Utc>) -> Result<Option<RawRow>, StoreError> {
        for item in self.samples.range(..ts_key(before)).rev() {
            let (_key, value) = item?;
            if let Some(row) = decode_row(&value) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }
}

impl StateStore for SledTelemetryStore {
    fn get_state(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.state.get(key.as_bytes())? {
            Some(value) => Ok(Some(
                String::from_utf8(value.to_vec())
                    .map_err(|e| StoreError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    fn set_state(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.state.insert(key.as_bytes(), value.as_bytes())?;
        // Durable before the caller moves on.
        self.state.flush()?;
        Ok(())
    }

    fn delete_state(&self, key: &str) -> Result<(), StoreError> {
        self.state.remove(key.as_bytes())?;
        self.state.flush()?;
        Ok(())
    }
}
