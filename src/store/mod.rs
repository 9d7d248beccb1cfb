//! Storage seams: sample source, scalar state, and the watermark.
//!
//! The pipeline reads raw samples and persists a single resume point (the
//! watermark) through narrow traits so the sled backend can be swapped for
//! an in-memory store in tests without touching pipeline code.

mod memory;
mod sled_store;

pub use memory::{MemorySource, MemoryState};
pub use sled_store::SledTelemetryStore;

use crate::types::RawRow;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("watermark must advance: current {current}, attempted {attempted}")]
    NonMonotonicWatermark {
        current: DateTime<Utc>,
        attempted: DateTime<Utc>,
    },
}

/// Read-only source of raw sample rows.
///
/// Implementations must return rows in ascending timestamp order.
pub trait SampleSource: Send + Sync {
    /// Rows with `start <= timestamp < end`.
    fn fetch_rows(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<RawRow>, StoreError>;

    /// Timestamp of the newest stored row, if any.
    fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Timestamp of the oldest stored row, if any.
    fn earliest_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// The single most recent row strictly before `before`, for seeding the
    /// forward-fill cache. One lookup, independent of batch size.
    fn most_recent_before(&self, before: DateTime<Utc>) -> Result<Option<RawRow>, StoreError>;
}

/// Durable string key-value state.
pub trait StateStore: Send + Sync {
    fn get_state(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Persist a value durably; returns only after the write is flushed.
    fn set_state(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key, durably. Removing an absent key is not an error.
    fn delete_state(&self, key: &str) -> Result<(), StoreError>;
}

/// State key under which the watermark is persisted.
const WATERMARK_KEY: &str = "watermark.v1";

/// The resume point: end-time of the last successfully delivered window.
///
/// Advanced only after confirmed delivery, never rolled back. A crash
/// between delivery and persistence resolves as redelivery of the same
/// window on restart (at-least-once by design).
#[derive(Clone)]
pub struct WatermarkStore {
    state: Arc<dyn StateStore>,
}

impl WatermarkStore {
    pub fn new(state: Arc<dyn StateStore>) -> Self {
        Self { state }
    }

    /// Current watermark, or `None` if no window was ever delivered.
    pub fn get(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        match self.state.get_state(WATERMARK_KEY)? {
            None => Ok(None),
            Some(raw) => {
                let parsed = DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| StoreError::Serialization(format!("bad watermark '{raw}': {e}")))?;
                Ok(Some(parsed.with_timezone(&Utc)))
            }
        }
    }

    /// Advance the watermark to a strictly later instant, durably.
    pub fn advance(&self, new_end: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(current) = self.get()? {
            if new_end <= current {
                return Err(StoreError::NonMonotonicWatermark {
                    current,
                    attempted: new_end,
                });
            }
        }
        self.state
            .set_state(WATERMARK_KEY, &new_end.to_rfc3339())?;
        debug!(watermark = %new_end, "Watermark advanced");
        Ok(())
    }

    /// Forget the watermark entirely. The next run starts from the
    /// earliest stored telemetry and will redeliver everything.
    pub fn reset(&self) -> Result<(), StoreError> {
        self.state.delete_state(WATERMARK_KEY)
    }
}
