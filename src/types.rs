//! Shared data structures for the aggregation and delivery pipeline.
//!
//! - Ingest: `RawRow` (one sample set per source timestamp, values may be missing)
//! - Cleaning: `CleanedRow` (fully populated values + pre-fill validity flags)
//! - Windowing: `Window` (epoch-aligned half-open interval)
//! - Aggregation: `ChannelStat` (average/min/max/health per channel)
//! - Delivery: `DeliveryOutcome`, `AuthSession`

use crate::channels::CHANNEL_COUNT;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Ingest
// ============================================================================

/// One raw sample set as produced by the acquisition layer.
///
/// `values` is indexed parallel to [`crate::channels::CHANNELS`]. A `None`
/// entry means the sensor read failed or the column was null at ingest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawRow {
    pub timestamp: DateTime<Utc>,
    pub values: [Option<f64>; CHANNEL_COUNT],
}

impl RawRow {
    /// Row with every channel missing, for builder-style construction.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            values: [None; CHANNEL_COUNT],
        }
    }
}

// ============================================================================
// Cleaning
// ============================================================================

/// A row after validation and forward-fill.
///
/// Every channel has a value. `was_valid` records whether the value came
/// from this row's own reading (pre-fill state); filling never rewrites it.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRow {
    pub timestamp: DateTime<Utc>,
    pub values: [f64; CHANNEL_COUNT],
    pub was_valid: [bool; CHANNEL_COUNT],
}

// ============================================================================
// Windowing
// ============================================================================

/// A fixed-duration, epoch-aligned half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} .. {})",
            self.start.format("%Y-%m-%dT%H:%M:%SZ"),
            self.end.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Per-channel statistics over one window.
///
/// `average`/`min`/`max` are computed over forward-filled values and are
/// never null; `health` is the rounded percentage of originally valid
/// samples (pre-fill flags).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStat {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub health: u8,
}

impl Default for ChannelStat {
    fn default() -> Self {
        Self {
            average: 0.0,
            min: 0.0,
            max: 0.0,
            health: 0,
        }
    }
}

// ============================================================================
// Delivery
// ============================================================================

/// Classified result of attempting to deliver one window payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Backend accepted the payload (2xx). The watermark may advance.
    Delivered,
    /// Credentials were rejected even after a single re-login. Fatal for
    /// the remaining windows of this run.
    AuthRejected,
    /// Network error, timeout, or unexpected status. Fatal for the
    /// remaining windows of this run.
    TransportFailure,
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOutcome::Delivered => write!(f, "delivered"),
            DeliveryOutcome::AuthRejected => write!(f, "auth rejected"),
            DeliveryOutcome::TransportFailure => write!(f, "transport failure"),
        }
    }
}

/// Authenticated session established by a login.
///
/// The backend normally returns a bearer token via a `token=` cookie or a
/// JSON body field. Some deployments accept the login but hand back no
/// extractable token; that is a real (if fragile) session state, tracked
/// explicitly rather than as a sentinel string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSession {
    /// Explicit bearer token.
    Token(String),
    /// Login succeeded but no token was found in headers or body.
    Implicit,
}
