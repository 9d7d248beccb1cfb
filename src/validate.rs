//! Sample validation: total, deterministic, side-effect free.
//!
//! A raw reading survives only if it is present, finite, and inside the
//! channel's plausible range. Everything else (missing, NaN, ±inf,
//! out-of-range) maps to `None` so the forward-filler can recover it and
//! the health metric can count it as invalid. Fails closed.

use crate::channels::ChannelSpec;

/// Validate a raw reading against optional range bounds.
///
/// Returns the value unchanged when it is a finite float within
/// `[min_valid, max_valid]` (either bound may be open), `None` otherwise.
pub fn validate(raw: Option<f64>, min_valid: Option<f64>, max_valid: Option<f64>) -> Option<f64> {
    let value = raw?;

    if !value.is_finite() {
        return None;
    }
    if let Some(min) = min_valid {
        if value < min {
            return None;
        }
    }
    if let Some(max) = max_valid {
        if value > max {
            return None;
        }
    }

    Some(value)
}

/// Validate a raw reading against a channel's registered range.
pub fn validate_channel(raw: Option<f64>, spec: &ChannelSpec) -> Option<f64> {
    validate(raw, spec.min_valid, spec.max_valid)
}
