//! Backend payload assembly.
//!
//! Shapes one window's statistics into the JSON document the readings API
//! accepts: flat groups (rain, uv, light, panel_temp, solar, battery) carry
//! one entry per panel; composite sensors (dht22, ina226) nest two measures
//! per panel. Timestamps are rendered in the configured presentation offset
//! so the backend sees local wall-clock bounds.

use crate::channels::{ChannelSpec, Panel, CHANNELS, CHANNEL_COUNT};
use crate::stats::window_stats;
use crate::types::{ChannelStat, CleanedRow, Window};
use chrono::{FixedOffset, SecondsFormat};
use serde::Serialize;

/// Installed battery bank capacity (Wh), reported as a static rating.
const BATTERY_CAPACITY_WH: u32 = 12_000;

/// One panel's statistics for a flat reading group.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PanelReading {
    #[serde(rename = "panelId")]
    pub panel_id: &'static str,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub health: u8,
    pub unit: &'static str,
}

/// A single measure nested inside a composite sensor entry.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatBlock {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub unit: &'static str,
    pub health: u8,
}

/// Temperature + humidity pair from one panel's DHT22.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Dht22Reading {
    #[serde(rename = "panelId")]
    pub panel_id: &'static str,
    pub temperature: StatBlock,
    pub humidity: StatBlock,
}

/// Voltage + current pair from one panel's INA226 monitor.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Ina226Reading {
    #[serde(rename = "panelId")]
    pub panel_id: &'static str,
    pub voltage: StatBlock,
    pub current: StatBlock,
}

/// The full readings object, grouped by sensor type.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Readings {
    pub rain: Vec<PanelReading>,
    pub uv: Vec<PanelReading>,
    pub light: Vec<PanelReading>,
    pub dht22: Vec<Dht22Reading>,
    pub panel_temp: Vec<PanelReading>,
    pub ina226: Vec<Ina226Reading>,
    pub solar: Vec<PanelReading>,
    pub battery: Vec<PanelReading>,
    pub battery_capacity: u32,
}

/// Window metadata accompanying the readings.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PayloadMetadata {
    #[serde(rename = "aggregationType")]
    pub aggregation_type: String,
    #[serde(rename = "sampleCount")]
    pub sample_count: usize,
    pub timezone: String,
}

/// Complete document posted to the readings endpoint for one window.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WindowPayload {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "startTime")]
    pub start_time: String,
    #[serde(rename = "endTime")]
    pub end_time: String,
    pub metadata: PayloadMetadata,
    pub readings: Readings,
}

fn find_channel(group: &str, measure: Option<&str>, panel: Panel) -> Option<(usize, &'static ChannelSpec)> {
    CHANNELS
        .iter()
        .enumerate()
        .find(|(_, c)| c.group == group && c.measure == measure && c.panel == panel)
}

fn flat_group(stats: &[ChannelStat; CHANNEL_COUNT], group: &str) -> Vec<PanelReading> {
    [Panel::One, Panel::Two]
        .into_iter()
        .filter_map(|panel| {
            find_channel(group, None, panel).map(|(idx, spec)| PanelReading {
                panel_id: panel.id(),
                average: stats[idx].average,
                min: stats[idx].min,
                max: stats[idx].max,
                health: stats[idx].health,
                unit: spec.unit,
            })
        })
        .collect()
}

fn stat_block(stats: &[ChannelStat; CHANNEL_COUNT], group: &str, measure: &str, panel: Panel) -> StatBlock {
    find_channel(group, Some(measure), panel).map_or_else(
        || StatBlock {
            average: 0.0,
            min: 0.0,
            max: 0.0,
            unit: "",
            health: 0,
        },
        |(idx, spec)| StatBlock {
            average: stats[idx].average,
            min: stats[idx].min,
            max: stats[idx].max,
            unit: spec.unit,
            health: stats[idx].health,
        },
    )
}

/// Assemble the grouped readings object from per-channel stats.
pub fn build_readings(stats: &[ChannelStat; CHANNEL_COUNT]) -> Readings {
    let dht22 = [Panel::One, Panel::Two]
        .into_iter()
        .map(|panel| Dht22Reading {
            panel_id: panel.id(),
            temperature: stat_block(stats, "dht22", "temperature", panel),
            humidity: stat_block(stats, "dht22", "humidity", panel),
        })
        .collect();

    let ina226 = [Panel::One, Panel::Two]
        .into_iter()
        .map(|panel| Ina226Reading {
            panel_id: panel.id(),
            voltage: stat_block(stats, "ina226", "voltage", panel),
            current: stat_block(stats, "ina226", "current", panel),
        })
        .collect();

    Readings {
        rain: flat_group(stats, "rain"),
        uv: flat_group(stats, "uv"),
        light: flat_group(stats, "light"),
        dht22,
        panel_temp: flat_group(stats, "panel_temp"),
        ina226,
        solar: flat_group(stats, "solar"),
        battery: flat_group(stats, "battery"),
        battery_capacity: BATTERY_CAPACITY_WH,
    }
}

/// Build the complete payload for one window.
///
/// `offset` is the presentation offset applied to the window bounds;
/// `timezone` is the matching identifier carried as an opaque label.
pub fn build_window_payload(
    window: &Window,
    rows: &[CleanedRow],
    device_id: &str,
    period_minutes: u32,
    timezone: &str,
    offset: FixedOffset,
) -> WindowPayload {
    let stats = window_stats(rows);

    WindowPayload {
        device_id: device_id.to_string(),
        start_time: window
            .start
            .with_timezone(&offset)
            .to_rfc3339_opts(SecondsFormat::Secs, false),
        end_time: window
            .end
            .with_timezone(&offset)
            .to_rfc3339_opts(SecondsFormat::Secs, false),
        metadata: PayloadMetadata {
            aggregation_type: format!("{period_minutes}min"),
            sample_count: rows.len(),
            timezone: timezone.to_string(),
        },
        readings: build_readings(&stats),
    }
}
