//! Channel registry: the static table of telemetry channels.
//!
//! Two redundant panel systems report ten measurements each. Every channel
//! carries its validation range and its position in the backend payload
//! (group + optional nested measure for the dht22 / ina226 composite
//! sensors). The table is immutable and shared read-only by the whole
//! pipeline; row arrays are indexed parallel to it.

/// Panel a channel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    One,
    Two,
}

impl Panel {
    /// Backend identifier for this panel.
    pub const fn id(self) -> &'static str {
        match self {
            Panel::One => "Panel_1",
            Panel::Two => "Panel_2",
        }
    }
}

/// Definition of one sensor channel.
///
/// `min_valid` / `max_valid` bound the physically plausible range; either
/// bound may be open. `measure` is set for channels that nest under a
/// composite sensor entry in the payload (dht22 temperature/humidity,
/// ina226 voltage/current).
#[derive(Debug, Clone, Copy)]
pub struct ChannelSpec {
    /// Unique channel key, e.g. `rain_1`.
    pub key: &'static str,
    /// Payload group this channel reports under.
    pub group: &'static str,
    /// Nested measure name within the group, for composite sensors.
    pub measure: Option<&'static str>,
    pub panel: Panel,
    pub unit: &'static str,
    pub min_valid: Option<f64>,
    pub max_valid: Option<f64>,
}

/// Number of channels in the registry.
pub const CHANNEL_COUNT: usize = 20;

/// The full channel table. Order is fixed; `RawRow` and `CleanedRow`
/// value arrays are indexed by position in this table.
pub static CHANNELS: [ChannelSpec; CHANNEL_COUNT] = [
    ChannelSpec { key: "rain_1", group: "rain", measure: None, panel: Panel::One, unit: "%", min_valid: Some(0.0), max_valid: Some(100.0) },
    ChannelSpec { key: "rain_2", group: "rain", measure: None, panel: Panel::Two, unit: "%", min_valid: Some(0.0), max_valid: Some(100.0) },
    ChannelSpec { key: "uv_1", group: "uv", measure: None, panel: Panel::One, unit: "mW/cm2", min_valid: Some(0.0), max_valid: Some(15.0) },
    ChannelSpec { key: "uv_2", group: "uv", measure: None, panel: Panel::Two, unit: "mW/cm2", min_valid: Some(0.0), max_valid: Some(15.0) },
    ChannelSpec { key: "lux_1", group: "light", measure: None, panel: Panel::One, unit: "lux", min_valid: Some(0.0), max_valid: Some(120_000.0) },
    ChannelSpec { key: "lux_2", group: "light", measure: None, panel: Panel::Two, unit: "lux", min_valid: Some(0.0), max_valid: Some(120_000.0) },
    ChannelSpec { key: "dht_temp_1", group: "dht22", measure: Some("temperature"), panel: Panel::One, unit: "°C", min_valid: Some(10.0), max_valid: Some(60.0) },
    ChannelSpec { key: "dht_temp_2", group: "dht22", measure: Some("temperature"), panel: Panel::Two, unit: "°C", min_valid: Some(10.0), max_valid: Some(60.0) },
    ChannelSpec { key: "dht_humidity_1", group: "dht22", measure: Some("humidity"), panel: Panel::One, unit: "%", min_valid: Some(0.0), max_valid: Some(100.0) },
    ChannelSpec { key: "dht_humidity_2", group: "dht22", measure: Some("humidity"), panel: Panel::Two, unit: "%", min_valid: Some(0.0), max_valid: Some(100.0) },
    ChannelSpec { key: "panel_temp_1", group: "panel_temp", measure: None, panel: Panel::One, unit: "°C", min_valid: Some(0.0), max_valid: None },
    ChannelSpec { key: "panel_temp_2", group: "panel_temp", measure: None, panel: Panel::Two, unit: "°C", min_valid: Some(0.0), max_valid: None },
    ChannelSpec { key: "panel_voltage_1", group: "ina226", measure: Some("voltage"), panel: Panel::One, unit: "V", min_valid: Some(0.0), max_valid: None },
    ChannelSpec { key: "panel_voltage_2", group: "ina226", measure: Some("voltage"), panel: Panel::Two, unit: "V", min_valid: Some(0.0), max_valid: None },
    ChannelSpec { key: "panel_current_1", group: "ina226", measure: Some("current"), panel: Panel::One, unit: "mA", min_valid: Some(0.0), max_valid: None },
    ChannelSpec { key: "panel_current_2", group: "ina226", measure: Some("current"), panel: Panel::Two, unit: "mA", min_valid: Some(0.0), max_valid: None },
    ChannelSpec { key: "solar_irrad_1", group: "solar", measure: None, panel: Panel::One, unit: "W/m2", min_valid: Some(0.0), max_valid: Some(1800.0) },
    ChannelSpec { key: "solar_irrad_2", group: "solar", measure: None, panel: Panel::Two, unit: "W/m2", min_valid: Some(0.0), max_valid: Some(1800.0) },
    ChannelSpec { key: "battery_voltage_1", group: "battery", measure: None, panel: Panel::One, unit: "V", min_valid: Some(0.0), max_valid: None },
    ChannelSpec { key: "battery_voltage_2", group: "battery", measure: None, panel: Panel::Two, unit: "V", min_valid: Some(0.0), max_valid: None },
];

/// Look up a channel's index by key.
pub fn index_of(key: &str) -> Option<usize> {
    CHANNELS.iter().position(|c| c.key == key)
}
