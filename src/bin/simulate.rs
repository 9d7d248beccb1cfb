//! Synthetic telemetry generator.
//!
//! Seeds the local sled store with a diurnal solar profile so the
//! aggregation pipeline can be exercised without hardware. Gap and garble
//! rates inject the failure modes the cleaning stage exists for: missing
//! readings and physically impossible values.

use anyhow::Context;
use chrono::{DateTime, Duration, Timelike, Utc};
use clap::Parser;
use helios_edge::channels::{index_of, CHANNEL_COUNT};
use helios_edge::store::SledTelemetryStore;
use helios_edge::types::RawRow;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "simulate", about = "Seed the telemetry store with synthetic solar data")]
struct SimArgs {
    /// Directory of the sled telemetry database
    #[arg(long, default_value = "helios_data")]
    data_dir: PathBuf,

    /// Hours of history to generate, ending now
    #[arg(long, default_value_t = 24)]
    hours: u32,

    /// Seconds between samples
    #[arg(long, default_value_t = 10)]
    interval_secs: u32,

    /// Probability that any single reading is missing
    #[arg(long, default_value_t = 0.02)]
    gap_rate: f64,

    /// Probability that any single reading is replaced with junk
    #[arg(long, default_value_t = 0.01)]
    garble_rate: f64,

    /// RNG seed for reproducible runs
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Daylight factor in [0, 1]: zero at night, peaking at solar noon.
fn daylight(t: DateTime<Utc>) -> f64 {
    let hour = f64::from(t.hour()) + f64::from(t.minute()) / 60.0;
    // Local solar day approximated as 06:00..18:00 UTC.
    let x = (hour - 6.0) / 12.0;
    if (0.0..=1.0).contains(&x) {
        (x * std::f64::consts::PI).sin()
    } else {
        0.0
    }
}

fn nominal(key: &str, sun: f64, rng: &mut StdRng) -> f64 {
    let jitter = |rng: &mut StdRng, scale: f64| rng.gen_range(-scale..=scale);
    match key {
        k if k.starts_with("rain") => (5.0 + jitter(rng, 5.0)).max(0.0),
        k if k.starts_with("uv") => sun * 9.0 + jitter(rng, 0.5).max(-sun * 9.0),
        k if k.starts_with("lux") => sun * 95_000.0 + jitter(rng, 2_000.0).max(-sun * 95_000.0),
        k if k.starts_with("dht_temp") => 24.0 + sun * 10.0 + jitter(rng, 0.8),
        k if k.starts_with("dht_humidity") => (70.0 - sun * 25.0 + jitter(rng, 3.0)).clamp(0.0, 100.0),
        k if k.starts_with("panel_temp") => 25.0 + sun * 28.0 + jitter(rng, 1.5),
        k if k.starts_with("panel_voltage") => 14.0 + sun * 4.0 + jitter(rng, 0.3),
        k if k.starts_with("panel_current") => sun * 5_500.0 + jitter(rng, 120.0).max(-sun * 5_500.0),
        k if k.starts_with("solar_irrad") => sun * 1_000.0 + jitter(rng, 30.0).max(-sun * 1_000.0),
        k if k.starts_with("battery_voltage") => 12.4 + sun * 0.8 + jitter(rng, 0.1),
        _ => 0.0,
    }
}

/// Out-of-range junk the validator must reject.
fn garbled(rng: &mut StdRng) -> f64 {
    match rng.gen_range(0_u8..3) {
        0 => -9_999.0,
        1 => 1.0e9,
        _ => f64::NAN,
    }
}

const KEYS: [&str; CHANNEL_COUNT] = [
    "rain_1",
    "rain_2",
    "uv_1",
    "uv_2",
    "lux_1",
    "lux_2",
    "dht_temp_1",
    "dht_temp_2",
    "dht_humidity_1",
    "dht_humidity_2",
    "panel_temp_1",
    "panel_temp_2",
    "panel_voltage_1",
    "panel_voltage_2",
    "panel_current_1",
    "panel_current_2",
    "solar_irrad_1",
    "solar_irrad_2",
    "battery_voltage_1",
    "battery_voltage_2",
];

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = SimArgs::parse();
    let store = SledTelemetryStore::open(&args.data_dir)
        .with_context(|| format!("opening store at {}", args.data_dir.display()))?;
    let mut rng = StdRng::seed_from_u64(args.seed);

    let end = Utc::now();
    let start = end - Duration::hours(i64::from(args.hours));
    let step = Duration::seconds(i64::from(args.interval_secs.max(1)));

    let mut inserted = 0_u64;
    let mut t = start;
    while t < end {
        let sun = daylight(t);
        let mut row = RawRow::empty(t);
        for key in KEYS {
            if rng.gen_bool(args.gap_rate.clamp(0.0, 1.0)) {
                continue;
            }
            let value = if rng.gen_bool(args.garble_rate.clamp(0.0, 1.0)) {
                garbled(&mut rng)
            } else {
                nominal(key, sun, &mut rng)
            };
            if let Some(idx) = index_of(key) {
                row.values[idx] = Some(value);
            }
        }
        store.insert_row(&row)?;
        inserted += 1;
        t += step;
    }

    info!(
        rows = inserted,
        from = %start,
        to = %end,
        total = store.sample_count(),
        "Synthetic telemetry written"
    );
    Ok(())
}
