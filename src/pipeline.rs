//! Per-run sequencing: watermark → fetch → clean → partition → aggregate →
//! deliver → advance.
//!
//! One cycle processes every eligible window in strictly increasing start
//! order. The watermark advances durably after each confirmed delivery and
//! never otherwise, so a crash or failure mid-run resumes at the last
//! delivered window (at-least-once, ordered). Delivery failures end the
//! run early without touching later windows; store failures surface as
//! errors for the scheduler's backoff path.

use crate::config::EdgeConfig;
use crate::delivery::DeliverySink;
use crate::fill::{clean_batch, FillCache};
use crate::payload::build_window_payload;
use crate::store::{SampleSource, StoreError, WatermarkStore};
use crate::types::DeliveryOutcome;
use crate::window::{align_floor, eligible_windows, partition};
use chrono::FixedOffset;
use tracing::{debug, info, warn};

/// Failures that abort a cycle. Everything else is classified into the
/// cycle report and the scheduler carries on at normal cadence.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Immutable per-deployment parameters for payload assembly.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub device_id: String,
    pub period_minutes: u32,
    pub timezone: String,
    pub offset: FixedOffset,
}

impl From<&EdgeConfig> for PipelineSettings {
    fn from(config: &EdgeConfig) -> Self {
        Self {
            device_id: config.device.device_id.clone(),
            period_minutes: config.aggregation.period_minutes,
            timezone: config.device.timezone.clone(),
            offset: config.presentation_offset(),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Eligible windows identified at cycle start
    pub windows_identified: usize,
    /// Windows delivered and watermarked
    pub delivered: usize,
    /// Windows with zero raw rows, passed over without delivery
    pub skipped_empty: usize,
    /// Delivery outcome that ended the run early, if any
    pub stopped_on: Option<DeliveryOutcome>,
}

/// The windowed aggregation and delivery pipeline for one device stream.
pub struct Pipeline<S, D> {
    source: S,
    sink: D,
    watermark: WatermarkStore,
    settings: PipelineSettings,
}

impl<S: SampleSource, D: DeliverySink> Pipeline<S, D> {
    pub fn new(source: S, sink: D, watermark: WatermarkStore, settings: PipelineSettings) -> Self {
        Self {
            source,
            sink,
            watermark,
            settings,
        }
    }

    /// The delivery sink, for inspection after a cycle.
    pub fn sink(&self) -> &D {
        &self.sink
    }

    /// Run one aggregation cycle.
    ///
    /// Quiet no-ops (no data yet, no complete window yet) return an empty
    /// report; the next cadence tick retries from the same resume point.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, RunError> {
        let mut report = CycleReport::default();
        let period = chrono::Duration::minutes(i64::from(self.settings.period_minutes));

        let resume = match self.watermark.get()? {
            Some(wm) => wm,
            None => match self.source.earliest_timestamp()? {
                // Nothing delivered yet, so the window containing the first
                // sample is fair game: align down, not up.
                Some(first) => {
                    let start = align_floor(first, period);
                    info!(%start, "No watermark yet, starting from earliest telemetry");
                    start
                }
                None => {
                    debug!("No telemetry stored yet");
                    return Ok(report);
                }
            },
        };

        let Some(latest) = self.source.latest_timestamp()? else {
            debug!("No telemetry stored yet");
            return Ok(report);
        };
        if latest <= resume {
            debug!(resume = %resume, "No new telemetry since last delivery");
            return Ok(report);
        }

        let windows = eligible_windows(resume, latest, period);
        if windows.is_empty() {
            debug!(resume = %resume, latest = %latest, "No complete window yet");
            return Ok(report);
        }
        report.windows_identified = windows.len();

        // One fetch covers the whole run; seeding takes one extra lookup.
        let first_start = windows[0].start;
        let last_end = windows[windows.len() - 1].end;
        let raw = self.source.fetch_rows(first_start, last_end)?;
        if raw.is_empty() {
            debug!("Eligible windows contain no samples, nothing to deliver");
            report.skipped_empty = windows.len();
            return Ok(report);
        }

        let mut cache = match self.source.most_recent_before(raw[0].timestamp)? {
            Some(prior) => FillCache::seed_from(&prior),
            None => FillCache::empty(),
        };
        let cleaned = clean_batch(&raw, &mut cache);
        let parts = partition(&cleaned, &windows);

        for (window, rows) in windows.iter().zip(parts) {
            if rows.is_empty() {
                debug!(window = %window, "No samples in window, skipping");
                report.skipped_empty += 1;
                continue;
            }

            let payload = build_window_payload(
                window,
                rows,
                &self.settings.device_id,
                self.settings.period_minutes,
                &self.settings.timezone,
                self.settings.offset,
            );

            match self.sink.deliver(&payload).await {
                DeliveryOutcome::Delivered => {
                    // Durable before the next window is attempted.
                    self.watermark.advance(window.end)?;
                    report.delivered += 1;
                    info!(window = %window, samples = rows.len(), "Window delivered");
                }
                outcome => {
                    warn!(window = %window, outcome = %outcome, "Delivery failed, stopping run, later windows untouched");
                    report.stopped_on = Some(outcome);
                    break;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::index_of;
    use crate::payload::WindowPayload;
    use crate::store::{MemorySource, MemoryState};
    use crate::types::RawRow;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Sink with scripted outcomes; records every payload it accepts.
    #[derive(Default)]
    struct ScriptedSink {
        script: VecDeque<DeliveryOutcome>,
        delivered: Vec<WindowPayload>,
        attempts: usize,
    }

    #[async_trait]
    impl DeliverySink for ScriptedSink {
        async fn deliver(&mut self, payload: &WindowPayload) -> DeliveryOutcome {
            self.attempts += 1;
            let outcome = self
                .script
                .pop_front()
                .unwrap_or(DeliveryOutcome::Delivered);
            if outcome == DeliveryOutcome::Delivered {
                self.delivered.push(payload.clone());
            }
            outcome
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, h, m, s).unwrap()
    }

    fn rain_row(t: DateTime<Utc>, rain: f64) -> RawRow {
        let mut row = RawRow::empty(t);
        row.values[index_of("rain_1").unwrap()] = Some(rain);
        row
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            device_id: "SOLAR_01".to_string(),
            period_minutes: 5,
            timezone: "Asia/Manila".to_string(),
            offset: FixedOffset::east_opt(8 * 3600).unwrap(),
        }
    }

    fn pipeline(
        rows: Vec<RawRow>,
        script: Vec<DeliveryOutcome>,
        state: Arc<MemoryState>,
    ) -> Pipeline<MemorySource, ScriptedSink> {
        Pipeline::new(
            MemorySource::new(rows),
            ScriptedSink {
                script: script.into(),
                ..ScriptedSink::default()
            },
            WatermarkStore::new(state),
            settings(),
        )
    }

    #[tokio::test]
    async fn empty_store_is_a_quiet_noop() {
        let mut p = pipeline(vec![], vec![], Arc::new(MemoryState::default()));
        let report = p.run_cycle().await.unwrap();
        assert_eq!(report, CycleReport::default());
        assert_eq!(p.sink.attempts, 0);
    }

    #[tokio::test]
    async fn delivers_complete_windows_in_order() {
        let rows = vec![
            rain_row(at(10, 0, 30), 1.0),
            rain_row(at(10, 5, 30), 2.0),
            rain_row(at(10, 10, 1), 3.0), // makes both earlier windows complete
        ];
        let state = Arc::new(MemoryState::default());
        let mut p = pipeline(rows, vec![], state.clone());

        let report = p.run_cycle().await.unwrap();
        assert_eq!(report.windows_identified, 2);
        assert_eq!(report.delivered, 2);
        assert_eq!(p.sink.delivered[0].start_time, "2025-05-01T18:00:00+08:00");
        assert_eq!(p.sink.delivered[1].start_time, "2025-05-01T18:05:00+08:00");

        let wm = WatermarkStore::new(state).get().unwrap();
        assert_eq!(wm, Some(at(10, 10, 0)));
    }

    #[tokio::test]
    async fn failure_stops_the_run_and_freezes_the_watermark() {
        let rows = vec![
            rain_row(at(10, 0, 30), 1.0),
            rain_row(at(10, 5, 30), 2.0),
            rain_row(at(10, 10, 30), 3.0),
            rain_row(at(10, 15, 1), 4.0),
        ];
        let state = Arc::new(MemoryState::default());
        let script = vec![
            DeliveryOutcome::Delivered,
            DeliveryOutcome::TransportFailure,
        ];
        let mut p = pipeline(rows, script, state.clone());

        let report = p.run_cycle().await.unwrap();
        assert_eq!(report.windows_identified, 3);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.stopped_on, Some(DeliveryOutcome::TransportFailure));
        // Window 3 was never attempted.
        assert_eq!(p.sink.attempts, 2);
        // Watermark stays at window 1's end.
        let wm = WatermarkStore::new(state).get().unwrap();
        assert_eq!(wm, Some(at(10, 5, 0)));
    }

    #[tokio::test]
    async fn next_cycle_resumes_where_the_failed_one_stopped() {
        let rows = vec![
            rain_row(at(10, 0, 30), 1.0),
            rain_row(at(10, 5, 30), 2.0),
            rain_row(at(10, 10, 1), 3.0),
        ];
        let state = Arc::new(MemoryState::default());

        let mut first = pipeline(
            rows.clone(),
            vec![DeliveryOutcome::TransportFailure],
            state.clone(),
        );
        let report = first.run_cycle().await.unwrap();
        assert_eq!(report.delivered, 0);

        let mut second = pipeline(rows, vec![], state);
        let report = second.run_cycle().await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(second.sink.delivered[0].start_time, "2025-05-01T18:00:00+08:00");
    }

    #[tokio::test]
    async fn empty_windows_are_passed_over_without_delivery() {
        // Samples in windows 1 and 3; window 2 has a data gap.
        let rows = vec![
            rain_row(at(10, 0, 30), 1.0),
            rain_row(at(10, 10, 30), 3.0),
            rain_row(at(10, 15, 1), 4.0),
        ];
        let state = Arc::new(MemoryState::default());
        let mut p = pipeline(rows, vec![], state.clone());

        let report = p.run_cycle().await.unwrap();
        assert_eq!(report.windows_identified, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.skipped_empty, 1);
        // Watermark covers the gap once the later window lands.
        let wm = WatermarkStore::new(state).get().unwrap();
        assert_eq!(wm, Some(at(10, 15, 0)));
    }

    #[tokio::test]
    async fn auth_rejection_ends_the_run() {
        let rows = vec![rain_row(at(10, 0, 30), 1.0), rain_row(at(10, 5, 1), 2.0)];
        let mut p = pipeline(
            rows,
            vec![DeliveryOutcome::AuthRejected],
            Arc::new(MemoryState::default()),
        );
        let report = p.run_cycle().await.unwrap();
        assert_eq!(report.stopped_on, Some(DeliveryOutcome::AuthRejected));
        assert_eq!(report.delivered, 0);
    }

    #[tokio::test]
    async fn forward_fill_bridges_windows_within_a_run() {
        let rain = index_of("rain_1").unwrap();
        let mut gap_row = RawRow::empty(at(10, 5, 30));
        gap_row.values[rain] = None; // sensor dropout

        let rows = vec![
            rain_row(at(10, 0, 30), 2.5),
            gap_row,
            rain_row(at(10, 10, 1), 3.0),
        ];
        let mut p = pipeline(rows, vec![], Arc::new(MemoryState::default()));

        let report = p.run_cycle().await.unwrap();
        assert_eq!(report.delivered, 2);
        // Second window's rain average equals the carried-forward 2.5,
        // with health 0 (no original sample in that window was valid).
        let second = &p.sink.delivered[1];
        assert_eq!(second.readings.rain[0].average, 2.5);
        assert_eq!(second.readings.rain[0].health, 0);
    }
}
