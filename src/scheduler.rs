//! Cadence loop: one aggregation cycle per period, aligned to the same
//! grid the windows use.
//!
//! Each tick lands `settle_offset` seconds after a period boundary so the
//! ingest path has flushed the boundary-straddling samples before the
//! cycle reads them. The first cycle runs immediately on startup to drain
//! any backlog accumulated while the process was down.

use crate::delivery::DeliverySink;
use crate::pipeline::Pipeline;
use crate::store::SampleSource;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pause after a failed cycle before retrying, independent of cadence.
const ERROR_BACKOFF_SECS: u64 = 60;

/// Next wall-clock instant at which a cycle should run: the first grid
/// boundary strictly after `now`, plus the settle offset.
fn next_tick(now: DateTime<Utc>, period_secs: i64, settle_offset_secs: i64) -> DateTime<Utc> {
    let secs = now.timestamp();
    let floor = secs - secs.rem_euclid(period_secs);
    let mut target = floor + period_secs + settle_offset_secs;
    if target <= secs {
        target += period_secs;
    }
    DateTime::from_timestamp(target, 0).unwrap_or(now)
}

/// Drive the pipeline until cancelled.
pub async fn run<S, D>(
    mut pipeline: Pipeline<S, D>,
    period_minutes: u32,
    settle_offset_secs: u32,
    shutdown: CancellationToken,
) where
    S: SampleSource,
    D: DeliverySink,
{
    let period_secs = i64::from(period_minutes) * 60;
    info!(
        period_minutes,
        settle_offset_secs, "Aggregation scheduler started"
    );

    loop {
        match pipeline.run_cycle().await {
            Ok(report) => {
                if report.windows_identified > 0 {
                    info!(
                        identified = report.windows_identified,
                        delivered = report.delivered,
                        skipped_empty = report.skipped_empty,
                        "Cycle complete"
                    );
                } else {
                    debug!("Cycle complete, no eligible windows");
                }
                if let Some(outcome) = report.stopped_on {
                    warn!(%outcome, "Cycle stopped early, remaining windows deferred to next tick");
                }
            }
            Err(e) => {
                error!(error = %e, "Cycle failed, backing off");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(std::time::Duration::from_secs(ERROR_BACKOFF_SECS)) => {}
                }
                continue;
            }
        }

        let now = Utc::now();
        let target = next_tick(now, period_secs, i64::from(settle_offset_secs));
        let wait = (target - now).to_std().unwrap_or_default();
        debug!(next = %target, "Sleeping until next tick");

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }

    info!("Aggregation scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, h, m, s).unwrap()
    }

    #[test]
    fn tick_lands_after_the_next_boundary() {
        assert_eq!(next_tick(at(10, 2, 17), 300, 5), at(10, 5, 5));
        assert_eq!(next_tick(at(10, 0, 0), 300, 5), at(10, 5, 5));
    }

    #[test]
    fn tick_inside_the_settle_margin_still_moves_forward() {
        // 10:05:03 is past the 10:05 boundary, so the cycle that just ran
        // covered it; the next tick belongs to the 10:10 boundary.
        assert_eq!(next_tick(at(10, 5, 3), 300, 5), at(10, 10, 5));
        assert_eq!(next_tick(at(10, 5, 5), 300, 5), at(10, 10, 5));
        assert_eq!(next_tick(at(10, 5, 6), 300, 5), at(10, 10, 5));
    }
}
