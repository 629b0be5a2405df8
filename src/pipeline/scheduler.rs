//! Pipeline schedulers for the two triggers
//!
//! - Frequent: every `ingest_interval_secs`, aligned to wall-clock multiples
//!   of the interval (ingestion, current export, past-24h exports)
//! - Daily: once per day at a fixed UTC time (previous-day exports)
//!
//! Each firing is a fresh call into `SnapshotPipeline`; nothing carries over
//! between ticks.

use super::engine::SnapshotPipeline;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use std::sync::Arc;

/// First instant strictly after `now` that is a multiple of `every` since the epoch
pub fn next_aligned_trigger(now: DateTime<Utc>, every: Duration) -> DateTime<Utc> {
    let period = every.num_seconds().max(1);
    let next = (now.timestamp().div_euclid(period) + 1) * period;
    Utc.timestamp_opt(next, 0)
        .single()
        .unwrap_or(now + every)
}

/// Next occurrence of `at` (UTC time of day) strictly after `now`
pub fn next_daily_trigger(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

async fn sleep_until(target: DateTime<Utc>) {
    let wait = (target - Utc::now()).to_std().unwrap_or_default();
    tokio::time::sleep(wait).await;
}

/// Frequent scheduler task
///
/// This function runs indefinitely until cancelled.
pub async fn frequent_scheduler_task(pipeline: Arc<SnapshotPipeline>, interval_secs: u64) {
    let every = Duration::seconds(interval_secs as i64);
    log::info!("⏰ Starting frequent scheduler (interval: {}s)", interval_secs);

    loop {
        let next = next_aligned_trigger(Utc::now(), every);
        log::debug!("   └─ next frequent tick at {}", next);
        sleep_until(next).await;

        let report = pipeline.run_frequent_tick(next).await;
        if let Ok(ingestion) = &report.ingestion {
            log::debug!(
                "   ├─ ingestion: {} written, {} failed, {} skipped",
                ingestion.written,
                ingestion.failures.len(),
                ingestion.skipped
            );
        }
        if let Ok(window) = &report.window {
            log::debug!(
                "   └─ past-24h: {} published, {} failed",
                window.stations.succeeded(),
                window.stations.failed()
            );
        }
    }
}

/// Daily scheduler task
///
/// This function runs indefinitely until cancelled.
pub async fn daily_scheduler_task(pipeline: Arc<SnapshotPipeline>, at: NaiveTime) {
    log::info!("⏰ Starting daily scheduler (at {} UTC)", at.format("%H:%M"));

    loop {
        let next = next_daily_trigger(Utc::now(), at);
        log::debug!("   └─ next daily tick at {}", next);
        sleep_until(next).await;

        // Tick-level errors are logged by the engine
        if let Ok(report) = pipeline.run_daily_tick(next).await {
            for (station, error) in report.stations.failures() {
                log::warn!(
                    "⚠️  {} not exported for station {}: {}",
                    report.day.label(),
                    station.station_id,
                    error
                );
            }
        }
    }
}
