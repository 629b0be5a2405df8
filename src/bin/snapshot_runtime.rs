//! Snapshot Runtime
//!
//! Runs the station availability pipeline:
//! - Opens SQLite (readings + snapshot index) and applies the schema
//! - Polls the reading source on the frequent trigger
//! - Publishes current, past-24h and daily snapshots to the blob store
//!
//! Usage:
//!   cargo run --release --bin snapshot_runtime
//!   cargo run --release --bin snapshot_runtime -- --once frequent
//!   cargo run --release --bin snapshot_runtime -- --once daily
//!   cargo run --release --bin snapshot_runtime -- --once daily --at 2024-03-10T04:05:00.000Z
//!
//! `--at` stamps a one-shot tick with an explicit instant instead of now, e.g.
//! to backfill a missed daily export.
//!
//! See `PipelineConfig::from_env` for environment variables.

use avelo_snapshots::pipeline::{
    calendar::parse_iso,
    config::PipelineConfig,
    db::{open_database, SqliteTimeSeriesStore},
    engine::SnapshotPipeline,
    scheduler::{daily_scheduler_task, frequent_scheduler_task},
    FsBlobStore, HttpReadingSource, PipelineError, PipelineResult, SnapshotPublisher,
    SqliteSnapshotIndex,
};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::env;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnceMode {
    Frequent,
    Daily,
}

fn parse_once(args: &[String]) -> PipelineResult<Option<OnceMode>> {
    if let Some(idx) = args.iter().position(|x| x == "--once") {
        return match args.get(idx + 1).map(|s| s.as_str()) {
            Some("frequent") => Ok(Some(OnceMode::Frequent)),
            Some("daily") => Ok(Some(OnceMode::Daily)),
            other => Err(PipelineError::Config(format!(
                "--once expects 'frequent' or 'daily', got {:?}",
                other.unwrap_or("")
            ))),
        };
    }
    Ok(None)
}

fn parse_at(args: &[String]) -> PipelineResult<Option<DateTime<Utc>>> {
    match args.iter().position(|x| x == "--at") {
        Some(idx) => match args.get(idx + 1) {
            Some(value) => parse_iso(value).map(Some),
            None => Err(PipelineError::InvalidTimestamp(String::new())),
        },
        None => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let once = parse_once(&args)?;
    let at = parse_at(&args)?;
    if at.is_some() && once.is_none() {
        return Err(PipelineError::Config("--at requires --once".to_string()).into());
    }
    let config = PipelineConfig::from_env()?;

    info!("🚀 Snapshot Runtime");

    if !config.enabled {
        info!("⚠️  Pipeline is DISABLED (set ENABLE_PIPELINE=true to activate)");
        info!("   └─ Exiting gracefully...");
        return Ok(());
    }

    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Blob root: {}", config.blob_root);
    info!("   ├─ Public host: {}", config.snapshots_base_host);
    info!("   ├─ Source: {}", config.stations_url);
    info!("   ├─ Ingest interval: {}s", config.ingest_interval_secs);
    info!("   ├─ Daily trigger: {} UTC", config.daily_trigger_utc.format("%H:%M"));
    info!("   └─ Insert failure policy: {}", config.insert_failure_policy.as_str());

    info!("🔧 Initializing database...");
    let conn = open_database(&config.db_path, &config.schema_dir)?;
    info!("✅ Database initialized");

    let store = Arc::new(SqliteTimeSeriesStore::new(conn.clone()));
    let index = Arc::new(SqliteSnapshotIndex::new(conn));
    let blobs = Arc::new(FsBlobStore::new(&config.blob_root));
    let publisher = Arc::new(SnapshotPublisher::new(
        blobs,
        index,
        config.snapshots_base_host.clone(),
    ));
    let source = Arc::new(HttpReadingSource::new(
        config.stations_url.clone(),
        Duration::from_secs(config.source_timeout_secs),
    )?);

    let pipeline = Arc::new(SnapshotPipeline::from_config(&config, store, source, publisher));

    match once {
        Some(OnceMode::Frequent) => {
            let report = pipeline.run_frequent_tick(at.unwrap_or_else(Utc::now)).await;
            if !report.is_clean() {
                warn!("⚠️  One-shot frequent tick had failures");
            }
            return Ok(());
        }
        Some(OnceMode::Daily) => {
            pipeline.run_daily_tick(at.unwrap_or_else(Utc::now)).await?;
            return Ok(());
        }
        None => {}
    }

    info!("🚀 Spawning schedulers...");
    let frequent = tokio::spawn(frequent_scheduler_task(
        pipeline.clone(),
        config.ingest_interval_secs,
    ));
    let daily = tokio::spawn(daily_scheduler_task(pipeline, config.daily_trigger_utc));
    info!("✅ Schedulers running");
    info!("🔄 Press CTRL+C to shutdown gracefully");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("");
            info!("⚠️  Received CTRL+C, shutting down...");
        }
        Err(err) => {
            error!("❌ Failed to listen for CTRL+C: {}", err);
        }
    }

    frequent.abort();
    daily.abort();

    info!("✅ Snapshot runtime stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("snapshot_runtime")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_once() {
        assert_eq!(parse_once(&args(&[])).unwrap(), None);
        assert_eq!(parse_once(&args(&["--once", "daily"])).unwrap(), Some(OnceMode::Daily));
        assert_eq!(
            parse_once(&args(&["--once", "frequent"])).unwrap(),
            Some(OnceMode::Frequent)
        );
        assert!(parse_once(&args(&["--once", "weekly"])).is_err());
        assert!(parse_once(&args(&["--once"])).is_err());
    }

    #[test]
    fn test_parse_at() {
        assert_eq!(parse_at(&args(&["--once", "daily"])).unwrap(), None);
        assert_eq!(
            parse_at(&args(&["--once", "daily", "--at", "2024-03-10T04:05:00.000Z"])).unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 3, 10, 4, 5, 0).unwrap())
        );
        assert!(matches!(
            parse_at(&args(&["--at", "yesterday"])),
            Err(PipelineError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            parse_at(&args(&["--at"])),
            Err(PipelineError::InvalidTimestamp(_))
        ));
    }
}
