//! Pipeline configuration from environment variables

use super::error::{PipelineError, PipelineResult};
use super::ingestion::InsertFailurePolicy;
use chrono::NaiveTime;
use std::env;

/// Configuration for the snapshot runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Path to SQLite database file (readings + snapshot index)
    pub db_path: String,

    /// Directory holding the `.sql` schema files
    pub schema_dir: String,

    /// Root directory of the filesystem blob store
    pub blob_root: String,

    /// Host under which published blobs are served
    pub snapshots_base_host: String,

    /// Endpoint returning the current station list
    pub stations_url: String,

    pub source_timeout_secs: u64,

    /// Period of the ingestion + past-24h trigger in seconds
    pub ingest_interval_secs: u64,

    /// UTC time of day of the daily export trigger
    pub daily_trigger_utc: NaiveTime,

    pub insert_failure_policy: InsertFailurePolicy,

    /// Publish the all-stations current snapshot after ingestion
    pub publish_current: bool,

    /// Publish the all-stations past-24h bundle after the per-station exports
    pub publish_network_24h: bool,

    /// Master enable flag
    pub enabled: bool,
}

/// Parse `name` when set; unset falls back to `default`, unparseable is an error
fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> PipelineResult<T> {
    match env::var(name) {
        Ok(s) => s.trim().parse().map_err(|_| {
            PipelineError::Config(format!("{} could not be parsed, got '{}'", name, s))
        }),
        Err(_) => Ok(default),
    }
}

/// Boolean flag: true/false, 1/0, yes/no, on/off (case-insensitive)
fn env_flag(name: &str, default: bool) -> PipelineResult<bool> {
    match env::var(name) {
        Ok(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(PipelineError::Config(format!(
                "{} must be a boolean (true/false, 1/0, yes/no, on/off), got '{}'",
                name, s
            ))),
        },
        Err(_) => Ok(default),
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `AVELO_DB_PATH` (default: data/avelo.db)
    /// - `AVELO_SCHEMA_DIR` (default: sql)
    /// - `AVELO_BLOB_ROOT` (default: data/snapshots)
    /// - `SNAPSHOTS_BASE_HOST` (default: snapshots.avelytique.gozque.com)
    /// - `STATIONS_CURRENT_URL` (default: http://127.0.0.1:8787/current)
    /// - `SOURCE_TIMEOUT_SECS` (default: 10)
    /// - `INGEST_INTERVAL_SECS` (default: 300)
    /// - `DAILY_TRIGGER_UTC` as HH:MM (default: 04:05, i.e. 00:05 local)
    /// - `INGEST_FAILURE_POLICY` abort|continue (default: abort)
    /// - `PUBLISH_CURRENT` (default: true)
    /// - `PUBLISH_NETWORK_24H` (default: true)
    /// - `ENABLE_PIPELINE` (default: true)
    ///
    /// A variable that is set but malformed is rejected, as is a zero interval.
    pub fn from_env() -> PipelineResult<Self> {
        let daily_trigger_utc = match env::var("DAILY_TRIGGER_UTC") {
            Ok(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| {
                PipelineError::Config(format!("DAILY_TRIGGER_UTC must be HH:MM, got '{}'", s))
            })?,
            Err(_) => NaiveTime::from_hms_opt(4, 5, 0).unwrap_or(NaiveTime::MIN),
        };

        let insert_failure_policy = match env::var("INGEST_FAILURE_POLICY") {
            Ok(s) => s.trim().parse::<InsertFailurePolicy>().map_err(|_| {
                PipelineError::Config(format!(
                    "INGEST_FAILURE_POLICY must be 'abort' or 'continue', got '{}'",
                    s
                ))
            })?,
            Err(_) => InsertFailurePolicy::default(),
        };

        let ingest_interval_secs = env_parsed("INGEST_INTERVAL_SECS", 300u64)?;
        if ingest_interval_secs == 0 {
            return Err(PipelineError::Config(
                "INGEST_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            db_path: env::var("AVELO_DB_PATH").unwrap_or_else(|_| "data/avelo.db".to_string()),
            schema_dir: env::var("AVELO_SCHEMA_DIR").unwrap_or_else(|_| "sql".to_string()),
            blob_root: env::var("AVELO_BLOB_ROOT").unwrap_or_else(|_| "data/snapshots".to_string()),
            snapshots_base_host: env::var("SNAPSHOTS_BASE_HOST")
                .unwrap_or_else(|_| "snapshots.avelytique.gozque.com".to_string()),
            stations_url: env::var("STATIONS_CURRENT_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8787/current".to_string()),
            source_timeout_secs: env_parsed("SOURCE_TIMEOUT_SECS", 10)?,
            ingest_interval_secs,
            daily_trigger_utc,
            insert_failure_policy,
            publish_current: env_flag("PUBLISH_CURRENT", true)?,
            publish_network_24h: env_flag("PUBLISH_NETWORK_24H", true)?,
            enabled: env_flag("ENABLE_PIPELINE", true)?,
        })
    }
}
