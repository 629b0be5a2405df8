//! Ingestion collector: one reading row per station per tick
//!
//! Inserts run sequentially with a single capture instant for the whole batch.
//! Nothing is deduplicated; unchanged stations still get a row every tick.

use super::db::TimeSeriesStore;
use super::error::PipelineError;
use super::types::{Reading, Station};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// What to do with the rest of a batch after an insert fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertFailurePolicy {
    /// Stop at the first failed insert. Rows already written stay written.
    #[default]
    AbortRemaining,
    /// Attempt every station and report all failures
    ContinueAndCollect,
}

impl InsertFailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsertFailurePolicy::AbortRemaining => "abort",
            InsertFailurePolicy::ContinueAndCollect => "continue",
        }
    }

}

impl std::str::FromStr for InsertFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(InsertFailurePolicy::AbortRemaining),
            "continue" => Ok(InsertFailurePolicy::ContinueAndCollect),
            other => Err(format!("unknown insert failure policy: {}", other)),
        }
    }
}

#[derive(Debug)]
pub struct StationFailure {
    pub station_id: i64,
    pub error: PipelineError,
}

#[derive(Debug)]
pub struct IngestionReport {
    pub captured_at: DateTime<Utc>,
    pub written: usize,
    /// Stations never attempted because the batch was aborted
    pub skipped: usize,
    pub failures: Vec<StationFailure>,
}

impl IngestionReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped == 0
    }
}

pub struct IngestionCollector {
    store: Arc<dyn TimeSeriesStore>,
    policy: InsertFailurePolicy,
}

impl IngestionCollector {
    pub fn new(store: Arc<dyn TimeSeriesStore>, policy: InsertFailurePolicy) -> Self {
        Self { store, policy }
    }

    /// Append one reading per station, all stamped `captured_at`
    pub async fn ingest(&self, stations: &[Station], captured_at: DateTime<Utc>) -> IngestionReport {
        let mut report = IngestionReport {
            captured_at,
            written: 0,
            skipped: 0,
            failures: Vec::new(),
        };

        for (i, station) in stations.iter().enumerate() {
            let reading = Reading::capture(station, captured_at);

            match self.store.append(&reading).await {
                Ok(()) => {
                    report.written += 1;
                    log::debug!("   ├─ {} ({})", station.name, station.id);
                }
                Err(error) => {
                    log::error!("❌ Failed to store reading for station {}: {}", station.id, error);
                    report.failures.push(StationFailure {
                        station_id: station.id,
                        error,
                    });

                    if self.policy == InsertFailurePolicy::AbortRemaining {
                        report.skipped = stations.len() - i - 1;
                        log::warn!(
                            "⚠️  Ingestion aborted: {} stations not written this tick",
                            report.skipped
                        );
                        break;
                    }
                }
            }
        }

        log::info!(
            "📊 Ingested {}/{} stations at {}",
            report.written,
            stations.len(),
            captured_at
        );

        report
    }
}
