//! Previous local calendar day export per station
//!
//! Keys carry the day label, so each day's artifact is written once per run
//! of that day and never overwritten by later days.

use super::artifact::ExportArtifact;
use super::batch::{for_each_station, BatchReport};
use super::calendar::{previous_day_bounds, to_iso, DayBounds};
use super::compaction::compact;
use super::db::TimeSeriesStore;
use super::error::{PipelineError, PipelineResult};
use super::publisher::SnapshotPublisher;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Debug)]
pub struct DailyReport {
    pub day: DayBounds,
    /// Published url per station
    pub stations: BatchReport<String>,
}

pub struct DailyAggregator {
    store: Arc<dyn TimeSeriesStore>,
    publisher: Arc<SnapshotPublisher>,
}

impl DailyAggregator {
    pub fn new(store: Arc<dyn TimeSeriesStore>, publisher: Arc<SnapshotPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Export the local day before the one containing `now`
    pub async fn run(&self, now: DateTime<Utc>) -> PipelineResult<DailyReport> {
        self.run_for_day(previous_day_bounds(now), now).await
    }

    /// Export an explicit local day, e.g. to backfill a missed run
    pub async fn run_for_day(&self, day: DayBounds, now: DateTime<Utc>) -> PipelineResult<DailyReport> {
        let stations = self.store.stations().await?;
        log::info!(
            "📅 Daily export {} for {} stations ({} .. {})",
            day.label(),
            stations.len(),
            to_iso(day.start),
            to_iso(day.end)
        );

        let report = for_each_station(stations, |station| {
            let store = self.store.clone();
            let publisher = self.publisher.clone();
            async move {
                let points = store
                    .readings_between(station.station_id, day.start, day.end)
                    .await?;
                let compacted = compact(&points);
                let artifact = ExportArtifact::daily_station(&station, &day, &compacted, now)?;
                let url = publisher.publish(&artifact).await?;
                Ok::<_, PipelineError>(url)
            }
        })
        .await;

        log::info!(
            "✅ Daily export {}: {} published, {} failed",
            day.label(),
            report.succeeded(),
            report.failed()
        );

        Ok(DailyReport {
            day,
            stations: report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::blob::{BlobStore, MemoryBlobStore};
    use crate::pipeline::db::{open_database, SqliteTimeSeriesStore};
    use crate::pipeline::index::SqliteSnapshotIndex;
    use crate::pipeline::types::{Reading, Station};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<SqliteTimeSeriesStore>, Arc<MemoryBlobStore>, DailyAggregator) {
        let dir = TempDir::new().unwrap();
        let conn = open_database(dir.path().join("d.db").to_str().unwrap(), "sql").unwrap();
        let store = Arc::new(SqliteTimeSeriesStore::new(conn.clone()));
        let blobs = Arc::new(MemoryBlobStore::new());
        let index = Arc::new(SqliteSnapshotIndex::new(conn));
        let publisher = Arc::new(SnapshotPublisher::new(blobs.clone(), index, "h.example"));
        let aggregator = DailyAggregator::new(store.clone(), publisher);
        (dir, store, blobs, aggregator)
    }

    async fn record(store: &SqliteTimeSeriesStore, bikes: i64, at: DateTime<Utc>) {
        let station = Station {
            id: 5,
            name: "Jardin Saint-Roch".to_string(),
            bikes: Some(bikes),
            free_docks: Some(0),
            lat: None,
            long: None,
        };
        store.append(&Reading::capture(&station, at)).await.unwrap();
    }

    async fn bikes_in(blobs: &MemoryBlobStore, key: &str) -> Vec<i64> {
        let bytes = blobs.get(key).await.unwrap().unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        doc["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["bikes"].as_i64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_late_utc_reading_belongs_to_previous_local_day() {
        let (_dir, store, blobs, aggregator) = setup();

        // 2024-03-09T23:59 local
        record(&store, 1, Utc.with_ymd_and_hms(2024, 3, 10, 3, 59, 0).unwrap()).await;
        // 2024-03-10T00:01 local
        record(&store, 2, Utc.with_ymd_and_hms(2024, 3, 10, 4, 1, 0).unwrap()).await;

        let report = aggregator
            .run(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap())
            .await
            .unwrap();
        assert_eq!(report.day.label(), "2024-03-09");
        assert_eq!(
            report.stations.outcomes[0].result.as_ref().unwrap(),
            "https://h.example/daily/2024-03-09/station-5.json"
        );
        assert_eq!(bikes_in(&blobs, "daily/2024-03-09/station-5.json").await, vec![1]);

        aggregator
            .run(Utc.with_ymd_and_hms(2024, 3, 11, 12, 0, 0).unwrap())
            .await
            .unwrap();
        assert_eq!(bikes_in(&blobs, "daily/2024-03-10/station-5.json").await, vec![2]);
    }

    #[tokio::test]
    async fn test_daily_artifacts_accumulate() {
        let (_dir, store, blobs, aggregator) = setup();
        record(&store, 3, Utc.with_ymd_and_hms(2024, 3, 9, 15, 0, 0).unwrap()).await;

        aggregator
            .run(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap())
            .await
            .unwrap();
        aggregator
            .run(Utc.with_ymd_and_hms(2024, 3, 11, 12, 0, 0).unwrap())
            .await
            .unwrap();

        assert_eq!(
            blobs.keys(),
            vec![
                "daily/2024-03-09/station-5.json".to_string(),
                "daily/2024-03-10/station-5.json".to_string(),
            ]
        );
        // No readings that day still yields an (empty) export
        assert!(bikes_in(&blobs, "daily/2024-03-10/station-5.json").await.is_empty());
    }

    #[tokio::test]
    async fn test_backfill_explicit_day() {
        let (_dir, store, blobs, aggregator) = setup();
        record(&store, 6, Utc.with_ymd_and_hms(2024, 3, 1, 16, 0, 0).unwrap()).await;

        let day = crate::pipeline::calendar::day_bounds(
            chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        );
        let report = aggregator
            .run_for_day(day, Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap())
            .await
            .unwrap();

        assert_eq!(report.stations.succeeded(), 1);
        assert_eq!(bikes_in(&blobs, "daily/2024-03-01/station-5.json").await, vec![6]);
    }
}
