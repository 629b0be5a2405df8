//! Trailing 24-hour export per station
//!
//! Keys depend on the station id only, so every run overwrites the previous
//! run's object for that station.

use super::artifact::ExportArtifact;
use super::batch::{for_each_station, BatchReport};
use super::compaction::compact;
use super::db::TimeSeriesStore;
use super::error::{PipelineError, PipelineResult};
use super::publisher::SnapshotPublisher;
use super::types::StationSeries;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const WINDOW_HOURS: i64 = 24;

#[derive(Debug)]
pub struct WindowReport {
    pub stations: BatchReport<StationSeries>,
    /// Network-wide export; `None` when disabled or nothing succeeded
    pub network: Option<PipelineResult<String>>,
}

pub struct WindowAggregator {
    store: Arc<dyn TimeSeriesStore>,
    publisher: Arc<SnapshotPublisher>,
    publish_network: bool,
}

impl WindowAggregator {
    pub fn new(store: Arc<dyn TimeSeriesStore>, publisher: Arc<SnapshotPublisher>) -> Self {
        Self {
            store,
            publisher,
            publish_network: false,
        }
    }

    /// Also publish every station's series bundled in one document
    pub fn with_network_export(mut self, enabled: bool) -> Self {
        self.publish_network = enabled;
        self
    }

    pub async fn run(&self, now: DateTime<Utc>) -> PipelineResult<WindowReport> {
        let since = now - Duration::hours(WINDOW_HOURS);
        let stations = self.store.stations().await?;
        log::info!("⏱️  Past-24h export for {} stations (since {})", stations.len(), since);

        let report = for_each_station(stations, |station| {
            let store = self.store.clone();
            let publisher = self.publisher.clone();
            async move {
                let points = store.readings_since(station.station_id, since).await?;
                let compacted = compact(&points);
                let artifact = ExportArtifact::past_24h_station(&station, &compacted, now)?;
                publisher.publish(&artifact).await?;

                log::debug!(
                    "   ├─ station {}: {} → {} points",
                    station.station_id,
                    points.len(),
                    compacted.len()
                );

                Ok::<_, PipelineError>(StationSeries {
                    station_id: station.station_id,
                    station_name: station.station_name,
                    data: compacted,
                })
            }
        })
        .await;

        let network = if self.publish_network && report.succeeded() > 0 {
            Some(self.publish_network_export(&report, now).await)
        } else {
            None
        };

        log::info!(
            "✅ Past-24h export: {} published, {} failed",
            report.succeeded(),
            report.failed()
        );

        Ok(WindowReport {
            stations: report,
            network,
        })
    }

    async fn publish_network_export(
        &self,
        report: &BatchReport<StationSeries>,
        now: DateTime<Utc>,
    ) -> PipelineResult<String> {
        let series: Vec<StationSeries> = report
            .outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().cloned())
            .collect();

        let artifact = ExportArtifact::past_24h_network(&series, now)?;
        let result = self.publisher.publish(&artifact).await;
        if let Err(e) = &result {
            log::error!("❌ Network-wide past-24h export failed: {}", e);
        }
        result
    }
}
