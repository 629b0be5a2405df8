//! Pipeline entry points
//!
//! `SnapshotPipeline` wires the source, the store and the publisher together
//! and exposes one method per scheduled trigger. It holds no per-tick state,
//! so any tick can be invoked on its own (scheduler, `--once`, tests).

use super::artifact::ExportArtifact;
use super::config::PipelineConfig;
use super::daily::{DailyAggregator, DailyReport};
use super::db::TimeSeriesStore;
use super::error::PipelineResult;
use super::ingestion::{IngestionCollector, IngestionReport, InsertFailurePolicy};
use super::publisher::SnapshotPublisher;
use super::source::ReadingSource;
use super::types::Station;
use super::window::{WindowAggregator, WindowReport};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Everything the frequent trigger did, stage by stage
#[derive(Debug)]
pub struct FrequentTickReport {
    pub captured_at: DateTime<Utc>,
    /// `Err` when the source could not be read; nothing was written then
    pub ingestion: PipelineResult<IngestionReport>,
    /// `None` when the current export is disabled or the fetch failed
    pub current: Option<PipelineResult<String>>,
    pub window: PipelineResult<WindowReport>,
}

impl FrequentTickReport {
    /// True when every stage and every station succeeded
    pub fn is_clean(&self) -> bool {
        let ingestion_ok = matches!(&self.ingestion, Ok(r) if r.is_complete());
        let current_ok = !matches!(&self.current, Some(Err(_)));
        let window_ok = match &self.window {
            Ok(w) => w.stations.failed() == 0 && !matches!(&w.network, Some(Err(_))),
            Err(_) => false,
        };
        ingestion_ok && current_ok && window_ok
    }
}

pub struct SnapshotPipeline {
    source: Arc<dyn ReadingSource>,
    collector: IngestionCollector,
    publisher: Arc<SnapshotPublisher>,
    window: WindowAggregator,
    daily: DailyAggregator,
    publish_current: bool,
}

impl SnapshotPipeline {
    pub fn new(
        store: Arc<dyn TimeSeriesStore>,
        source: Arc<dyn ReadingSource>,
        publisher: Arc<SnapshotPublisher>,
        policy: InsertFailurePolicy,
    ) -> Self {
        Self {
            source,
            collector: IngestionCollector::new(store.clone(), policy),
            window: WindowAggregator::new(store.clone(), publisher.clone()),
            daily: DailyAggregator::new(store, publisher.clone()),
            publisher,
            publish_current: true,
        }
    }

    pub fn from_config(
        config: &PipelineConfig,
        store: Arc<dyn TimeSeriesStore>,
        source: Arc<dyn ReadingSource>,
        publisher: Arc<SnapshotPublisher>,
    ) -> Self {
        Self::new(store, source, publisher, config.insert_failure_policy)
            .with_current_export(config.publish_current)
            .with_network_export(config.publish_network_24h)
    }

    pub fn with_current_export(mut self, enabled: bool) -> Self {
        self.publish_current = enabled;
        self
    }

    pub fn with_network_export(mut self, enabled: bool) -> Self {
        self.window = self.window.with_network_export(enabled);
        self
    }

    /// Ingest, publish the current snapshot, then refresh every past-24h export
    ///
    /// The window aggregator always runs: it reads whatever the store holds,
    /// so a failed fetch only means this tick adds no new rows.
    pub async fn run_frequent_tick(&self, now: DateTime<Utc>) -> FrequentTickReport {
        log::info!("🔄 Frequent tick at {}", now);

        let mut current = None;
        let ingestion = match self.source.fetch_current().await {
            Ok(stations) => {
                let report = self.collector.ingest(&stations, now).await;

                if self.publish_current {
                    current = Some(self.publish_current_snapshot(&stations, now).await);
                }

                Ok(report)
            }
            Err(e) => {
                log::error!("❌ Failed to fetch current readings: {}", e);
                Err(e)
            }
        };

        let window = self.window.run(now).await;
        if let Err(e) = &window {
            log::error!("❌ Past-24h export failed: {}", e);
        }

        let report = FrequentTickReport {
            captured_at: now,
            ingestion,
            current,
            window,
        };

        if report.is_clean() {
            log::info!("✅ Frequent tick complete");
        } else {
            log::warn!("⚠️  Frequent tick finished with failures");
        }

        report
    }

    /// Export the previous local day for every station
    pub async fn run_daily_tick(&self, now: DateTime<Utc>) -> PipelineResult<DailyReport> {
        log::info!("🔄 Daily tick at {}", now);
        let result = self.daily.run(now).await;
        if let Err(e) = &result {
            log::error!("❌ Daily export failed: {}", e);
        }
        result
    }

    async fn publish_current_snapshot(
        &self,
        stations: &[Station],
        captured_at: DateTime<Utc>,
    ) -> PipelineResult<String> {
        let artifact = ExportArtifact::current_available(stations, captured_at)?;
        let result = self.publisher.publish(&artifact).await;
        match &result {
            Ok(url) => log::info!("📤 Current snapshot: {} stations → {}", stations.len(), url),
            Err(e) => log::error!("❌ Current snapshot failed: {}", e),
        }
        result
    }
}
