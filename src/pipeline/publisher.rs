//! Snapshot publisher: blob write followed by index reconciliation
//!
//! Order per artifact:
//! 1. serialize the envelope
//! 2. `put` the blob at its key (overwrite)
//! 3. derive the public url from the key
//! 4. delete index rows for that url
//! 5. insert the new index row
//!
//! Nothing spans the blob store and the index. A crash after step 2 leaves a
//! correct blob with a stale or missing index row until the key is published
//! again on a later tick.

use super::artifact::ExportArtifact;
use super::blob::{public_url, BlobStore, JSON_CONTENT_TYPE};
use super::calendar::to_iso;
use super::error::PipelineResult;
use super::index::{SnapshotIndex, SnapshotRecord};
use std::sync::Arc;

pub struct SnapshotPublisher {
    blobs: Arc<dyn BlobStore>,
    index: Arc<dyn SnapshotIndex>,
    base_host: String,
}

impl SnapshotPublisher {
    pub fn new(blobs: Arc<dyn BlobStore>, index: Arc<dyn SnapshotIndex>, base_host: impl Into<String>) -> Self {
        Self {
            blobs,
            index,
            base_host: base_host.into(),
        }
    }

    pub fn url_for(&self, key: &str) -> String {
        public_url(&self.base_host, key)
    }

    /// Publish one artifact, returning its public url
    pub async fn publish(&self, artifact: &ExportArtifact) -> PipelineResult<String> {
        let body = artifact.to_json()?;

        self.blobs.put(&artifact.key, &body, JSON_CONTENT_TYPE).await?;

        let url = self.url_for(&artifact.key);
        let record = SnapshotRecord {
            kind: artifact.kind,
            label: artifact.label.clone(),
            url: url.clone(),
            timestamp: to_iso(artifact.timestamp),
            station_id: artifact.station_id,
            station_name: artifact.station_name.clone(),
        };
        self.index.replace_by_url(&record).await?;

        log::debug!(
            "📤 Published {} → {} ({} bytes, {})",
            artifact.kind.as_str(),
            url,
            body.len(),
            self.blobs.backend_type()
        );

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::artifact::SnapshotKind;
    use crate::pipeline::blob::MemoryBlobStore;
    use crate::pipeline::db::open_database;
    use crate::pipeline::index::SqliteSnapshotIndex;
    use crate::pipeline::error::PipelineError;
    use crate::pipeline::types::{AvailabilityPoint, StationRef};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    /// Index whose next insert fails, as if the process died after the blob write
    struct InterruptedIndex {
        inner: Arc<SqliteSnapshotIndex>,
        fail_next_insert: AtomicBool,
    }

    #[async_trait]
    impl SnapshotIndex for InterruptedIndex {
        async fn delete_by_url(&self, url: &str) -> PipelineResult<usize> {
            self.inner.delete_by_url(url).await
        }

        async fn insert(&self, record: &SnapshotRecord) -> PipelineResult<()> {
            if self.fail_next_insert.swap(false, Ordering::SeqCst) {
                return Err(PipelineError::Database(rusqlite::Error::InvalidQuery));
            }
            self.inner.insert(record).await
        }

        async fn records_for_url(&self, url: &str) -> PipelineResult<Vec<SnapshotRecord>> {
            self.inner.records_for_url(url).await
        }

        async fn latest(
            &self,
            kind: SnapshotKind,
            station_id: Option<i64>,
        ) -> PipelineResult<Option<SnapshotRecord>> {
            self.inner.latest(kind, station_id).await
        }
    }

    fn setup() -> (TempDir, Arc<MemoryBlobStore>, Arc<SqliteSnapshotIndex>, SnapshotPublisher) {
        let dir = TempDir::new().unwrap();
        let conn = open_database(dir.path().join("p.db").to_str().unwrap(), "sql").unwrap();
        let blobs = Arc::new(MemoryBlobStore::new());
        let index = Arc::new(SqliteSnapshotIndex::new(conn));
        let publisher = SnapshotPublisher::new(blobs.clone(), index.clone(), "snapshots.example.com");
        (dir, blobs, index, publisher)
    }

    fn artifact(minute: u32, bikes: i64) -> ExportArtifact {
        let station = StationRef {
            station_id: 4,
            station_name: "Saint-Roch".to_string(),
        };
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, minute, 0).unwrap();
        let points = vec![AvailabilityPoint {
            bikes: Some(bikes),
            free_docks: Some(10 - bikes),
            timestamp: to_iso(at),
        }];
        ExportArtifact::past_24h_station(&station, &points, at).unwrap()
    }

    #[tokio::test]
    async fn test_publish_writes_blob_and_index() {
        let (_dir, blobs, index, publisher) = setup();

        let url = publisher.publish(&artifact(0, 3)).await.unwrap();
        assert_eq!(url, "https://snapshots.example.com/past-24h/station-4.json");

        let meta = blobs.head("past-24h/station-4.json").await.unwrap().unwrap();
        assert_eq!(meta.content_type, JSON_CONTENT_TYPE);

        let stored = blobs.get("past-24h/station-4.json").await.unwrap().unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&stored).unwrap();
        assert_eq!(doc["kind"], "PAST_24H_STATION_AVAILABILITY");
        assert_eq!(doc["station_id"], 4);
        assert_eq!(doc["data"][0]["bikes"], 3);

        let rows = index.records_for_url(&url).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, SnapshotKind::Past24hStation);
        assert_eq!(rows[0].station_name.as_deref(), Some("Saint-Roch"));
        assert_eq!(rows[0].timestamp, "2024-06-01T12:00:00.000Z");
    }

    #[tokio::test]
    async fn test_publish_twice_leaves_one_row() {
        let (_dir, blobs, index, publisher) = setup();

        publisher.publish(&artifact(0, 3)).await.unwrap();
        let url = publisher.publish(&artifact(5, 6)).await.unwrap();

        let rows = index.records_for_url(&url).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, "2024-06-01T12:05:00.000Z");

        let stored = blobs.get("past-24h/station-4.json").await.unwrap().unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&stored).unwrap();
        assert_eq!(doc["data"][0]["bikes"], 6);
    }

    #[tokio::test]
    async fn test_missing_index_row_restored_on_next_publish() {
        let (_dir, blobs, sqlite_index, _) = setup();
        let index = Arc::new(InterruptedIndex {
            inner: sqlite_index,
            fail_next_insert: AtomicBool::new(true),
        });
        let publisher = SnapshotPublisher::new(blobs.clone(), index.clone(), "snapshots.example.com");
        let url = publisher.url_for("past-24h/station-4.json");

        assert!(publisher.publish(&artifact(0, 3)).await.is_err());
        // Blob landed, index row did not
        assert!(blobs.get("past-24h/station-4.json").await.unwrap().is_some());
        assert!(index.records_for_url(&url).await.unwrap().is_empty());

        publisher.publish(&artifact(5, 6)).await.unwrap();
        let rows = index.records_for_url(&url).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, "2024-06-01T12:05:00.000Z");
    }
}
