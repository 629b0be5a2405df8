//! Snapshot index: metadata rows pointing at the latest blob of each artifact
//!
//! The `snapshot` table has no unique constraint on `url`. One row per url is
//! maintained by `replace_by_url`, which deletes and then inserts.

use super::artifact::SnapshotKind;
use super::db::{lock_connection, SharedConnection};
use super::error::PipelineResult;
use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

/// Row of the `snapshot` table
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    pub kind: SnapshotKind,
    pub label: String,
    pub url: String,
    pub timestamp: String,
    pub station_id: Option<i64>,
    pub station_name: Option<String>,
}

#[async_trait]
pub trait SnapshotIndex: Send + Sync {
    /// Remove every row addressing `url`, returning how many were removed
    async fn delete_by_url(&self, url: &str) -> PipelineResult<usize>;

    async fn insert(&self, record: &SnapshotRecord) -> PipelineResult<()>;

    async fn records_for_url(&self, url: &str) -> PipelineResult<Vec<SnapshotRecord>>;

    /// Most recent record of `kind`, restricted to one station when given
    async fn latest(
        &self,
        kind: SnapshotKind,
        station_id: Option<i64>,
    ) -> PipelineResult<Option<SnapshotRecord>>;

    /// Delete-then-insert reconciliation
    ///
    /// Two separate statements without a transaction: a crash in between
    /// leaves the url briefly unindexed until the next publish of that key.
    async fn replace_by_url(&self, record: &SnapshotRecord) -> PipelineResult<()> {
        let removed = self.delete_by_url(&record.url).await?;
        if removed > 1 {
            log::warn!("⚠️  Removed {} duplicate index rows for {}", removed, record.url);
        }
        self.insert(record).await
    }
}

/// SQLite implementation of SnapshotIndex
pub struct SqliteSnapshotIndex {
    conn: SharedConnection,
}

impl SqliteSnapshotIndex {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRecord> {
        let kind: String = row.get(0)?;
        let kind: SnapshotKind = kind.parse().map_err(|msg: String| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, msg.into())
        })?;

        Ok(SnapshotRecord {
            kind,
            label: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            url: row.get(2)?,
            timestamp: row.get(3)?,
            station_id: row.get(4)?,
            station_name: row.get(5)?,
        })
    }
}

#[async_trait]
impl SnapshotIndex for SqliteSnapshotIndex {
    async fn delete_by_url(&self, url: &str) -> PipelineResult<usize> {
        let conn = lock_connection(&self.conn);
        let removed = conn.execute("DELETE FROM snapshot WHERE url = ?", [url])?;
        Ok(removed)
    }

    async fn insert(&self, record: &SnapshotRecord) -> PipelineResult<()> {
        let conn = lock_connection(&self.conn);

        conn.execute(
            r#"
            INSERT INTO snapshot (kind, label, url, timestamp, station_id, station_name)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.kind.as_str(),
                record.label,
                record.url,
                record.timestamp,
                record.station_id,
                record.station_name,
            ],
        )?;

        Ok(())
    }

    async fn records_for_url(&self, url: &str) -> PipelineResult<Vec<SnapshotRecord>> {
        let conn = lock_connection(&self.conn);
        let mut stmt = conn.prepare_cached(
            "SELECT kind, label, url, timestamp, station_id, station_name
             FROM snapshot WHERE url = ? ORDER BY id ASC",
        )?;

        let rows = stmt.query_map([url], Self::map_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    async fn latest(
        &self,
        kind: SnapshotKind,
        station_id: Option<i64>,
    ) -> PipelineResult<Option<SnapshotRecord>> {
        let conn = lock_connection(&self.conn);

        let record = match station_id {
            Some(id) => conn
                .query_row(
                    "SELECT kind, label, url, timestamp, station_id, station_name
                     FROM snapshot WHERE kind = ?1 AND station_id = ?2
                     ORDER BY timestamp DESC, id DESC LIMIT 1",
                    params![kind.as_str(), id],
                    Self::map_row,
                )
                .optional()?,
            None => conn
                .query_row(
                    "SELECT kind, label, url, timestamp, station_id, station_name
                     FROM snapshot WHERE kind = ?1
                     ORDER BY timestamp DESC, id DESC LIMIT 1",
                    params![kind.as_str()],
                    Self::map_row,
                )
                .optional()?,
        };

        Ok(record)
    }
}
