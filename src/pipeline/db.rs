//! Time-series store: append-only `state` table in SQLite
//!
//! Readings are only ever inserted. Exports are recomputed from this table on
//! every tick, so it is the single source of truth for all artifacts.
//!
//! Exports fan out per `station_id`: a renamed station is exported once, under
//! its newest name.

use super::calendar::to_iso;
use super::error::{PipelineError, PipelineResult};
use super::types::{AvailabilityPoint, Reading, StationRef};
use crate::sqlite_pragma::apply_optimized_pragmas;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// One connection shared by the store, the index and all per-station tasks
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Lock the shared connection
///
/// A task that panicked while holding the lock leaves the connection itself
/// usable, so poisoning is ignored.
pub fn lock_connection(conn: &SharedConnection) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Read access to readings plus the append used by ingestion
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Insert one reading row
    async fn append(&self, reading: &Reading) -> PipelineResult<()>;

    /// Every station ever observed, with its most recently recorded name
    async fn stations(&self) -> PipelineResult<Vec<StationRef>>;

    /// Readings of one station with `timestamp >= since`, oldest first
    async fn readings_since(
        &self,
        station_id: i64,
        since: DateTime<Utc>,
    ) -> PipelineResult<Vec<AvailabilityPoint>>;

    /// Readings of one station with `start <= timestamp <= end`, oldest first
    async fn readings_between(
        &self,
        station_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PipelineResult<Vec<AvailabilityPoint>>;
}

/// Run schema migrations from SQL files
///
/// Executes every `.sql` file of `schema_dir` in filename order. Files must
/// use `IF NOT EXISTS` so reruns are harmless.
pub fn run_schema_migrations(conn: &mut Connection, schema_dir: &str) -> PipelineResult<()> {
    let schema_path = Path::new(schema_dir);

    if !schema_path.exists() {
        return Err(PipelineError::Config(format!(
            "Schema directory not found: {}",
            schema_dir
        )));
    }

    let mut sql_files: Vec<_> = fs::read_dir(schema_path)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();

    sql_files.sort_by_key(|entry| entry.file_name());

    log::info!("🔧 Running schema migrations from: {}", schema_dir);

    for entry in sql_files {
        let path = entry.path();
        let filename = entry.file_name().to_string_lossy().into_owned();

        log::info!("   ├─ Executing: {}", filename);
        let sql_content = fs::read_to_string(&path)?;
        conn.execute_batch(&sql_content)?;
    }

    log::info!("✅ All schema migrations completed successfully");

    Ok(())
}

/// Open (creating if needed) the database at `db_path` and apply the schema
pub fn open_database(db_path: &str, schema_dir: &str) -> PipelineResult<SharedConnection> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut conn = Connection::open(db_path)?;
    apply_optimized_pragmas(&conn)?;
    run_schema_migrations(&mut conn, schema_dir)?;

    Ok(Arc::new(Mutex::new(conn)))
}

/// SQLite implementation of TimeSeriesStore
pub struct SqliteTimeSeriesStore {
    conn: SharedConnection,
}

impl SqliteTimeSeriesStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn query_points(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> PipelineResult<Vec<AvailabilityPoint>> {
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(AvailabilityPoint {
                bikes: row.get(0)?,
                free_docks: row.get(1)?,
                timestamp: row.get(2)?,
            })
        })?;

        let mut points = Vec::new();
        for row in rows {
            points.push(row?);
        }
        Ok(points)
    }
}

#[async_trait]
impl TimeSeriesStore for SqliteTimeSeriesStore {
    async fn append(&self, reading: &Reading) -> PipelineResult<()> {
        let conn = lock_connection(&self.conn);

        conn.execute(
            r#"
            INSERT INTO state (
                station_id, station_name, bikes, free_docks, timestamp,
                edt_minute, edt_hour, edt_date, edt_month, edt_year
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                reading.station_id,
                reading.station_name,
                reading.bikes,
                reading.free_docks,
                reading.timestamp,
                reading.local.minute,
                reading.local.hour,
                reading.local.date,
                reading.local.month,
                reading.local.year,
            ],
        )?;

        Ok(())
    }

    async fn stations(&self) -> PipelineResult<Vec<StationRef>> {
        let conn = lock_connection(&self.conn);

        // Latest row per station decides the name when a station was renamed
        let mut stmt = conn.prepare_cached(
            r#"
            SELECT s.station_id, s.station_name
            FROM state s
            JOIN (SELECT station_id, MAX(id) AS max_id FROM state GROUP BY station_id) latest
              ON s.id = latest.max_id
            ORDER BY s.station_id ASC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(StationRef {
                station_id: row.get(0)?,
                station_name: row.get(1)?,
            })
        })?;

        let mut stations = Vec::new();
        for row in rows {
            stations.push(row?);
        }
        Ok(stations)
    }

    async fn readings_since(
        &self,
        station_id: i64,
        since: DateTime<Utc>,
    ) -> PipelineResult<Vec<AvailabilityPoint>> {
        let conn = lock_connection(&self.conn);
        let since = to_iso(since);

        Self::query_points(
            &conn,
            "SELECT bikes, free_docks, timestamp FROM state
             WHERE station_id = ?1 AND timestamp >= ?2
             ORDER BY timestamp ASC, id ASC",
            params![station_id, since],
        )
    }

    async fn readings_between(
        &self,
        station_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PipelineResult<Vec<AvailabilityPoint>> {
        let conn = lock_connection(&self.conn);
        let (start, end) = (to_iso(start), to_iso(end));

        Self::query_points(
            &conn,
            "SELECT bikes, free_docks, timestamp FROM state
             WHERE station_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3
             ORDER BY timestamp ASC, id ASC",
            params![station_id, start, end],
        )
    }
}
