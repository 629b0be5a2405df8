//! # Station availability snapshot pipeline
//!
//! Periodically captures bike and dock availability for every station into an
//! append-only SQLite time series, and publishes derived JSON snapshots to a
//! blob store with a queryable index of what was published.
//!
//! ## Flow
//!
//! 1. Frequent trigger: the reading source is polled, one row per station is
//!    appended, the current snapshot is published, then every station's
//!    trailing 24 hours are compacted and published
//! 2. Daily trigger: every station's previous local calendar day (fixed
//!    UTC-4) is compacted and published under a dated key
//!
//! Compaction keeps the first and last point of a series plus every point
//! whose availability differs from the one before it.
//!
//! Publishing writes the blob first, then replaces the index row for its url.
//! A publish interrupted between the two heals on the next publish of the same
//! key.
//!
//! ## Module Organization
//!
//! - `types` - Source stations, stored readings, exported points
//! - `calendar` - Fixed-offset local calendar and ISO timestamps
//! - `compaction` - Change-point compaction of a series
//! - `db` - Reading store trait and SQLite implementation
//! - `index` - Snapshot index trait and SQLite implementation
//! - `artifact` - Export kinds, keys and the JSON envelope
//! - `blob` - Blob store trait, filesystem and in-memory backends
//! - `publisher` - Blob write + index reconciliation
//! - `source` - Current reading source
//! - `ingestion` - Sequential per-tick ingestion
//! - `batch` - Per-station concurrent fan-out
//! - `window` / `daily` - The two aggregators
//! - `engine` - Tick entry points
//! - `scheduler` - Trigger loops

pub mod types;
pub mod calendar;
pub mod compaction;
pub mod error;
pub mod db;
pub mod index;
pub mod artifact;
pub mod blob;
pub mod publisher;
pub mod source;
pub mod ingestion;
pub mod batch;
pub mod window;
pub mod daily;
pub mod engine;
pub mod config;
pub mod scheduler;

// Re-export commonly used types
pub use types::{AvailabilityPoint, Reading, Station, StationRef, StationSeries};
pub use error::{PipelineError, PipelineResult};
pub use db::{open_database, SqliteTimeSeriesStore, TimeSeriesStore};
pub use index::{SnapshotIndex, SnapshotRecord, SqliteSnapshotIndex};
pub use artifact::{ExportArtifact, SnapshotKind};
pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use publisher::SnapshotPublisher;
pub use source::{HttpReadingSource, ReadingSource};
pub use ingestion::{IngestionCollector, InsertFailurePolicy};
pub use engine::{FrequentTickReport, SnapshotPipeline};
pub use config::PipelineConfig;
