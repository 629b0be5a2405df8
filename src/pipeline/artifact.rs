//! Export artifacts: kinds, deterministic keys and the JSON envelope

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::calendar::{to_iso, DayBounds};
use super::error::PipelineResult;
use super::types::{AvailabilityPoint, Station, StationRef, StationSeries};

pub const CURRENT_AVAILABLE_KEY: &str = "current-available.json";
pub const PAST_24H_AVAILABLE_KEY: &str = "past-24h-available.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SnapshotKind {
    #[serde(rename = "CURRENT_AVAILABLE")]
    CurrentAvailable,
    #[serde(rename = "PAST_24H_STATION_AVAILABILITY")]
    Past24hStation,
    #[serde(rename = "DAILY_STATION_AVAILABILITY")]
    DailyStation,
    #[serde(rename = "PAST_24H_AVAILABILITY")]
    Past24hNetwork,
}

impl SnapshotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::CurrentAvailable => "CURRENT_AVAILABLE",
            SnapshotKind::Past24hStation => "PAST_24H_STATION_AVAILABILITY",
            SnapshotKind::DailyStation => "DAILY_STATION_AVAILABILITY",
            SnapshotKind::Past24hNetwork => "PAST_24H_AVAILABILITY",
        }
    }

}

impl std::str::FromStr for SnapshotKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CURRENT_AVAILABLE" => Ok(SnapshotKind::CurrentAvailable),
            "PAST_24H_STATION_AVAILABILITY" => Ok(SnapshotKind::Past24hStation),
            "DAILY_STATION_AVAILABILITY" => Ok(SnapshotKind::DailyStation),
            "PAST_24H_AVAILABILITY" => Ok(SnapshotKind::Past24hNetwork),
            other => Err(format!("unknown snapshot kind: {}", other)),
        }
    }
}

/// A publishable export, built in memory and never stored as a row
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub kind: SnapshotKind,
    /// Blob address; the same logical artifact always gets the same key
    pub key: String,
    pub label: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub station_id: Option<i64>,
    pub station_name: Option<String>,
    pub data: Value,
}

/// Serialized form written to the blob store
///
/// Field order here is the order in the published document.
#[derive(Debug, Serialize)]
struct SnapshotDocument<'a> {
    description: &'a str,
    kind: SnapshotKind,
    label: &'a str,
    timestamp: String,
    data: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    station_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    station_name: Option<&'a str>,
}

pub fn past_24h_station_key(station_id: i64) -> String {
    format!("past-24h/station-{}.json", station_id)
}

pub fn daily_station_key(station_id: i64, day_label: &str) -> String {
    format!("daily/{}/station-{}.json", day_label, station_id)
}

impl ExportArtifact {
    /// All stations as last reported by the source
    pub fn current_available(stations: &[Station], captured_at: DateTime<Utc>) -> PipelineResult<Self> {
        Ok(Self {
            kind: SnapshotKind::CurrentAvailable,
            key: CURRENT_AVAILABLE_KEY.to_string(),
            label: "Current availability".to_string(),
            description: "Bikes and free docks at every station, as last captured".to_string(),
            timestamp: captured_at,
            station_id: None,
            station_name: None,
            data: serde_json::to_value(stations)?,
        })
    }

    pub fn past_24h_station(
        station: &StationRef,
        points: &[AvailabilityPoint],
        generated_at: DateTime<Utc>,
    ) -> PipelineResult<Self> {
        Ok(Self {
            kind: SnapshotKind::Past24hStation,
            key: past_24h_station_key(station.station_id),
            label: format!("{} - past 24 hours", station.station_name),
            description: format!(
                "Availability changes at {} over the 24 hours before generation",
                station.station_name
            ),
            timestamp: generated_at,
            station_id: Some(station.station_id),
            station_name: Some(station.station_name.clone()),
            data: serde_json::to_value(points)?,
        })
    }

    pub fn daily_station(
        station: &StationRef,
        day: &DayBounds,
        points: &[AvailabilityPoint],
        generated_at: DateTime<Utc>,
    ) -> PipelineResult<Self> {
        let day_label = day.label();
        Ok(Self {
            kind: SnapshotKind::DailyStation,
            key: daily_station_key(station.station_id, &day_label),
            label: format!("{} - {}", station.station_name, day_label),
            description: format!(
                "Availability changes at {} during {} (UTC-4)",
                station.station_name, day_label
            ),
            timestamp: generated_at,
            station_id: Some(station.station_id),
            station_name: Some(station.station_name.clone()),
            data: serde_json::to_value(points)?,
        })
    }

    /// Every station's trailing-24h series in one document
    pub fn past_24h_network(series: &[StationSeries], generated_at: DateTime<Utc>) -> PipelineResult<Self> {
        Ok(Self {
            kind: SnapshotKind::Past24hNetwork,
            key: PAST_24H_AVAILABLE_KEY.to_string(),
            label: "All stations - past 24 hours".to_string(),
            description: "Availability changes at every station over the 24 hours before generation"
                .to_string(),
            timestamp: generated_at,
            station_id: None,
            station_name: None,
            data: serde_json::to_value(series)?,
        })
    }

    /// Canonical JSON envelope bytes
    pub fn to_json(&self) -> PipelineResult<Vec<u8>> {
        let document = SnapshotDocument {
            description: &self.description,
            kind: self.kind,
            label: &self.label,
            timestamp: to_iso(self.timestamp),
            data: &self.data,
            station_id: self.station_id,
            station_name: self.station_name.as_deref(),
        };
        Ok(serde_json::to_vec(&document)?)
    }
}
