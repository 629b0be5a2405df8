//! Core data structures: source stations, stored readings, exported points

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::calendar::{to_iso, LocalFields};

/// One station as reported by the reading source at capture time
///
/// Counts the provider could not parse arrive as JSON `null` and stay unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub bikes: Option<i64>,
    #[serde(default)]
    pub free_docks: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long: Option<f64>,
}

/// Row of the `state` table
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub station_id: i64,
    pub station_name: String,
    pub bikes: Option<i64>,
    pub free_docks: Option<i64>,
    /// ISO-8601 UTC, millisecond precision (`2024-03-10T03:59:00.000Z`)
    pub timestamp: String,
    pub local: LocalFields,
}

impl Reading {
    /// Build the row for `station` captured at `captured_at`
    pub fn capture(station: &Station, captured_at: DateTime<Utc>) -> Self {
        Self {
            station_id: station.id,
            station_name: station.name.clone(),
            bikes: station.bikes,
            free_docks: station.free_docks,
            timestamp: to_iso(captured_at),
            local: LocalFields::from_utc(captured_at),
        }
    }
}

/// Availability at one instant, the unit of every exported series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityPoint {
    pub bikes: Option<i64>,
    pub free_docks: Option<i64>,
    pub timestamp: String,
}

impl AvailabilityPoint {
    pub fn same_availability(&self, other: &AvailabilityPoint) -> bool {
        self.bikes == other.bikes && self.free_docks == other.free_docks
    }
}

/// Station identity used to fan out per-station exports
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StationRef {
    pub station_id: i64,
    pub station_name: String,
}

/// Compacted series of one station, bundled into the network-wide export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSeries {
    pub station_id: i64,
    pub station_name: String,
    pub data: Vec<AvailabilityPoint>,
}
