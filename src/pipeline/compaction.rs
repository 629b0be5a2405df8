//! Change-point compaction of availability series
//!
//! Keeps every point where `(bikes, free_docks)` changed relative to the point
//! right before it, plus the first and last points so the series still spans
//! its full time extent.

use super::types::AvailabilityPoint;

pub fn compact(points: &[AvailabilityPoint]) -> Vec<AvailabilityPoint> {
    let Some(first) = points.first() else {
        return Vec::new();
    };

    let last_index = points.len() - 1;
    let mut output = Vec::with_capacity(points.len());
    output.push(first.clone());

    for (i, pair) in points.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        if !current.same_availability(previous) || i + 1 == last_index {
            output.push(current.clone());
        }
    }

    output
}
