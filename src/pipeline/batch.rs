//! Per-station fan-out
//!
//! One task per station, all spawned before any is awaited. Each task's
//! result is kept on its own: an error or a panic in one task never cancels a
//! sibling and never fails the batch.

use super::error::{PipelineError, PipelineResult};
use super::types::StationRef;
use std::future::Future;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct StationOutcome<T> {
    pub station: StationRef,
    pub result: PipelineResult<T>,
}

#[derive(Debug)]
pub struct BatchReport<T> {
    pub outcomes: Vec<StationOutcome<T>>,
}

impl<T> BatchReport<T> {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&StationRef, &PipelineError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.station, e)))
    }
}

/// Run `task` for every station concurrently and collect every outcome
pub async fn for_each_station<T, F, Fut>(stations: Vec<StationRef>, task: F) -> BatchReport<T>
where
    T: Send + 'static,
    F: Fn(StationRef) -> Fut,
    Fut: Future<Output = PipelineResult<T>> + Send + 'static,
{
    let handles: Vec<(StationRef, JoinHandle<PipelineResult<T>>)> = stations
        .into_iter()
        .map(|station| {
            let handle = tokio::spawn(task(station.clone()));
            (station, handle)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (station, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(join_error) => Err(PipelineError::from(join_error)),
        };

        if let Err(e) = &result {
            log::warn!(
                "⚠️  Station {} ({}) failed: {}",
                station.station_id,
                station.station_name,
                e
            );
        }

        outcomes.push(StationOutcome { station, result });
    }

    BatchReport { outcomes }
}
