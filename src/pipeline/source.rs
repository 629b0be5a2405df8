//! Reading source adapter
//!
//! Station scraping lives in a separate service. This module only consumes
//! its JSON output: an array of `{id, name, bikes, free_docks, lat?, long?}`.

use super::error::{PipelineError, PipelineResult};
use super::types::Station;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Current reading of every known station
    async fn fetch_current(&self) -> PipelineResult<Vec<Station>>;
}

pub fn parse_stations(body: &[u8]) -> PipelineResult<Vec<Station>> {
    let stations: Vec<Station> = serde_json::from_slice(body)?;
    Ok(stations)
}

/// Fetches the current station list from an HTTP endpoint
pub struct HttpReadingSource {
    url: String,
    client: reqwest::Client,
}

impl HttpReadingSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> PipelineResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl ReadingSource for HttpReadingSource {
    async fn fetch_current(&self) -> PipelineResult<Vec<Station>> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(PipelineError::Source(format!(
                "{} answered {}",
                self.url,
                response.status()
            )));
        }

        let body = response.bytes().await?;
        let stations = parse_stations(&body)?;
        log::debug!("📥 Fetched {} stations from {}", stations.len(), self.url);
        Ok(stations)
    }
}
