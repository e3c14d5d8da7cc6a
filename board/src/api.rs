//! Client for the aggregation server's `/api/departures` endpoint.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(u16),
}

/// Payload of `GET /api/departures`. Stop boards sit at the top level of
/// the object next to `lastUpdate` and `source`, keyed by stop key.
#[derive(Debug, Clone, Deserialize)]
pub struct DeparturesResponse {
    #[serde(rename = "lastUpdate")]
    pub last_update: String,
    pub source: String,
    #[serde(flatten)]
    pub stops: BTreeMap<String, StopBoard>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopBoard {
    pub station: String,
    pub departures: Vec<WireDeparture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireDeparture {
    /// RFC 3339 scheduled departure time.
    pub time: String,
    pub destination: String,
    /// Delay in seconds; negative means running early.
    pub delay: i64,
    pub line: String,
}

#[derive(Debug, Clone)]
pub struct BoardClient {
    http: reqwest::Client,
    url: String,
}

impl BoardClient {
    pub fn new(server: &str) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            url: format!("{}/api/departures", server.trim_end_matches('/')),
        })
    }

    pub async fn fetch(&self) -> Result<DeparturesResponse, FetchError> {
        let response = self.http.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}
