//! Stationboard timetable client (transport.opendata.ch).
//!
//! The stationboard service returns scheduled departures for a named
//! station. The upstream filter is by transport category only, so the
//! results are narrowed to the configured line number client-side.
//!
//! Response fields used per entry:
//! - `category` - transport category ("T" for trams)
//! - `number` - line number as a string
//! - `to` - destination name
//! - `stop.departure` - scheduled departure, ISO 8601 (e.g.
//!   `2025-11-19T14:36:00+0100`); null for cancelled trips
//! - `stop.delay` - delay in minutes, when the board already knows one

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Transport category code for trams on the stationboard service.
const TRAM_CATEGORY: &str = "T";

/// Entries requested per board; more than we ever show, so the line filter
/// still leaves enough departures.
const BOARD_LIMIT: u32 = 20;

/// One scheduled departure, valid for a single polling cycle.
#[derive(Debug, Clone)]
pub struct ScheduledDeparture {
    pub scheduled_time: DateTime<FixedOffset>,
    pub destination: String,
    pub line: String,
    /// Delay already known to the timetable source, in seconds.
    pub own_delay_seconds: i32,
}

#[derive(Debug, Deserialize)]
struct StationboardResponse {
    stationboard: Vec<StationboardEntry>,
}

#[derive(Debug, Deserialize)]
struct StationboardEntry {
    category: Option<String>,
    number: Option<String>,
    to: Option<String>,
    stop: StationboardStop,
}

#[derive(Debug, Deserialize)]
struct StationboardStop {
    departure: Option<String>,
    delay: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum StationboardError {
    #[error("stationboard request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("stationboard returned HTTP {0}")]
    Status(u16),
}

/// Get scheduled tram departures for a station, filtered to one line.
pub async fn fetch_stationboard(
    client: &reqwest::Client,
    base_url: &str,
    station: &str,
    line: &str,
) -> Result<Vec<ScheduledDeparture>, StationboardError> {
    let url = format!(
        "{}?station={}&limit={}&transportations[]=tram",
        base_url,
        urlencoding::encode(station),
        BOARD_LIMIT
    );

    debug!(url = %url, station = %station, "Fetching stationboard");

    let response = client.get(&url).send().await?;

    if !response.status().is_success() {
        return Err(StationboardError::Status(response.status().as_u16()));
    }

    let data: StationboardResponse = response.json().await?;

    let departures: Vec<ScheduledDeparture> = data
        .stationboard
        .into_iter()
        .filter(|entry| {
            entry.category.as_deref() == Some(TRAM_CATEGORY)
                && entry.number.as_deref() == Some(line)
        })
        .filter_map(|entry| to_scheduled(entry, line))
        .collect();

    info!(
        station = %station,
        line = %line,
        count = departures.len(),
        "Retrieved scheduled departures"
    );

    Ok(departures)
}

/// Map one board entry to a [`ScheduledDeparture`]. Entries without a
/// parseable departure time are dropped; the upstream nulls the departure
/// for cancelled trips.
fn to_scheduled(entry: StationboardEntry, line: &str) -> Option<ScheduledDeparture> {
    let raw = entry.stop.departure?;
    let scheduled_time = match parse_departure(&raw) {
        Ok(dt) => dt,
        Err(err) => {
            warn!(departure = %raw, error = %err, "Skipping unparseable departure time");
            return None;
        }
    };

    Some(ScheduledDeparture {
        scheduled_time,
        destination: entry.to.unwrap_or_default(),
        line: line.to_string(),
        own_delay_seconds: entry.stop.delay.unwrap_or(0) * 60,
    })
}

/// Parse the board's ISO 8601 timestamps; offsets come without a colon
/// (`+0100`).
fn parse_departure(raw: &str) -> chrono::ParseResult<DateTime<FixedOffset>> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z")
}
