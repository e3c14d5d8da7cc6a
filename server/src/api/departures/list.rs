use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use futures::future;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;
use utoipa::ToSchema;

use crate::api::{internal_error, AppState, ErrorResponse};
use crate::config::StopConfig;
use crate::gtfs_rt::FeedMessage;
use crate::reconcile::{self, MergedDeparture};
use crate::services::feed;
use crate::services::stationboard::{self, StationboardError};

/// Maximum departures returned per stop.
const MAX_DEPARTURES: usize = 10;

pub const SOURCE_COMBINED: &str = "combined";
pub const SOURCE_SCHEDULED_ONLY: &str = "scheduled-only";

/// One departure as returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct DepartureView {
    /// Scheduled departure, RFC 3339.
    pub time: String,
    pub destination: String,
    /// Delay in seconds, positive when running late; 0 means on time.
    pub delay: i32,
    pub line: String,
}

impl From<MergedDeparture> for DepartureView {
    fn from(dep: MergedDeparture) -> Self {
        Self {
            time: dep.scheduled_time.to_rfc3339(),
            destination: dep.destination,
            delay: dep.delay_seconds,
            line: dep.line,
        }
    }
}

/// Departure board for one tracked stop.
#[derive(Debug, Serialize, ToSchema)]
pub struct StopBoard {
    pub station: String,
    pub departures: Vec<DepartureView>,
}

/// Aggregated response; the tracked stops appear as top-level keys next
/// to `lastUpdate` and `source`.
#[derive(Debug, Serialize)]
pub struct DeparturesResponse {
    #[serde(flatten)]
    pub stops: BTreeMap<String, StopBoard>,
    #[serde(rename = "lastUpdate")]
    pub last_update: String,
    /// "combined" when realtime delays were merged in, "scheduled-only"
    /// when the feed was unavailable this cycle.
    pub source: String,
}

/// Upcoming departures for every tracked stop.
///
/// The realtime feed is fetched once and the snapshot shared across all
/// stops; if it is unavailable the response degrades to scheduled times.
/// A failing stationboard fetch for any stop fails the whole request —
/// there is no partial-stop success.
#[utoipa::path(
    get,
    path = "/api/departures",
    responses(
        (status = 200, description = "Departure boards keyed by stop, plus lastUpdate and source"),
        (status = 500, description = "Timetable source unavailable", body = ErrorResponse)
    ),
    tag = "departures"
)]
pub async fn get_departures(
    State(state): State<AppState>,
) -> Result<Json<DeparturesResponse>, (StatusCode, Json<ErrorResponse>)> {
    let snapshot = match feed::fetch_feed(
        &state.http,
        &state.config.gtfs_rt_url,
        &state.config.gtfs_api_key,
    )
    .await
    {
        Ok(feed) => Some(feed),
        Err(err) => {
            warn!(error = %err, "GTFS-RT feed unavailable, serving scheduled times only");
            None
        }
    };

    let boards = future::try_join_all(
        state
            .config
            .stops
            .iter()
            .map(|stop| board_for_stop(&state, stop, snapshot.as_ref())),
    )
    .await
    .map_err(internal_error)?;

    Ok(Json(DeparturesResponse {
        stops: boards.into_iter().collect(),
        last_update: Utc::now().to_rfc3339(),
        source: if snapshot.is_some() {
            SOURCE_COMBINED
        } else {
            SOURCE_SCHEDULED_ONLY
        }
        .to_string(),
    }))
}

async fn board_for_stop(
    state: &AppState,
    stop: &StopConfig,
    snapshot: Option<&FeedMessage>,
) -> Result<(String, StopBoard), StationboardError> {
    let scheduled = stationboard::fetch_stationboard(
        &state.http,
        &state.config.stationboard_url,
        &stop.name,
        &stop.line,
    )
    .await?;

    let merged = reconcile::reconcile(stop, scheduled, snapshot);

    Ok((stop.key.clone(), build_board(stop, merged)))
}

/// Package merged departures for one stop, capped to [`MAX_DEPARTURES`].
fn build_board(stop: &StopConfig, merged: Vec<MergedDeparture>) -> StopBoard {
    StopBoard {
        station: stop.name.clone(),
        departures: merged
            .into_iter()
            .take(MAX_DEPARTURES)
            .map(DepartureView::from)
            .collect(),
    }
}
