//! GTFS-realtime feed client.
//!
//! Fetches the protobuf trip-update feed with a bearer token. The endpoint
//! answers with a redirect to a pre-signed download URL; exactly one
//! redirect is followed, reissuing the request with the User-Agent header
//! only. Every error here means "no realtime data this cycle" — callers
//! degrade to scheduled times instead of failing the request.

use axum::http::header;
use prost::Message;
use tracing::debug;

use crate::gtfs_rt::FeedMessage;

pub const USER_AGENT: &str = "tramboard/0.1";

/// Maximum allowed protobuf response size (50 MB)
const MAX_PROTOBUF_SIZE: usize = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("GTFS-RT request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GTFS-RT returned HTTP {0}")]
    Status(u16),
    #[error("GTFS-RT redirect without a Location header")]
    MissingRedirectLocation,
    #[error("GTFS-RT response too large: {0} bytes")]
    TooLarge(usize),
    #[error("GTFS-RT decode failed: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Fetch and decode the GTFS-RT protobuf feed.
///
/// `client` must be built with redirects disabled; the single redirect the
/// feed issues is handled here.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
) -> Result<FeedMessage, FeedError> {
    debug!(url = %url, "Fetching GTFS-RT feed");

    let mut response = client
        .get(url)
        .header(header::AUTHORIZATION.as_str(), format!("Bearer {api_key}"))
        .header(header::USER_AGENT.as_str(), USER_AGENT)
        .send()
        .await?;

    if response.status().is_redirection() {
        let location = response
            .headers()
            .get(header::LOCATION.as_str())
            .and_then(|value| value.to_str().ok())
            .ok_or(FeedError::MissingRedirectLocation)?
            .to_string();

        debug!(location = %location, "Following GTFS-RT redirect");

        response = client
            .get(&location)
            .header(header::USER_AGENT.as_str(), USER_AGENT)
            .send()
            .await?;
    }

    if !response.status().is_success() {
        return Err(FeedError::Status(response.status().as_u16()));
    }

    let bytes = response.bytes().await?;

    if bytes.len() > MAX_PROTOBUF_SIZE {
        return Err(FeedError::TooLarge(bytes.len()));
    }

    let feed = FeedMessage::decode(bytes.as_ref())?;
    debug!(entities = feed.entity.len(), "Decoded GTFS-RT feed");

    Ok(feed)
}
