pub mod departures;
pub mod error;

pub use error::{internal_error, ErrorResponse};

use std::sync::Arc;
use utoipa::OpenApi;

use crate::config::Config;

/// Shared state for all request handlers. Every request builds its own
/// feed snapshot; nothing here is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http: reqwest::Client,
}

#[derive(OpenApi)]
#[openapi(info(
    title = "Tram departures API",
    description = "Scheduled tram departures merged with realtime delays for the tracked stops"
))]
pub struct ApiDoc;
