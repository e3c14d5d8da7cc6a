use std::env;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GTFS_RT_URL: &str = "https://api.opentransportdata.swiss/la/gtfs-rt";
const DEFAULT_STATIONBOARD_URL: &str = "https://transport.opendata.ch/v1/stationboard";
const DEFAULT_PUBLIC_DIR: &str = "server/public";

#[derive(Debug, Clone)]
pub struct Config {
    /// Listening port (`PORT`, default 3000).
    pub port: u16,
    /// GTFS-realtime endpoint (`GTFS_RT_URL`).
    pub gtfs_rt_url: String,
    /// Bearer token for the realtime feed (`GTFS_API_KEY`, required).
    pub gtfs_api_key: String,
    /// Stationboard base URL (`STATIONBOARD_URL`).
    pub stationboard_url: String,
    /// Directory with the static frontend (`PUBLIC_DIR`).
    pub public_dir: String,
    /// Tracked stops; immutable for the process lifetime.
    pub stops: Vec<StopConfig>,
}

/// One tracked stop.
#[derive(Debug, Clone)]
pub struct StopConfig {
    /// Key under which this stop appears in the API response.
    pub key: String,
    /// Station name as the stationboard service knows it.
    pub name: String,
    /// Platform-level GTFS stop id. The realtime feed may append further
    /// platform suffixes, so this is matched as a prefix.
    pub stop_id: String,
    /// Tram line number, compared as a string.
    pub line: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            Err(_) => DEFAULT_PORT,
        };

        let gtfs_api_key =
            env::var("GTFS_API_KEY").map_err(|_| ConfigError::MissingVar("GTFS_API_KEY"))?;

        Ok(Self {
            port,
            gtfs_rt_url: env::var("GTFS_RT_URL")
                .unwrap_or_else(|_| DEFAULT_GTFS_RT_URL.to_string()),
            gtfs_api_key,
            stationboard_url: env::var("STATIONBOARD_URL")
                .unwrap_or_else(|_| DEFAULT_STATIONBOARD_URL.to_string()),
            public_dir: env::var("PUBLIC_DIR").unwrap_or_else(|_| DEFAULT_PUBLIC_DIR.to_string()),
            stops: default_stops(),
        })
    }
}

/// The two tracked tram stops.
pub fn default_stops() -> Vec<StopConfig> {
    vec![
        StopConfig {
            key: "roswiesen".to_string(),
            name: "Roswiesen".to_string(),
            stop_id: "8591325:0:10000".to_string(),
            line: "7".to_string(),
        },
        StopConfig {
            key: "heerenwiesen".to_string(),
            name: "Heerenwiesen".to_string(),
            stop_id: "8591181:0:10001".to_string(),
            line: "9".to_string(),
        },
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("Invalid PORT value: {0}")]
    InvalidPort(String),
}
