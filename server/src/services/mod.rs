pub mod feed;
pub mod stationboard;
