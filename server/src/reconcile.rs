//! Departure reconciliation.
//!
//! Merges scheduled departures from the stationboard with delay records
//! from the GTFS-RT feed. The two sources share no trip key: the board
//! identifies trips by station name and line, the feed by an opaque,
//! feed-local trip id. Matching is therefore positional (see
//! [`delay_for_position`]).

use std::collections::HashSet;

use crate::config::StopConfig;
use crate::gtfs_rt::FeedMessage;
use crate::services::stationboard::ScheduledDeparture;
use chrono::{DateTime, FixedOffset};

/// A reconciled departure, ready for the API response.
#[derive(Debug, Clone)]
pub struct MergedDeparture {
    pub scheduled_time: DateTime<FixedOffset>,
    pub destination: String,
    /// Best available delay estimate in seconds, positive when late.
    /// 0 means "on time" — including when no realtime record matched.
    pub delay_seconds: i32,
    pub line: String,
}

/// One delay record extracted from the feed for a single stop and line.
#[derive(Debug, Clone)]
pub struct RealtimeDelayRecord {
    /// Feed-local trip id; not comparable to anything the board returns.
    pub trip_id: String,
    pub stop_id: String,
    pub delay_seconds: i32,
}

/// Merge scheduled departures with the realtime snapshot for one stop.
///
/// With no snapshot the board's own delays are used as-is. The output is
/// never longer than the scheduled input and stays sorted by scheduled
/// time (the board already returns chronological order; the sort is a
/// safeguard).
pub fn reconcile(
    stop: &StopConfig,
    scheduled: Vec<ScheduledDeparture>,
    snapshot: Option<&FeedMessage>,
) -> Vec<MergedDeparture> {
    let mut merged: Vec<MergedDeparture> = match snapshot {
        None => scheduled
            .into_iter()
            .map(|dep| MergedDeparture {
                scheduled_time: dep.scheduled_time,
                destination: dep.destination,
                delay_seconds: dep.own_delay_seconds,
                line: dep.line,
            })
            .collect(),
        Some(feed) => {
            let records = line_delay_records(feed, stop);
            scheduled
                .into_iter()
                .enumerate()
                .map(|(i, dep)| MergedDeparture {
                    scheduled_time: dep.scheduled_time,
                    destination: dep.destination,
                    delay_seconds: delay_for_position(&records, i),
                    line: dep.line,
                })
                .collect()
        }
    };

    merged.sort_by_key(|dep| dep.scheduled_time);
    merged
}

/// Extract the line number from a composite route id.
///
/// Route ids for the tram network look like `1-7-A-j25-1`, where the
/// second dash-separated token is the line number. Anything without at
/// least two tokens yields the empty string. Lines are compared as
/// strings, never parsed as numbers.
pub fn line_of_route(route_id: &str) -> &str {
    route_id.split('-').nth(1).unwrap_or("")
}

/// Walk the feed once and collect delay records for the stop's line, in
/// order of discovery.
///
/// Stop ids in the feed may carry platform suffixes beyond the configured
/// platform id, so matching is by prefix. A trip contributes at most one
/// record: the first stop-time update that matches, after which the rest
/// of that trip's updates are skipped.
fn line_delay_records(feed: &FeedMessage, stop: &StopConfig) -> Vec<RealtimeDelayRecord> {
    let mut records = Vec::new();
    let mut seen_trips: HashSet<String> = HashSet::new();

    for entity in &feed.entity {
        let Some(trip_update) = &entity.trip_update else {
            continue;
        };

        let route_id = trip_update.trip.route_id.as_deref().unwrap_or("");
        if line_of_route(route_id) != stop.line {
            continue;
        }

        // trip_id is optional in the feed; dedup only applies to trips
        // that actually carry one, so two anonymous trips never collapse.
        let trip_id = trip_update.trip.trip_id.clone().unwrap_or_default();
        if !trip_id.is_empty() && !seen_trips.insert(trip_id.clone()) {
            continue;
        }

        for stu in &trip_update.stop_time_update {
            let Some(stop_id) = stu.stop_id.as_deref() else {
                continue;
            };
            if !stop_id.starts_with(stop.stop_id.as_str()) {
                continue;
            }
            let Some(departure) = &stu.departure else {
                continue;
            };
            if departure.time.is_none() {
                continue;
            }

            records.push(RealtimeDelayRecord {
                trip_id: trip_id.clone(),
                stop_id: stop_id.to_string(),
                delay_seconds: departure.delay.unwrap_or(0),
            });
            break;
        }
    }

    records
}

/// Positional matching between the scheduled list and the delay records.
///
/// The i-th scheduled departure takes the delay of the i-th record; a
/// missing position means "on time". This misattributes delays whenever
/// the two sources enumerate trips in a different relative order or see
/// different trip counts for the same window — a known accuracy ceiling
/// of the source data, kept deliberately. Swap this function out if a
/// real join key (or a fuzzy time+destination match) ever becomes
/// available; nothing else in the pipeline depends on how the pairing is
/// made.
pub fn delay_for_position(records: &[RealtimeDelayRecord], index: usize) -> i32 {
    records
        .get(index)
        .map(|record| record.delay_seconds)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gtfs_rt::{
        trip_update::{StopTimeEvent, StopTimeUpdate},
        FeedEntity, FeedHeader, TripDescriptor, TripUpdate,
    };
    use chrono::{TimeZone, Utc};

    fn test_stop() -> StopConfig {
        StopConfig {
            key: "roswiesen".to_string(),
            name: "Roswiesen".to_string(),
            stop_id: "8591325:0:10000".to_string(),
            line: "7".to_string(),
        }
    }

    fn scheduled_at(epoch: i64, destination: &str, own_delay: i32) -> ScheduledDeparture {
        ScheduledDeparture {
            scheduled_time: Utc.timestamp_opt(epoch, 0).unwrap().fixed_offset(),
            destination: destination.to_string(),
            line: "7".to_string(),
            own_delay_seconds: own_delay,
        }
    }

    fn stop_time_update(stop_id: &str, delay: Option<i32>, time: Option<i64>) -> StopTimeUpdate {
        StopTimeUpdate {
            stop_sequence: None,
            stop_id: Some(stop_id.to_string()),
            arrival: None,
            departure: Some(StopTimeEvent {
                delay,
                time,
                uncertainty: None,
            }),
        }
    }

    fn trip_entity(
        entity_id: &str,
        trip_id: &str,
        route_id: &str,
        updates: Vec<StopTimeUpdate>,
    ) -> FeedEntity {
        FeedEntity {
            id: entity_id.to_string(),
            is_deleted: None,
            trip_update: Some(TripUpdate {
                trip: TripDescriptor {
                    trip_id: Some(trip_id.to_string()),
                    route_id: Some(route_id.to_string()),
                    direction_id: None,
                    start_time: None,
                    start_date: None,
                },
                stop_time_update: updates,
                timestamp: None,
                delay: None,
            }),
        }
    }

    fn feed_with(entities: Vec<FeedEntity>) -> FeedMessage {
        FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                incrementality: None,
                timestamp: Some(1000000),
                feed_version: None,
            },
            entity: entities,
        }
    }

    #[test]
    fn test_line_of_route_tokenization() {
        assert_eq!(line_of_route("1-7-A-j25-1"), "7");
        assert_eq!(line_of_route("1-9-B-j25-1"), "9");
        // Fewer than two tokens yields the empty string, never a panic.
        assert_eq!(line_of_route("7"), "");
        assert_eq!(line_of_route(""), "");
    }

    #[test]
    fn test_no_snapshot_uses_own_delays() {
        let scheduled = vec![
            scheduled_at(0, "A", 60),
            scheduled_at(60, "B", 0),
        ];
        let merged = reconcile(&test_stop(), scheduled, None);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].delay_seconds, 60);
        assert_eq!(merged[1].delay_seconds, 0);
    }

    #[test]
    fn test_snapshot_without_matches_means_on_time() {
        // A trip on another line, and one on our line at another stop.
        let feed = feed_with(vec![
            trip_entity(
                "e1",
                "trip-other-line",
                "1-9-A-j25-1",
                vec![stop_time_update("8591325:0:10000", Some(300), Some(1000))],
            ),
            trip_entity(
                "e2",
                "trip-other-stop",
                "1-7-A-j25-1",
                vec![stop_time_update("8503000:0:1", Some(300), Some(1000))],
            ),
        ]);
        let scheduled = vec![scheduled_at(0, "A", 120), scheduled_at(60, "B", 0)];

        let merged = reconcile(&test_stop(), scheduled, Some(&feed));

        // The snapshot was present, so the board's own delays are not used.
        assert!(merged.iter().all(|dep| dep.delay_seconds == 0));
    }

    #[test]
    fn test_end_to_end_position_matching() {
        // Three scheduled departures, three delay records in discovery
        // order: +30, 0, -10.
        let feed = feed_with(vec![
            trip_entity(
                "e1",
                "trip-1",
                "1-7-A-j25-1",
                vec![stop_time_update("8591325:0:10000", Some(30), Some(1000))],
            ),
            trip_entity(
                "e2",
                "trip-2",
                "1-7-A-j25-1",
                vec![stop_time_update("8591325:0:10000", Some(0), Some(1300))],
            ),
            trip_entity(
                "e3",
                "trip-3",
                "1-7-A-j25-1",
                vec![stop_time_update("8591325:0:10000", Some(-10), Some(1600))],
            ),
        ]);
        let scheduled = vec![
            scheduled_at(0, "A", 0),
            scheduled_at(60, "B", 0),
            scheduled_at(120, "C", 0),
        ];

        let merged = reconcile(&test_stop(), scheduled, Some(&feed));

        assert_eq!(merged.len(), 3);
        assert_eq!(
            (merged[0].destination.as_str(), merged[0].delay_seconds),
            ("A", 30)
        );
        assert_eq!(
            (merged[1].destination.as_str(), merged[1].delay_seconds),
            ("B", 0)
        );
        assert_eq!(
            (merged[2].destination.as_str(), merged[2].delay_seconds),
            ("C", -10)
        );
    }

    #[test]
    fn test_fewer_records_than_scheduled() {
        let feed = feed_with(vec![trip_entity(
            "e1",
            "trip-1",
            "1-7-A-j25-1",
            vec![stop_time_update("8591325:0:10000", Some(45), Some(1000))],
        )]);
        let scheduled = vec![
            scheduled_at(0, "A", 0),
            scheduled_at(60, "B", 0),
            scheduled_at(120, "C", 0),
        ];

        let merged = reconcile(&test_stop(), scheduled, Some(&feed));

        assert_eq!(merged[0].delay_seconds, 45);
        // Positions past the end of the delay index are on time.
        assert_eq!(merged[1].delay_seconds, 0);
        assert_eq!(merged[2].delay_seconds, 0);
    }

    #[test]
    fn test_prefix_match_tolerates_platform_suffix() {
        let feed = feed_with(vec![trip_entity(
            "e1",
            "trip-1",
            "1-7-A-j25-1",
            vec![stop_time_update("8591325:0:10000::1", Some(90), Some(1000))],
        )]);
        let scheduled = vec![scheduled_at(0, "A", 0)];

        let merged = reconcile(&test_stop(), scheduled, Some(&feed));
        assert_eq!(merged[0].delay_seconds, 90);
    }

    #[test]
    fn test_first_matching_update_wins_per_trip() {
        // One trip with two platform variants of the same stop: only the
        // first is taken, so the second scheduled departure gets no record.
        let feed = feed_with(vec![trip_entity(
            "e1",
            "trip-1",
            "1-7-A-j25-1",
            vec![
                stop_time_update("8591325:0:10000::0", Some(30), Some(1000)),
                stop_time_update("8591325:0:10000::1", Some(300), Some(1010)),
            ],
        )]);
        let scheduled = vec![scheduled_at(0, "A", 0), scheduled_at(60, "B", 0)];

        let merged = reconcile(&test_stop(), scheduled, Some(&feed));
        assert_eq!(merged[0].delay_seconds, 30);
        assert_eq!(merged[1].delay_seconds, 0);
    }

    #[test]
    fn test_updates_without_departure_time_are_skipped() {
        let feed = feed_with(vec![trip_entity(
            "e1",
            "trip-1",
            "1-7-A-j25-1",
            vec![
                // No departure event at all.
                StopTimeUpdate {
                    stop_sequence: None,
                    stop_id: Some("8591325:0:10000".to_string()),
                    arrival: Some(StopTimeEvent {
                        delay: Some(60),
                        time: Some(990),
                        uncertainty: None,
                    }),
                    departure: None,
                },
                // Departure event without a time.
                stop_time_update("8591325:0:10000", Some(60), None),
            ],
        )]);
        let scheduled = vec![scheduled_at(0, "A", 0)];

        let merged = reconcile(&test_stop(), scheduled, Some(&feed));
        assert_eq!(merged[0].delay_seconds, 0);
    }

    #[test]
    fn test_never_more_entries_than_scheduled_and_order_kept() {
        let feed = feed_with(
            (0..5)
                .map(|i| {
                    trip_entity(
                        &format!("e{i}"),
                        &format!("trip-{i}"),
                        "1-7-A-j25-1",
                        vec![stop_time_update(
                            "8591325:0:10000",
                            Some(i * 10),
                            Some(1000 + i as i64),
                        )],
                    )
                })
                .collect(),
        );
        let scheduled = vec![scheduled_at(0, "A", 0), scheduled_at(60, "B", 0)];

        let merged = reconcile(&test_stop(), scheduled, Some(&feed));

        assert_eq!(merged.len(), 2);
        for window in merged.windows(2) {
            assert!(window[0].scheduled_time <= window[1].scheduled_time);
        }
    }

    #[test]
    fn test_anonymous_trips_are_not_deduplicated() {
        // Two distinct entities, neither carrying a trip id: both must
        // contribute a delay record.
        let mut first = trip_entity(
            "e1",
            "unused",
            "1-7-A-j25-1",
            vec![stop_time_update("8591325:0:10000", Some(30), Some(1000))],
        );
        first.trip_update.as_mut().unwrap().trip.trip_id = None;
        let mut second = trip_entity(
            "e2",
            "unused",
            "1-7-A-j25-1",
            vec![stop_time_update("8591325:0:10000", Some(90), Some(1300))],
        );
        second.trip_update.as_mut().unwrap().trip.trip_id = None;

        let feed = feed_with(vec![first, second]);
        let scheduled = vec![scheduled_at(0, "A", 0), scheduled_at(60, "B", 0)];

        let merged = reconcile(&test_stop(), scheduled, Some(&feed));
        assert_eq!(merged[0].delay_seconds, 30);
        assert_eq!(merged[1].delay_seconds, 90);
    }

    #[test]
    fn test_repeated_trip_id_contributes_once() {
        let feed = feed_with(vec![
            trip_entity(
                "e1",
                "trip-1",
                "1-7-A-j25-1",
                vec![stop_time_update("8591325:0:10000", Some(30), Some(1000))],
            ),
            trip_entity(
                "e2",
                "trip-1",
                "1-7-A-j25-1",
                vec![stop_time_update("8591325:0:10000", Some(300), Some(1300))],
            ),
        ]);
        let scheduled = vec![scheduled_at(0, "A", 0), scheduled_at(60, "B", 0)];

        let merged = reconcile(&test_stop(), scheduled, Some(&feed));
        assert_eq!(merged[0].delay_seconds, 30);
        assert_eq!(merged[1].delay_seconds, 0);
    }

    #[test]
    fn test_delay_defaults_to_zero_without_delay_field() {
        let feed = feed_with(vec![trip_entity(
            "e1",
            "trip-1",
            "1-7-A-j25-1",
            vec![stop_time_update("8591325:0:10000", None, Some(1000))],
        )]);
        let scheduled = vec![scheduled_at(0, "A", 0)];

        let merged = reconcile(&test_stop(), scheduled, Some(&feed));
        assert_eq!(merged[0].delay_seconds, 0);
    }
}
