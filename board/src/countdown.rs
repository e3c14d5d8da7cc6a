//! Display derivation for the departure board.
//!
//! Everything here is a pure function of `(scheduled, delay, now)`. Labels
//! are re-derived from absolute times on every tick; nothing decrements a
//! stored counter, so a missed or delayed tick can never make the display
//! drift.

use chrono::{DateTime, Duration, FixedOffset, Utc};

/// Shown when a departure has already passed (or the clock disagrees with
/// the feed badly enough that it looks that way).
pub const DEPARTED_MARKER: &str = r"¯\_(ツ)_/¯";

/// Minutes-remaining threshold for the "leave now" highlight.
const SOON_MINUTES: i64 = 3;

/// Everything the view needs for one departure row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartureDisplay {
    /// Scheduled clock time, `HH:MM`.
    pub scheduled: String,
    pub delay: String,
    pub countdown: String,
    pub soon: bool,
}

/// Derive the full display for one departure at the given instant.
pub fn derive_display(
    scheduled: DateTime<FixedOffset>,
    delay_seconds: i64,
    now: DateTime<Utc>,
) -> DepartureDisplay {
    let remaining = remaining_seconds(scheduled, delay_seconds, now);
    DepartureDisplay {
        scheduled: scheduled.format("%H:%M").to_string(),
        delay: delay_label(delay_seconds),
        countdown: countdown_label(remaining),
        soon: is_soon(remaining),
    }
}

/// Seconds until the effective (scheduled + delay) departure; negative
/// once it has passed.
pub fn remaining_seconds(
    scheduled: DateTime<FixedOffset>,
    delay_seconds: i64,
    now: DateTime<Utc>,
) -> i64 {
    let effective = scheduled + Duration::seconds(delay_seconds);
    (effective.with_timezone(&Utc) - now).num_seconds()
}

/// `M:SS` counting down to zero; the departed marker for anything in the
/// past.
pub fn countdown_label(remaining_seconds: i64) -> String {
    if remaining_seconds < 0 {
        return DEPARTED_MARKER.to_string();
    }
    format!("{}:{:02}", remaining_seconds / 60, remaining_seconds % 60)
}

/// True within the last [`SOON_MINUTES`] whole minutes before departure.
pub fn is_soon(remaining_seconds: i64) -> bool {
    remaining_seconds >= 0 && remaining_seconds / 60 <= SOON_MINUTES
}

/// Human delay label: "On time" for 0, signed seconds under a minute,
/// signed `M:SS min` (or `M min` on whole minutes) above.
pub fn delay_label(delay_seconds: i64) -> String {
    if delay_seconds == 0 {
        return "On time".to_string();
    }
    if delay_seconds.abs() < 60 {
        return format!("{delay_seconds:+}s");
    }

    let sign = if delay_seconds > 0 { '+' } else { '-' };
    let mins = delay_seconds.abs() / 60;
    let secs = delay_seconds.abs() % 60;
    if secs == 0 {
        format!("{sign}{mins} min")
    } else {
        format!("{sign}{mins}:{secs:02} min")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_delay_label_zero_is_on_time() {
        assert_eq!(delay_label(0), "On time");
    }

    #[test]
    fn test_delay_label_under_a_minute_is_signed_seconds() {
        assert_eq!(delay_label(12), "+12s");
        assert_eq!(delay_label(-5), "-5s");
        assert_eq!(delay_label(59), "+59s");
        assert_eq!(delay_label(-59), "-59s");
    }

    #[test]
    fn test_delay_label_minutes_with_seconds() {
        assert_eq!(delay_label(125), "+2:05 min");
        assert_eq!(delay_label(-125), "-2:05 min");
    }

    #[test]
    fn test_delay_label_whole_minutes() {
        assert_eq!(delay_label(180), "+3 min");
        assert_eq!(delay_label(-120), "-2 min");
    }

    #[test]
    fn test_delay_label_exactly_one_minute() {
        assert_eq!(delay_label(60), "+1 min");
        assert_eq!(delay_label(-60), "-1 min");
    }

    #[test]
    fn test_countdown_label_counts_down() {
        assert_eq!(countdown_label(0), "0:00");
        assert_eq!(countdown_label(59), "0:59");
        assert_eq!(countdown_label(125), "2:05");
        assert_eq!(countdown_label(600), "10:00");
    }

    #[test]
    fn test_countdown_label_past_departure_is_marker() {
        assert_eq!(countdown_label(-1), DEPARTED_MARKER);
        assert_eq!(countdown_label(-600), DEPARTED_MARKER);
    }

    #[test]
    fn test_soon_window() {
        assert!(!is_soon(-1));
        assert!(is_soon(0));
        assert!(is_soon(180));
        assert!(is_soon(239));
        assert!(!is_soon(240));
    }

    #[test]
    fn test_remaining_includes_delay() {
        let scheduled = Utc.timestamp_opt(1000, 0).unwrap().fixed_offset();
        let now = Utc.timestamp_opt(940, 0).unwrap();
        assert_eq!(remaining_seconds(scheduled, 0, now), 60);
        assert_eq!(remaining_seconds(scheduled, 30, now), 90);
        assert_eq!(remaining_seconds(scheduled, -90, now), -30);
    }

    #[test]
    fn test_derivation_is_idempotent() {
        let scheduled = Utc.timestamp_opt(2000, 0).unwrap().fixed_offset();
        let now = Utc.timestamp_opt(1895, 0).unwrap();

        let first = derive_display(scheduled, 45, now);
        let second = derive_display(scheduled, 45, now);
        assert_eq!(first, second);
        assert_eq!(first.countdown, "2:30");
        assert_eq!(first.delay, "+45s");
        assert!(first.soon);
    }

    #[test]
    fn test_departed_display() {
        let scheduled = Utc.timestamp_opt(1000, 0).unwrap().fixed_offset();
        let now = Utc.timestamp_opt(2000, 0).unwrap();

        let display = derive_display(scheduled, 0, now);
        assert_eq!(display.countdown, DEPARTED_MARKER);
        assert!(!display.soon);
    }
}
