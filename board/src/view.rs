//! Terminal rendering for the departure board.
//!
//! One panel per configured stop. Panels fail independently: a fetch error
//! replaces each panel's rows with a retry notice but never clears the
//! heading, and a later successful fetch replaces the state wholesale.

use chrono::{DateTime, FixedOffset, Local, Utc};

use crate::api::DeparturesResponse;
use crate::countdown;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone)]
pub enum PanelState {
    Loading,
    Ready(Vec<BoardDeparture>),
    Failed,
}

#[derive(Debug, Clone)]
pub struct BoardDeparture {
    pub scheduled: DateTime<FixedOffset>,
    pub destination: String,
    pub delay_seconds: i64,
    pub line: String,
}

#[derive(Debug, Clone)]
pub struct Panel {
    pub key: String,
    pub station: String,
    pub state: PanelState,
}

#[derive(Debug, Default)]
pub struct Panels {
    panels: Vec<Panel>,
    last_update: Option<String>,
    source: Option<String>,
}

impl Panels {
    /// Replace all panel contents from a fresh server payload. Departures
    /// whose timestamp does not parse are dropped with a warning; the
    /// server emits RFC 3339 so this only fires on a broken upstream.
    pub fn apply(&mut self, response: &DeparturesResponse) {
        self.panels = response
            .stops
            .iter()
            .map(|(key, board)| {
                let departures = board
                    .departures
                    .iter()
                    .filter_map(|dep| {
                        match DateTime::parse_from_rfc3339(&dep.time) {
                            Ok(scheduled) => Some(BoardDeparture {
                                scheduled,
                                destination: dep.destination.clone(),
                                delay_seconds: dep.delay,
                                line: dep.line.clone(),
                            }),
                            Err(err) => {
                                tracing::warn!(time = %dep.time, error = %err, "Skipping unparseable departure time");
                                None
                            }
                        }
                    })
                    .collect();
                Panel {
                    key: key.clone(),
                    station: board.station.clone(),
                    state: PanelState::Ready(departures),
                }
            })
            .collect();
        self.last_update = Some(response.last_update.clone());
        self.source = Some(response.source.clone());
    }

    /// Mark every panel as failed, keeping headings so the board stays
    /// recognizable while the poller retries.
    pub fn mark_fetch_failed(&mut self) {
        if self.panels.is_empty() {
            self.panels.push(Panel {
                key: String::new(),
                station: "Departures".to_string(),
                state: PanelState::Failed,
            });
            return;
        }
        for panel in &mut self.panels {
            panel.state = PanelState::Failed;
        }
    }

    /// Render the whole board to a string. Called once per second; all
    /// countdowns are re-derived from absolute times at `now`.
    pub fn render(&self, now: DateTime<Utc>) -> String {
        let mut out = String::from(CLEAR_SCREEN);
        let clock = now.with_timezone(&Local).format("%H:%M:%S");
        out.push_str(&format!("{BOLD}Tram Departures{RESET}  {clock}\n\n"));

        if self.panels.is_empty() {
            out.push_str(&format!("{DIM}Loading departures...{RESET}\n"));
            return out;
        }

        for panel in &self.panels {
            out.push_str(&format!("{BOLD}{}{RESET}\n", panel.station));
            match &panel.state {
                PanelState::Loading => {
                    out.push_str(&format!("  {DIM}Loading...{RESET}\n"));
                }
                PanelState::Failed => {
                    out.push_str(&format!(
                        "  {RED}Failed to load departures. Retrying...{RESET}\n"
                    ));
                }
                PanelState::Ready(departures) if departures.is_empty() => {
                    out.push_str(&format!("  {DIM}No departures available{RESET}\n"));
                }
                PanelState::Ready(departures) => {
                    for dep in departures {
                        out.push_str(&render_row(dep, now));
                    }
                }
            }
            out.push('\n');
        }

        if let (Some(update), Some(source)) = (&self.last_update, &self.source) {
            let stamp = DateTime::parse_from_rfc3339(update)
                .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
                .unwrap_or_else(|_| update.clone());
            out.push_str(&format!("{DIM}Last update: {stamp}  ({source}){RESET}\n"));
        }
        out
    }
}

fn render_row(dep: &BoardDeparture, now: DateTime<Utc>) -> String {
    let display = countdown::derive_display(dep.scheduled, dep.delay_seconds, now);
    let countdown = if display.soon {
        format!("{YELLOW}{BOLD}{:>10}{RESET}", display.countdown)
    } else {
        format!("{:>10}", display.countdown)
    };
    format!(
        "  {} {:<9} {:>2} → {:<24}{}\n",
        display.scheduled, display.delay, dep.line, dep.destination, countdown
    )
}
