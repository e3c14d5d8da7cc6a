//! Terminal departure board client.
//!
//! Polls the aggregation server every 30 seconds and redraws once per
//! second. The two cadences are independent: fetches run on detached
//! tasks, so a slow server never stalls the countdown tick.

use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod countdown;
mod view;

use api::BoardClient;
use view::Panels;

const FETCH_INTERVAL: Duration = Duration::from_secs(30);
const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(about = "Terminal tram departure board")]
struct Cli {
    /// Base URL of the aggregation server
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "board=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = BoardClient::new(&cli.server)?;
    let mut panels = Panels::default();

    let (results_tx, mut results_rx) = mpsc::channel(4);

    let mut fetch_timer = tokio::time::interval(FETCH_INTERVAL);
    let mut tick_timer = tokio::time::interval(TICK_INTERVAL);

    // Both intervals fire immediately, so the first loop pass kicks off
    // the initial fetch and draws the clock before any data arrives.
    loop {
        tokio::select! {
            _ = fetch_timer.tick() => {
                let client = client.clone();
                let results_tx = results_tx.clone();
                tokio::spawn(async move {
                    let result = client.fetch().await;
                    let _ = results_tx.send(result).await;
                });
            }
            Some(result) = results_rx.recv() => {
                match result {
                    Ok(response) => {
                        debug!(source = %response.source, "Fetched departures");
                        panels.apply(&response);
                    }
                    Err(err) => {
                        warn!(error = %err, "Fetch failed");
                        panels.mark_fetch_failed();
                    }
                }
                print!("{}", panels.render(chrono::Utc::now()));
            }
            _ = tick_timer.tick() => {
                print!("{}", panels.render(chrono::Utc::now()));
            }
        }
    }
}
