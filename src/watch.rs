use anyhow::{anyhow, Result};
use chrono::Local;
use clap::ArgMatches;
use tokio::signal;
use tokio::time::{interval, Duration};
use tracing::warn;

use crate::display;
use crate::fetcher::AccountData;
use crate::settings::Settings;

const DEFAULT_INTERVAL_MINUTES: u64 = 5;

/// Polls upstream until interrupted. Ticks inside the fetcher cool-down
/// reprint cached data; only ticks past it reach the server.
pub(crate) async fn run(matches: &ArgMatches, settings: Settings) -> Result<()> {
    let minutes = matches
        .value_of("interval")
        .map(str::parse::<u64>)
        .transpose()?
        .unwrap_or(DEFAULT_INTERVAL_MINUTES);
    if minutes == 0 {
        return Err(anyhow!("interval must be at least one minute"));
    }

    let mut data = AccountData::from_settings(&settings);
    let currency = display::currency(&settings.unit_of_measurement);
    let mut ticker = interval(Duration::from_secs(minutes * 60));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = data.update().await {
                    // Keep exposing the previous cycle's data.
                    warn!("update failed: {}", err);
                    continue;
                }

                let spent: f64 = data.spending().iter().map(|row| row.amount).sum();
                match data.accounts() {
                    Some(snapshot) => println!(
                        "{} net worth {} | month-to-date spend {}",
                        Local::now().format("%Y-%m-%d %H:%M"),
                        display::money(snapshot.networth, currency),
                        display::money(spent, currency),
                    ),
                    None => println!(
                        "{} no account data yet",
                        Local::now().format("%Y-%m-%d %H:%M"),
                    ),
                }
            }
            _ = signal::ctrl_c() => {
                println!("signal received, stopping watch");
                break;
            }
        }
    }

    Ok(())
}
