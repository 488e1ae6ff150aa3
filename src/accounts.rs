use std::io::stdout;

use anyhow::{anyhow, Result};
use clap::ArgMatches;

use crate::display;
use crate::fetcher::AccountData;
use crate::settings::Settings;

pub(crate) async fn run(_matches: &ArgMatches, settings: Settings) -> Result<()> {
    let mut data = AccountData::from_settings(&settings);
    data.update().await?;

    let snapshot = data
        .accounts()
        .ok_or_else(|| anyhow!("upstream returned no account data"))?;
    let currency = display::currency(&settings.unit_of_measurement);
    let kinds = settings.kinds()?;

    display::print_net_worth(stdout(), snapshot, currency)?;
    println!();
    display::print_balances(stdout(), &kinds, snapshot, currency)?;
    println!();
    display::print_accounts(stdout(), &kinds, snapshot, currency)?;

    Ok(())
}
