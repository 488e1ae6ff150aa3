use std::io::stdout;

use anyhow::Result;
use clap::ArgMatches;

use crate::display;
use crate::fetcher::AccountData;
use crate::settings::Settings;

pub(crate) async fn run(_matches: &ArgMatches, settings: Settings) -> Result<()> {
    let mut data = AccountData::from_settings(&settings);
    data.update().await?;

    let currency = display::currency(&settings.unit_of_measurement);
    display::print_spending(stdout(), data.spending(), currency)?;

    Ok(())
}
