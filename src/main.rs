mod accounts;
mod budget;
mod core;
mod display;
mod fetcher;
mod init;
mod login;
mod session;
mod settings;
mod watch;

use anyhow::Result;
use clap::{arg, Command};
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use tracing_tree::HierarchicalLayer;

use crate::settings::Settings;

static CLIENT_NAME: &str = "bursar";

async fn run() -> Result<()> {
    let app = Command::new(CLIENT_NAME)
        .about("The bursar utility polls account and transaction data from \
         Personal Capital and prints net worth, balance, and monthly \
         spending summaries.")
        .version("0.1.0")
        .subcommand_required(true)
        .allow_external_subcommands(false)
        .arg(arg!(CONFIG: -c --config [FILE] "Sets a custom config file"))
        .arg(arg!(verbose: -v --verbose [Boolean] "Sets the level of verbosity"))
        .subcommand(Command::new("init").about("Initialize CLI for use."))
        .subcommand(Command::new("login")
            .about("Establishes an authenticated session, prompting for a one-time code when the device is not remembered.")
            .arg(arg!(mode: -m --mode [MODE] "Two factor channel, sms or email. Defaults to sms.")))
        .subcommand(Command::new("accounts")
            .about("Prints net worth and account balances. This command fetches current data and may take some time to complete."))
        .subcommand(Command::new("budget")
            .about("Prints net spending per category for the current month."))
        .subcommand(Command::new("watch")
            .about("Polls upstream on an interval and prints a summary line per cycle.")
            .arg(arg!(interval: -i --interval [MINUTES] "Minutes between polling cycles.")));

    let matches = app.get_matches();

    if matches.value_of("verbose") == Some("true") {
        tracing_subscriber::registry()
            .with(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .with(tracing_subscriber::fmt::layer())
            .with(
                HierarchicalLayer::new(2)
                    .with_targets(true)
                    .with_bracketed_fields(true),
            )
            .init();
    }

    let config_path = matches.value_of("CONFIG");

    match matches.subcommand() {
        Some(("init", _init_matches)) => {
            init::run(config_path)?;
        }
        Some(("login", login_matches)) => {
            let settings = Settings::new(config_path)?;
            login::run(login_matches, settings).await?;
        }
        Some(("accounts", accounts_matches)) => {
            let settings = Settings::new(config_path)?;
            accounts::run(accounts_matches, settings).await?;
        }
        Some(("budget", budget_matches)) => {
            let settings = Settings::new(config_path)?;
            budget::run(budget_matches, settings).await?;
        }
        Some(("watch", watch_matches)) => {
            let settings = Settings::new(config_path)?;
            watch::run(watch_matches, settings).await?;
        }
        None => unreachable!("subcommand is required"),
        _ => unreachable!(),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        println!("{}", err);
        std::process::exit(1);
    }
}
