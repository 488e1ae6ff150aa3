use anyhow::{anyhow, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::core::AccountKind;
use crate::CLIENT_NAME;

const CONFIG_NAME: &str = "config.toml";
const SESSION_NAME: &str = "session.json";

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub username: String,
    pub password: String,
    pub session_file: String,
    pub unit_of_measurement: String,
    #[serde(default)]
    pub monitored_categories: Vec<String>,
}

impl Settings {
    pub fn new(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut s = Config::builder()
            .set_default("session_file", default_session_path())?
            .set_default("unit_of_measurement", "USD")?
            .add_source(Environment::with_prefix("BURSAR"));

        if let Some(path) = config_path {
            s = s.add_source(File::with_name(path));
        } else {
            s = s.add_source(File::with_name(&default_config_path()));
        }

        s.build()?.try_deserialize()
    }

    /// The account categories to report on; an empty config list means all
    /// of them.
    pub fn kinds(&self) -> Result<Vec<AccountKind>> {
        if self.monitored_categories.is_empty() {
            return Ok(AccountKind::ALL.to_vec());
        }

        self.monitored_categories
            .iter()
            .map(|name| name.parse().map_err(|e: String| anyhow!(e)))
            .collect()
    }
}

fn default_session_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir()))
        .join(CLIENT_NAME)
        .join(SESSION_NAME)
        .display()
        .to_string()
}

pub(crate) fn default_config_path() -> String {
    dirs::config_dir()
        .unwrap_or_else(|| std::env::current_dir().expect("read current working dir"))
        .join(CLIENT_NAME)
        .join(CONFIG_NAME)
        .display()
        .to_string()
}
