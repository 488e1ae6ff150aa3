use std::fs;
use std::io::{stdin, stdout, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::settings;

#[derive(Serialize)]
struct Seed<'a> {
    username: &'a str,
    password: &'a str,
    unit_of_measurement: &'a str,
}

fn seed_settings(username: &str, password: &str, unit: &str) -> Result<String> {
    if username.is_empty() {
        return Err(anyhow!("email must not be empty"));
    }

    if password.is_empty() {
        return Err(anyhow!("password must not be empty"));
    }

    let unit = if unit.is_empty() { "USD" } else { unit };

    Ok(toml::to_string_pretty(&Seed {
        username,
        password,
        unit_of_measurement: unit,
    })?)
}

pub(crate) fn run(conf_path: Option<&str>) -> Result<()> {
    let path = match conf_path {
        Some(p) => PathBuf::from(p),
        None => PathBuf::from(settings::default_config_path()),
    };

    let mut buf = String::new();
    print!("Email: ");
    stdout().flush()?;

    let stdin = stdin();
    stdin.read_line(&mut buf)?;

    print!("Password: ");
    stdout().flush()?;
    stdin.read_line(&mut buf)?;

    print!("Currency [USD]: ");
    stdout().flush()?;
    stdin.read_line(&mut buf)?;

    let mut lines = buf.lines();
    let username = lines.next().unwrap_or("").trim();
    let password = lines.next().unwrap_or("").trim();
    let unit = lines.next().unwrap_or("").trim();

    let contents = seed_settings(username, password, unit)?;

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(&path, contents)?;
    println!("Wrote configuration to {}.", path.display());

    Ok(())
}
