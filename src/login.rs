use std::io::{stdin, stdout, Write};
use std::path::Path;

use anyhow::{anyhow, Result};
use clap::ArgMatches;
use personal_capital::{Error as ClientError, PersonalCapital, TwoFactorMode};
use tracing::info;

use crate::session;
use crate::settings::Settings;

enum FlowState {
    Pending,
    ChallengeSent,
    Verified,
}

/// Drives one interactive two factor attempt: challenge, code
/// verification, then password authentication bound to the verified
/// device. One instance per login attempt; the transitions are checked so
/// a misordered caller fails loudly instead of confusing the server.
pub(crate) struct TwoFactorFlow<'a> {
    client: &'a mut PersonalCapital,
    mode: TwoFactorMode,
    state: FlowState,
}

impl<'a> TwoFactorFlow<'a> {
    pub(crate) fn new(client: &'a mut PersonalCapital, mode: TwoFactorMode) -> Self {
        Self {
            client,
            mode,
            state: FlowState::Pending,
        }
    }

    pub(crate) async fn send_challenge(&mut self) -> Result<()> {
        if !matches!(self.state, FlowState::Pending) {
            return Err(anyhow!("a challenge was already sent for this attempt"));
        }

        self.client.two_factor_challenge(self.mode).await?;
        self.state = FlowState::ChallengeSent;

        Ok(())
    }

    pub(crate) async fn verify(&mut self, code: &str, password: &str) -> Result<()> {
        if !matches!(self.state, FlowState::ChallengeSent) {
            return Err(anyhow!("no outstanding challenge to verify"));
        }

        self.client.two_factor_authenticate(self.mode, code).await?;
        let result = self.client.authenticate_password(password).await?;
        if !result.success() {
            return Err(anyhow!(
                "verification rejected: {}",
                result
                    .sp_header
                    .error_message()
                    .unwrap_or("invalid verification code")
            ));
        }

        self.state = FlowState::Verified;

        Ok(())
    }
}

async fn establish(settings: &Settings, mode: TwoFactorMode) -> Result<PersonalCapital> {
    let mut client = PersonalCapital::new();
    let session_file = Path::new(&settings.session_file);
    if let Some(session) = session::load(session_file) {
        info!("restored session from {}", settings.session_file);
        client.set_session(session);
    }

    match client.login(&settings.username, &settings.password).await {
        Ok(()) => {}
        Err(ClientError::RequireTwoFactor) => {
            let mut flow = TwoFactorFlow::new(&mut client, mode);
            flow.send_challenge().await?;

            let code = prompt("Verification code: ")?;
            flow.verify(code.trim(), &settings.password).await?;
        }
        Err(err) => return Err(err.into()),
    }

    session::save(session_file, &client.session())?;

    Ok(client)
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    stdout().flush()?;

    let mut buf = String::new();
    stdin().read_line(&mut buf)?;

    Ok(buf)
}

pub(crate) async fn run(matches: &ArgMatches, settings: Settings) -> Result<()> {
    let mode = match matches.value_of("mode") {
        Some(mode) => mode.parse().map_err(|e: String| anyhow!(e))?,
        None => TwoFactorMode::Sms,
    };

    establish(&settings, mode).await?;
    println!("Logged in. Session saved to {}.", settings.session_file);

    Ok(())
}
