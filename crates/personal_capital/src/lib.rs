//! Session client for the unofficial Personal Capital web API.
//!
//! The vendor publishes no client library or schema; this crate speaks the
//! same HTML/JSON hybrid the web frontend uses. Logging in is a multi-step
//! flow: scrape an initial CSRF token off the identity page, identify the
//! user (which refreshes the token and reports the device trust level),
//! then either authenticate the password directly or detour through an
//! SMS/email one-time code when the device is not remembered.

pub mod model;

use std::collections::BTreeMap;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::model::{ApiResponse, AuthLevel};

const BASE_URL: &str = "https://home.personalcapital.com";
const API_CLIENT: &str = "WEB";
const DEVICE_NAME: &str = "personal-capital-rs";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/103.0.0.0 Safari/537.36";

lazy_static! {
    // The identity page embeds the token in an inline script.
    static ref CSRF_RE: Regex = Regex::new(r"window\.csrf ='([a-f0-9-]+)'").unwrap();
}

/// Envelope with an endpoint-specific `spData` left undecoded.
pub type RawResponse = ApiResponse<serde_json::Value>;

#[derive(Debug, Error)]
pub enum Error {
    /// CSRF token or auth level could not be extracted. Fatal to the
    /// current login attempt.
    #[error("unable to prepare login: {0}")]
    AuthSetup(String),
    /// Not a failure: the caller must drive the two factor sub-flow and
    /// retry password authentication.
    #[error("two factor verification required")]
    RequireTwoFactor,
    /// The server rejected the credentials or one-time code.
    #[error("login failed: {0}")]
    LoginFailed(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// The opaque authentication state: cookie jar plus the CSRF token bound to
/// it. Either empty or sufficient for the server to recognize the device as
/// previously authenticated. Serializes to the canonical
/// `{"cookies": ..., "csrfToken": ...}` shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
    #[serde(rename = "csrfToken", default)]
    pub csrf_token: String,
}

impl Session {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.csrf_token.is_empty()
    }

    fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Delivery channel for the one-time verification code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwoFactorMode {
    Sms,
    Email,
}

impl TwoFactorMode {
    fn challenge_endpoint(self) -> &'static str {
        match self {
            TwoFactorMode::Sms => "/credential/challengeSms",
            TwoFactorMode::Email => "/credential/challengeEmail",
        }
    }

    fn challenge_type(self) -> &'static str {
        match self {
            TwoFactorMode::Sms => "challengeSMS",
            TwoFactorMode::Email => "challengeEmail",
        }
    }

    fn verify_endpoint(self) -> &'static str {
        match self {
            TwoFactorMode::Sms => "/credential/authenticateSms",
            TwoFactorMode::Email => "/credential/authenticateEmailByCode",
        }
    }
}

impl FromStr for TwoFactorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sms" => Ok(TwoFactorMode::Sms),
            "email" => Ok(TwoFactorMode::Email),
            other => Err(format!("unsupported two factor mode: {}", other)),
        }
    }
}

pub struct PersonalCapital {
    http: reqwest::Client,
    base_url: Url,
    session: Session,
}

impl PersonalCapital {
    pub fn new() -> Self {
        Self::with_base_url(Url::parse(BASE_URL).expect("static base url"))
    }

    /// Points the client at an alternate host. Integration tests use this
    /// to talk to an in-process stand-in for the vendor.
    pub fn with_base_url(base_url: Url) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("default http client");

        Self {
            http,
            base_url,
            session: Session::default(),
        }
    }

    /// Runs the full login state machine.
    ///
    /// Fails with [`Error::AuthSetup`] when no CSRF token can be obtained,
    /// with [`Error::RequireTwoFactor`] when the device is not remembered
    /// (drive the challenge/verify sub-flow, then retry), and with
    /// [`Error::LoginFailed`] when the server rejects the password.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), Error> {
        let initial_csrf = self.csrf_from_home_page().await?;
        let (csrf, auth_level) = self.identify_user(username, &initial_csrf).await?;

        // The refreshed token stays valid until the next full login cycle.
        self.session.csrf_token = csrf;

        if !auth_level.remembered() {
            return Err(Error::RequireTwoFactor);
        }

        let result = self.authenticate_password(password).await?;
        if !result.success() {
            return Err(Error::LoginFailed(
                result
                    .sp_header
                    .error_message()
                    .unwrap_or("rejected by server")
                    .to_string(),
            ));
        }

        debug!("password authentication accepted");
        Ok(())
    }

    /// Asks the server to send a one-time code over the given channel.
    pub async fn two_factor_challenge(&mut self, mode: TwoFactorMode) -> Result<(), Error> {
        let form = [
            ("challengeReason", "DEVICE_AUTH".to_string()),
            ("challengeMethod", "OP".to_string()),
            ("challengeType", mode.challenge_type().to_string()),
            ("apiClient", API_CLIENT.to_string()),
            ("bindDevice", "false".to_string()),
            ("csrf", self.session.csrf_token.clone()),
        ];

        self.post_api(mode.challenge_endpoint(), &form).await?;
        Ok(())
    }

    /// Submits the received code. Success is not asserted here; the caller
    /// must follow up with [`PersonalCapital::authenticate_password`] and
    /// inspect its envelope.
    pub async fn two_factor_authenticate(
        &mut self,
        mode: TwoFactorMode,
        code: &str,
    ) -> Result<(), Error> {
        let form = [
            ("challengeReason", "DEVICE_AUTH".to_string()),
            ("challengeMethod", "OP".to_string()),
            ("apiClient", API_CLIENT.to_string()),
            ("bindDevice", "false".to_string()),
            ("code", code.to_string()),
            ("csrf", self.session.csrf_token.clone()),
        ];

        self.post_api(mode.verify_endpoint(), &form).await?;
        Ok(())
    }

    /// Password authentication bound to the current device trust flow.
    /// Returns the raw envelope so the caller can inspect success and any
    /// server-supplied error message.
    pub async fn authenticate_password(&mut self, password: &str) -> Result<RawResponse, Error> {
        let form = [
            ("bindDevice", "true".to_string()),
            ("deviceName", DEVICE_NAME.to_string()),
            ("redirectTo", String::new()),
            ("skipFirstUse", String::new()),
            ("skipLinkAccount", "false".to_string()),
            ("referrerId", String::new()),
            ("passwd", password.to_string()),
            ("apiClient", API_CLIENT.to_string()),
            ("csrf", self.session.csrf_token.clone()),
        ];

        let response = self.post_api("/credential/authenticatePassword", &form).await?;
        Ok(response.json().await?)
    }

    /// The authenticated request primitive. Injects the standing
    /// `lastServerChangeId`/`csrf`/`apiClient` parameters; caller-supplied
    /// values win on overlapping keys. Expiry is not detected here; the
    /// caller owns the envelope success flag.
    pub async fn fetch<T: DeserializeOwned>(
        &mut self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<ApiResponse<T>, Error> {
        let mut form: Vec<(&str, String)> = vec![
            ("lastServerChangeId", "-1".to_string()),
            ("csrf", self.session.csrf_token.clone()),
            ("apiClient", API_CLIENT.to_string()),
        ];
        for &(key, value) in params {
            match form.iter_mut().find(|(name, _)| *name == key) {
                Some(slot) => slot.1 = value.to_string(),
                None => form.push((key, value.to_string())),
            }
        }

        let response = self.post_api(endpoint, &form).await?;
        Ok(response.json().await?)
    }

    /// Exports the opaque session for persistence. No transformation.
    pub fn session(&self) -> Session {
        self.session.clone()
    }

    /// Restores a previously exported session.
    pub fn set_session(&mut self, session: Session) {
        self.session = session;
    }

    async fn csrf_from_home_page(&mut self) -> Result<String, Error> {
        let url = format!("{}page/login/goHome", self.base_url);
        let mut request = self.http.get(&url);
        if !self.session.cookies.is_empty() {
            request = request.header(header::COOKIE, self.session.cookie_header());
        }

        let response = request.send().await?;
        self.capture_cookies(&response);
        let body = response.text().await?;

        CSRF_RE
            .captures(&body)
            .map(|captures| captures[1].to_string())
            .ok_or_else(|| Error::AuthSetup("no csrf token on identity page".to_string()))
    }

    /// Returns the refreshed CSRF token and the device auth level.
    async fn identify_user(
        &mut self,
        username: &str,
        csrf: &str,
    ) -> Result<(String, AuthLevel), Error> {
        let form = [
            ("username", username.to_string()),
            ("csrf", csrf.to_string()),
            ("apiClient", API_CLIENT.to_string()),
            ("bindDevice", "false".to_string()),
            ("skipLinkAccount", "false".to_string()),
            ("redirectTo", String::new()),
            ("skipFirstUse", String::new()),
            ("referrerId", String::new()),
        ];

        let response = self.post_api("/login/identifyUser", &form).await?;
        let envelope: RawResponse = response.json().await?;

        match (envelope.sp_header.csrf, envelope.sp_header.auth_level) {
            (Some(csrf), Some(auth_level)) => Ok((csrf, auth_level)),
            _ => Err(Error::AuthSetup(
                "identify response missing csrf token or auth level".to_string(),
            )),
        }
    }

    async fn post_api<F: Serialize + ?Sized>(
        &mut self,
        endpoint: &str,
        form: &F,
    ) -> Result<reqwest::Response, Error> {
        let url = format!("{}api{}", self.base_url, endpoint);
        debug!(%endpoint, "posting api request");

        let mut request = self.http.post(&url).form(form);
        if !self.session.cookies.is_empty() {
            request = request.header(header::COOKIE, self.session.cookie_header());
        }

        let response = request.send().await?;
        self.capture_cookies(&response);
        Ok(response)
    }

    fn capture_cookies(&mut self, response: &reqwest::Response) {
        for value in response.headers().get_all(header::SET_COOKIE) {
            let raw = match value.to_str() {
                Ok(raw) => raw,
                Err(_) => continue,
            };
            if let Some((name, rest)) = raw.split_once('=') {
                let value = rest.split(';').next().unwrap_or("").trim();
                self.session
                    .cookies
                    .insert(name.trim().to_string(), value.to_string());
            }
        }
    }
}

impl Default for PersonalCapital {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csrf_pattern_matches_inline_script() {
        let page = "<script>window.csrf ='6cb01be7-6bd3-4b48-a632-8b0b29b22b6e';</script>";
        let captures = CSRF_RE.captures(page).unwrap();
        assert_eq!(&captures[1], "6cb01be7-6bd3-4b48-a632-8b0b29b22b6e");
    }

    #[test]
    fn csrf_pattern_rejects_other_assignments() {
        assert!(CSRF_RE.captures("window.token ='abc123';").is_none());
    }

    #[test]
    fn session_round_trips_canonical_json() {
        let mut session = Session::default();
        session.cookies.insert("PMData".to_string(), "abc".to_string());
        session.csrf_token = "token-1".to_string();

        let encoded = serde_json::to_string(&session).unwrap();
        assert!(encoded.contains("csrfToken"));
        let decoded: Session = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, session);
    }

    #[test]
    fn empty_session_is_empty() {
        assert!(Session::default().is_empty());
    }

    #[test]
    fn two_factor_mode_parses_case_insensitively() {
        assert_eq!("SMS".parse::<TwoFactorMode>(), Ok(TwoFactorMode::Sms));
        assert_eq!("email".parse::<TwoFactorMode>(), Ok(TwoFactorMode::Email));
        assert!("carrier-pigeon".parse::<TwoFactorMode>().is_err());
    }
}
