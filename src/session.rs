use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use personal_capital::Session;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
}

type Result<T> = ::std::result::Result<T, Error>;

/// Restores a persisted session. A missing, unreadable, or empty blob all
/// mean the same thing to the caller: start from an unauthenticated client.
pub fn load(path: &Path) -> Option<Session> {
    let raw = fs::read_to_string(path).ok()?;

    match parse(&raw) {
        Ok(session) if !session.is_empty() => Some(session),
        Ok(_) => None,
        Err(err) => {
            warn!("discarding unreadable session file {}: {}", path.display(), err);
            None
        }
    }
}

/// Writes the canonical `{"cookies": ..., "csrfToken": ...}` blob,
/// creating the parent directory on first use.
pub fn save(path: &Path, session: &Session) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, serde_json::to_string_pretty(session)?)?;

    Ok(())
}

// Earlier versions persisted a bare cookie map. Those blobs are still
// accepted on read and upgraded to the canonical shape on the next save.
fn parse(raw: &str) -> ::std::result::Result<Session, serde_json::Error> {
    let value: Value = serde_json::from_str(raw)?;

    if value.get("cookies").is_some() || value.get("csrfToken").is_some() {
        return serde_json::from_value(value);
    }

    let cookies: BTreeMap<String, String> = serde_json::from_value(value)?;
    Ok(Session {
        cookies,
        csrf_token: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> Session {
        let mut session = Session::default();
        session.cookies.insert("PMData".to_string(), "abc".to_string());
        session.csrf_token = "token-1".to_string();
        session
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let session = sample_session();

        save(&path, &session).unwrap();
        assert_eq!(load(&path), Some(session));
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("session.json");

        save(&path, &sample_session()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load(&dir.path().join("session.json")), None);
    }

    #[test]
    fn corrupt_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        assert_eq!(load(&path), None);
    }

    #[test]
    fn empty_session_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"cookies": {}, "csrfToken": ""}"#).unwrap();

        assert_eq!(load(&path), None);
    }

    #[test]
    fn legacy_cookie_map_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"PMData": "abc", "JSESSIONID": "def"}"#).unwrap();

        let session = load(&path).unwrap();
        assert_eq!(session.cookies.get("PMData").map(String::as_str), Some("abc"));
        assert_eq!(session.csrf_token, "");
    }
}
