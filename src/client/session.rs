use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::client::api::ClientError;
use crate::model::user::User;

pub const SESSION_ENV: &str = "YUMAI_SESSION";

/// What the client remembers between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
    /// provider key the user chose to keep locally, sent as `X-AI-Key`
    pub ai_key: Option<String>,
    pub theme: Option<String>,
}

impl Session {
    /// `$YUMAI_SESSION`, else `~/.yumai/session.json`.
    pub fn default_path() -> Option<PathBuf> {
        match env::var_os(SESSION_ENV) {
            Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
            _ => dirs::home_dir().map(|home| home.join(".yumai").join("session.json")),
        }
    }

    /// A missing file is an empty session.
    pub fn load(path: &Path) -> Result<Self, ClientError> {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no session at {}", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ClientError::Session(e.to_string())),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ClientError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| ClientError::Session(e.to_string()))?;
        }
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| ClientError::Decode(e.to_string()))?;
        fs::write(path, bytes).map_err(|e| ClientError::Session(e.to_string()))
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    /// Forget the token and profile, keep local preferences.
    pub fn sign_out(&mut self) {
        self.token = None;
        self.user = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_session() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(session, Session::default());
    }

    #[test]
    fn save_then_load_keeps_preferences_after_sign_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let mut session = Session {
            token: Some("abc".to_string()),
            ai_key: Some("key".to_string()),
            theme: Some("dark".to_string()),
            ..Session::default()
        };
        session.sign_out();
        session.save(&path).unwrap();

        let loaded = Session::load(&path).unwrap();
        assert!(!loaded.is_logged_in());
        assert_eq!(loaded.ai_key.as_deref(), Some("key"));
        assert_eq!(loaded.theme.as_deref(), Some("dark"));
    }
}
