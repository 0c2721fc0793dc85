//! Google Forms and Drive access over plain HTTP.
//!
//! The token file format matches what Google's Python client libraries
//! write, so an existing `token.json` keeps working.

pub mod auth;
pub mod forms;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CrewError, Result};

pub use auth::Authenticator;
pub use forms::FormsClient;

pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/forms.body",
    "https://www.googleapis.com/auth/forms.responses.readonly",
    "https://www.googleapis.com/auth/drive.file",
];

/// OAuth2 token as persisted in `token.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleToken {
    #[serde(alias = "access_token")]
    pub token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// RFC 3339.
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default, alias = "email")]
    pub account: Option<String>,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Installed-app client secrets as downloaded from the cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientCredentials {
    pub installed: InstalledAppCredentials,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstalledAppCredentials {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub auth_uri: String,
    pub token_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| CrewError::Auth(format!("cannot read {what} {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| CrewError::Auth(format!("invalid {what} {}: {e}", path.display())))
}

pub fn load_token(path: &Path) -> Result<GoogleToken> {
    read_json(path, "token file")
}

pub fn save_token(path: &Path, token: &GoogleToken) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(token)?)?;
    Ok(())
}

pub fn load_client_credentials(path: &Path) -> Result<ClientCredentials> {
    read_json(path, "client credentials")
}

pub fn load_service_account_key(path: &Path) -> Result<ServiceAccountKey> {
    read_json(path, "service account key")
}

/// Expired when missing, unparseable, or within 60 seconds of its expiry.
pub fn is_token_expired(token: &GoogleToken) -> bool {
    let Some(expiry) = &token.expiry else {
        return true;
    };
    match chrono::DateTime::parse_from_rfc3339(expiry)
        .or_else(|_| chrono::DateTime::parse_from_rfc3339(&format!("{expiry}Z")))
    {
        Ok(expiry) => expiry <= chrono::Utc::now() + chrono::Duration::seconds(60),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expiry: Option<String>) -> GoogleToken {
        GoogleToken {
            token: "ya29".to_string(),
            refresh_token: Some("1//r".to_string()),
            token_uri: default_token_uri(),
            client_id: "cid".to_string(),
            client_secret: None,
            scopes: Vec::new(),
            expiry,
            account: None,
        }
    }

    #[test]
    fn expiry_margin_and_formats() {
        assert!(is_token_expired(&token(None)));
        assert!(is_token_expired(&token(Some("garbage".into()))));
        let soon = chrono::Utc::now() + chrono::Duration::seconds(30);
        assert!(is_token_expired(&token(Some(soon.to_rfc3339()))));
        let later = chrono::Utc::now() + chrono::Duration::hours(1);
        assert!(!is_token_expired(&token(Some(later.to_rfc3339()))));
        // Python writes naive UTC timestamps.
        let naive = later.format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
        assert!(!is_token_expired(&token(Some(naive))));
    }

    #[test]
    fn python_token_file_is_accepted() {
        let raw = r#"{"access_token":"abc","refresh_token":"r","client_id":"c","email":"me@example.com"}"#;
        let parsed: GoogleToken = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.token, "abc");
        assert_eq!(parsed.token_uri, "https://oauth2.googleapis.com/token");
        assert_eq!(parsed.account.as_deref(), Some("me@example.com"));
    }

    #[test]
    fn token_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");
        save_token(&path, &token(Some("2030-01-01T00:00:00Z".into()))).unwrap();
        let loaded = load_token(&path).unwrap();
        assert_eq!(loaded.refresh_token.as_deref(), Some("1//r"));
    }
}
