use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{
    is_token_expired, load_client_credentials, load_service_account_key, load_token, save_token,
    GoogleToken, ServiceAccountKey, SCOPES,
};
use crate::config::GoogleCredentials;
use crate::error::{CrewError, Result};

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

enum Mode {
    /// Installed-app flow backed by a token file.
    OAuth {
        token_path: PathBuf,
        credentials_path: Option<PathBuf>,
        cached: Mutex<Option<GoogleToken>>,
    },
    ServiceAccount {
        key: ServiceAccountKey,
        cached: Mutex<Option<CachedToken>>,
    },
    Static(String),
}

/// Hands out bearer tokens for the Forms and Drive calls.
pub struct Authenticator {
    mode: Mode,
    http: reqwest::Client,
}

impl Authenticator {
    pub fn oauth(token_path: PathBuf, credentials_path: Option<PathBuf>) -> Self {
        Self {
            mode: Mode::OAuth {
                token_path,
                credentials_path,
                cached: Mutex::new(None),
            },
            http: reqwest::Client::new(),
        }
    }

    pub fn service_account(key: ServiceAccountKey) -> Self {
        Self {
            mode: Mode::ServiceAccount {
                key,
                cached: Mutex::new(None),
            },
            http: reqwest::Client::new(),
        }
    }

    pub fn with_static_token(token: impl Into<String>) -> Self {
        Self {
            mode: Mode::Static(token.into()),
            http: reqwest::Client::new(),
        }
    }

    /// Picks a service account when its key file exists, else the installed-app
    /// flow when a client secrets or token file exists. `None` disables forms.
    pub fn from_settings(settings: &GoogleCredentials) -> Option<Self> {
        if let Some(path) = settings
            .service_account_file
            .as_deref()
            .map(Path::new)
            .filter(|p| p.exists())
        {
            match load_service_account_key(path) {
                Ok(key) => return Some(Self::service_account(key)),
                Err(err) => warn!(error = %err, "service account key unusable"),
            }
        }

        let credentials = settings
            .credentials_file
            .as_deref()
            .map(PathBuf::from)
            .filter(|p| p.exists());
        let token_path = PathBuf::from(&settings.token_file);
        if credentials.is_none() && !token_path.exists() {
            info!("no google credentials configured; survey forms disabled");
            return None;
        }
        Some(Self::oauth(token_path, credentials))
    }

    pub async fn access_token(&self) -> Result<String> {
        match &self.mode {
            Mode::Static(token) => Ok(token.clone()),
            Mode::ServiceAccount { key, cached } => {
                self.service_account_token(key, cached).await
            }
            Mode::OAuth {
                token_path,
                credentials_path,
                cached,
            } => {
                self.oauth_token(token_path, credentials_path.as_deref(), cached)
                    .await
            }
        }
    }

    async fn oauth_token(
        &self,
        token_path: &Path,
        credentials_path: Option<&Path>,
        cached: &Mutex<Option<GoogleToken>>,
    ) -> Result<String> {
        let mut guard = cached.lock().await;
        if guard.is_none() && token_path.exists() {
            match load_token(token_path) {
                Ok(token) => {
                    info!(path = %token_path.display(), "loaded cached google token");
                    *guard = Some(token);
                }
                Err(err) => warn!(error = %err, "ignoring unreadable token file"),
            }
        }

        if let Some(token) = guard.clone().as_ref() {
            if !is_token_expired(token) {
                return Ok(token.token.clone());
            }
            if token.refresh_token.is_some() {
                info!("refreshing google access token");
                match self.refresh(token).await {
                    Ok(fresh) => {
                        save_token(token_path, &fresh)?;
                        let access = fresh.token.clone();
                        *guard = Some(fresh);
                        return Ok(access);
                    }
                    Err(err) => warn!(error = %err, "token refresh failed"),
                }
            }
        }

        let Some(credentials_path) = credentials_path else {
            return Err(CrewError::Auth(
                "google token expired and no client credentials file for consent".to_string(),
            ));
        };
        let token = self.run_consent_flow(credentials_path).await?;
        save_token(token_path, &token)?;
        let access = token.token.clone();
        *guard = Some(token);
        Ok(access)
    }

    async fn refresh(&self, token: &GoogleToken) -> Result<GoogleToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| CrewError::Auth("no refresh token".to_string()))?;
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", token.client_id.as_str()),
        ];
        if let Some(secret) = token.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        let body = self.token_request(&token.token_uri, &form).await?;
        let (access_token, expiry) = parse_token_response(&body)?;

        let mut fresh = token.clone();
        fresh.token = access_token;
        fresh.expiry = Some(expiry);
        Ok(fresh)
    }

    async fn token_request(&self, token_uri: &str, form: &[(&str, &str)]) -> Result<Value> {
        let response = self.http.post(token_uri).form(form).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CrewError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn run_consent_flow(&self, credentials_path: &Path) -> Result<GoogleToken> {
        let creds = load_client_credentials(credentials_path)?;
        let installed = &creds.installed;

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://localhost:{port}");

        let mut auth_url = url::Url::parse(&installed.auth_uri)
            .map_err(|e| CrewError::Auth(format!("invalid auth_uri: {e}")))?;
        auth_url
            .query_pairs_mut()
            .append_pair("client_id", &installed.client_id)
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");

        println!("Authorize Google access in your browser:\n{auth_url}");
        if let Err(err) = open::that(auth_url.as_str()) {
            warn!(error = %err, "could not open browser");
        }

        let code = wait_for_auth_code(&listener).await?;

        let mut form = vec![
            ("code", code.as_str()),
            ("client_id", installed.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        if let Some(secret) = installed.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        let body = self.token_request(&installed.token_uri, &form).await?;
        let (access_token, expiry) = parse_token_response(&body)?;
        info!("google consent completed");

        Ok(GoogleToken {
            token: access_token,
            refresh_token: body["refresh_token"].as_str().map(str::to_string),
            token_uri: installed.token_uri.clone(),
            client_id: installed.client_id.clone(),
            client_secret: installed.client_secret.clone(),
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
            expiry: Some(expiry),
            account: None,
        })
    }

    async fn service_account_token(
        &self,
        key: &ServiceAccountKey,
        cached: &Mutex<Option<CachedToken>>,
    ) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let mut guard = cached.lock().await;
        if let Some(token) = guard.as_ref().filter(|t| t.expires_at - 60 > now) {
            return Ok(token.access_token.clone());
        }

        let jwt = build_service_account_jwt(key, now)?;
        let body = self
            .token_request(
                &key.token_uri,
                &[
                    ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                    ("assertion", jwt.as_str()),
                ],
            )
            .await?;
        let access_token = body["access_token"]
            .as_str()
            .ok_or_else(|| CrewError::Auth("no access_token in response".to_string()))?
            .to_string();
        let expires_in = body["expires_in"].as_i64().unwrap_or(3600);
        *guard = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at: now + expires_in,
        });
        Ok(access_token)
    }
}

fn parse_token_response(body: &Value) -> Result<(String, String)> {
    let access_token = body["access_token"]
        .as_str()
        .ok_or_else(|| CrewError::Auth("no access_token in response".to_string()))?
        .to_string();
    let expires_in = body["expires_in"].as_i64().unwrap_or(3600);
    let expiry = chrono::Utc::now() + chrono::Duration::seconds(expires_in);
    Ok((access_token, expiry.to_rfc3339()))
}

fn build_service_account_jwt(key: &ServiceAccountKey, now: i64) -> Result<String> {
    #[derive(Serialize)]
    struct Claims<'a> {
        iss: &'a str,
        scope: &'a str,
        aud: &'a str,
        iat: i64,
        exp: i64,
    }

    let scope = SCOPES.join(" ");
    let claims = Claims {
        iss: &key.client_email,
        scope: &scope,
        aud: &key.token_uri,
        iat: now,
        exp: now + 3600,
    };
    let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| CrewError::Auth(format!("invalid service account key: {e}")))?;
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
        &claims,
        &encoding_key,
    )
    .map_err(|e| CrewError::Auth(format!("jwt signing failed: {e}")))
}

/// Pulls `code` out of the redirect's request line.
fn parse_auth_code(request: &str) -> Option<String> {
    let path = request.lines().next()?.split_whitespace().nth(1)?;
    let query = path.split_once('?')?.1;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
        .filter(|code| !code.is_empty())
}

async fn wait_for_auth_code(listener: &TcpListener) -> Result<String> {
    let (mut stream, _) = listener.accept().await?;
    let mut buffer = [0u8; 4096];
    let n = stream.read(&mut buffer).await?;
    let request = String::from_utf8_lossy(&buffer[..n]).to_string();

    let code = parse_auth_code(&request);
    let message = if code.is_some() {
        "Authorization complete. You can close this tab."
    } else {
        "Authorization was not granted. You can close this tab."
    };
    let body = format!("<html><body><h2>{message}</h2></body></html>");
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.flush().await;

    code.ok_or_else(|| CrewError::Auth("consent flow cancelled".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_code_is_decoded_from_request_line() {
        let request = "GET /?code=4%2F0Ab-xyz&scope=forms HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(parse_auth_code(request).as_deref(), Some("4/0Ab-xyz"));
        assert_eq!(parse_auth_code("GET /?error=access_denied HTTP/1.1"), None);
        assert_eq!(parse_auth_code(""), None);
    }

    #[tokio::test]
    async fn static_token_is_returned_as_is() {
        let auth = Authenticator::with_static_token("abc");
        assert_eq!(auth.access_token().await.unwrap(), "abc");
    }

    #[test]
    fn nothing_configured_disables_forms() {
        let dir = tempfile::tempdir().unwrap();
        let settings = GoogleCredentials {
            credentials_file: None,
            token_file: dir.path().join("token.json").display().to_string(),
            service_account_file: None,
        };
        assert!(Authenticator::from_settings(&settings).is_none());
    }
}
