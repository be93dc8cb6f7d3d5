//! OAuth2 client-credentials token handling.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use super::error::CtpError;
use crate::config::ProjectCredentials;

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Fetches and caches access tokens for one API client.
#[derive(Debug)]
pub struct TokenProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(http: reqwest::Client, credentials: &ProjectCredentials) -> Self {
        Self {
            http,
            token_url: format!("{}/oauth/token", credentials.auth_url),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            scope: credentials.scopes.join(" "),
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid access token, fetching a new one when needed.
    pub async fn token(&self) -> Result<String, CtpError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drops the cached token so the next call fetches a fresh one.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn fetch(&self) -> Result<CachedToken, CtpError> {
        debug!(url = %self.token_url, "Fetching access token");

        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials"), ("scope", self.scope.as_str())])
            .send()
            .await
            .map_err(|source| CtpError::Transport {
                url: self.token_url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CtpError::Authentication(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let body = response.text().await.map_err(|source| CtpError::Transport {
            url: self.token_url.clone(),
            source,
        })?;
        let token: TokenResponse = serde_json::from_str(&body).map_err(|source| CtpError::Decode {
            url: self.token_url.clone(),
            source,
        })?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        let refresh_at = Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN);

        Ok(CachedToken {
            value: token.access_token,
            refresh_at,
        })
    }
}
