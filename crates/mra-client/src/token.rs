//! Bearer token acquisition via client-credentials exchange

use crate::models::TokenResponse;
use chrono::{DateTime, Duration, Utc};
use mra_common::{Error, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

const TOKEN_PATH: &str = "/oauth2/token";

/// A cached bearer credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Usable strictly before its expiry instant
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.value.is_empty() && now < self.expires_at
    }
}

/// Obtains and caches the access token
///
/// The token is swapped as a whole under a write lock, so readers see either
/// the old or the new token. Refreshes go through `refresh_lock` and re-check
/// the cache, so concurrent callers trigger a single exchange.
pub struct TokenManager {
    http: reqwest::Client,
    token_url: String,
    application_key: String,
    token: RwLock<Option<AccessToken>>,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(http: reqwest::Client, base_url: &str, application_key: impl Into<String>) -> Self {
        Self {
            http,
            token_url: format!("{}{}", base_url.trim_end_matches('/'), TOKEN_PATH),
            application_key: application_key.into(),
            token: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Return a valid bearer token, exchanging credentials if needed
    pub async fn ensure_valid_token(&self) -> Result<String> {
        if let Some(value) = self.cached(Utc::now()).await {
            return Ok(value);
        }

        let _refresh = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(value) = self.cached(Utc::now()).await {
            return Ok(value);
        }

        let token = self.exchange().await?;
        let value = token.value.clone();
        *self.token.write().await = Some(token);
        Ok(value)
    }

    async fn cached(&self, now: DateTime<Utc>) -> Option<String> {
        let guard = self.token.read().await;
        guard
            .as_ref()
            .filter(|t| t.is_valid_at(now))
            .map(|t| t.value.clone())
    }

    async fn exchange(&self) -> Result<AccessToken> {
        debug!("Requesting access token from {}", self.token_url);

        let response = self
            .http
            .post(&self.token_url)
            .header(AUTHORIZATION, format!("Bearer {}", self.application_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| Error::Http(format!("requesting token: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading token response: {}", e)))?;

        if status != reqwest::StatusCode::OK {
            return Err(Error::Auth {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        let expires_at = match Duration::try_seconds(token.expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        {
            Some(at) => at,
            None => {
                return Err(Error::Auth {
                    status: status.as_u16(),
                    body,
                })
            }
        };
        info!("Obtained access token (expires in {}s)", token.expires_in);

        Ok(AccessToken {
            value: token.access_token,
            expires_at,
        })
    }
}
