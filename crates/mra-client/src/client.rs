//! Retrying client for the MRA device and vulnerability endpoints

use crate::models::{DevicesResponse, VulnerabilitiesResponse};
use crate::token::TokenManager;
use async_trait::async_trait;
use mra_common::{Error, Result};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const DEVICES_PATH: &str = "/mra/api/v2/devices";
const ANDROID_VULNS_PATH: &str = "/mra/api/v2/os-vulns/android";
const IOS_VULNS_PATH: &str = "/mra/api/v2/os-vulns/ios";

/// Connection and retry settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,

    /// Static application key exchanged for bearer tokens
    pub application_key: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Retries after the first attempt for transport errors, 429 and 5xx
    pub max_retries: u32,

    /// Fixed sleep between attempts
    pub retry_delay: Duration,
}

/// A source of device pages addressed by cursor
#[async_trait]
pub trait DeviceSource: Send + Sync {
    /// Fetch up to `limit` devices after `cursor` (first page when `None`)
    async fn fetch_page(&self, cursor: Option<&str>, limit: u32) -> Result<DevicesResponse>;
}

/// Client for the Mobile Risk API
pub struct MraClient {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenManager,
    max_retries: u32,
    retry_delay: Duration,
    cancel: CancellationToken,
    retries: AtomicU64,
}

impl MraClient {
    /// Create a new client; `cancel` stops retries and new attempts
    pub fn new(config: ClientConfig, cancel: CancellationToken) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Http(format!("building HTTP client: {}", e)))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let tokens = TokenManager::new(http.clone(), &base_url, config.application_key);

        Ok(Self {
            http,
            base_url,
            tokens,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            cancel,
            retries: AtomicU64::new(0),
        })
    }

    /// Number of retried attempts since the client was created
    pub fn retries_performed(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Fetch one page of devices
    pub async fn fetch_page(&self, cursor: Option<&str>, limit: u32) -> Result<DevicesResponse> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(oid) = cursor.filter(|c| !c.is_empty()) {
            query.push(("oid", oid.to_string()));
        }

        self.get_json(DEVICES_PATH, &query).await
    }

    /// Look up known vulnerabilities for one patch level or OS version
    ///
    /// `platform` is `android` or `ios` (case-insensitive). Android patch
    /// levels must look like a date (`YYYY-MM-DD`); the check happens before
    /// any request is made.
    pub async fn get_vulnerabilities(
        &self,
        platform: &str,
        version: &str,
    ) -> Result<VulnerabilitiesResponse> {
        if version.is_empty() {
            return Err(Error::validation("version", version, "version is required"));
        }

        let (path, param) = match platform.to_ascii_lowercase().as_str() {
            "android" => {
                if !version.contains('-') {
                    return Err(Error::validation(
                        "version",
                        version,
                        "invalid Android security patch level format",
                    ));
                }
                (ANDROID_VULNS_PATH, "aspl")
            }
            "ios" => (IOS_VULNS_PATH, "version"),
            _ => {
                return Err(Error::validation(
                    "platform",
                    platform,
                    "platform must be android or ios",
                ))
            }
        };

        self.get_json(path, &[(param, version.to_string())]).await
    }

    /// GET `path` with retries, decoding the successful body as JSON.
    /// The token is ensured once for the whole batch of attempts.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let token = self.tokens.ensure_valid_token().await?;
        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            match self.send_once(&url, query, &token).await {
                Ok(body) => return Ok(serde_json::from_str(&body)?),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    self.retries.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "GET {} failed ({}), retry {}/{} in {:?}",
                        path, e, attempt, self.max_retries, self.retry_delay
                    );

                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, url: &str, query: &[(&str, String)], token: &str) -> Result<String> {
        debug!("GET {} {:?}", url, query);

        let response = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::Http(format!("GET {}: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading response from {}: {}", url, e)))?;

        if !status.is_success() {
            return Err(Error::Api {
                status_code: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl DeviceSource for MraClient {
    async fn fetch_page(&self, cursor: Option<&str>, limit: u32) -> Result<DevicesResponse> {
        MraClient::fetch_page(self, cursor, limit).await
    }
}
