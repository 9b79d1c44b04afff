//! Configuration management for Device Sync
//!
//! Loads configuration from environment variables (and an optional `.env`
//! file) with defaults.

use anyhow::{Context, Result};
use mra_client::ClientConfig;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const ENVIRONMENTS: &[&str] = &["development", "testing", "staging", "production"];
const LOG_LEVELS: &[&str] = &["debug", "info", "warn", "error", "fatal"];
const CRATES: &[&str] = &["device_sync", "device_store", "mra_client", "risk_analyzer"];

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// MRA API base URL
    pub api_base_url: String,

    /// Application key exchanged for bearer tokens
    pub application_key: String,

    /// Per-request timeout in seconds
    pub api_timeout_secs: u64,

    /// Retries after the first attempt of a request
    pub api_max_retries: u32,

    /// Fixed delay between attempts in seconds
    pub api_retry_delay_secs: u64,

    /// Path of the local device cache
    pub db_path: PathBuf,

    /// Deployment environment name
    pub app_env: String,

    /// Default log level when `RUST_LOG` is unset
    pub log_level: String,

    /// Maximum concurrent device writes per page
    pub worker_count: usize,

    /// Devices requested per page
    pub batch_size: u32,

    /// Grace period after a shutdown signal, in seconds
    pub shutdown_timeout_secs: u64,

    /// Analyze the cache without contacting the API
    pub local_mode: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env(local_mode: bool) -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        Self::from_source(local_mode, |key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_source<F>(local_mode: bool, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Config {
            api_base_url: get("API_BASE_URL", "https://api.lookout.com"),
            application_key: get("APPLICATION_KEY", ""),
            api_timeout_secs: parse(&lookup, "API_TIMEOUT_SECS", "30")?,
            api_max_retries: parse(&lookup, "API_MAX_RETRIES", "3")?,
            api_retry_delay_secs: parse(&lookup, "API_RETRY_DELAY_SECS", "5")?,
            db_path: PathBuf::from(get("DB_PATH", "data/devices.db")),
            app_env: get("APP_ENV", "development"),
            log_level: get("LOG_LEVEL", "info"),
            worker_count: parse(&lookup, "WORKER_COUNT", "5")?,
            batch_size: parse(&lookup, "BATCH_SIZE", "1000")?,
            shutdown_timeout_secs: parse(&lookup, "SHUTDOWN_TIMEOUT_SECS", "30")?,
            local_mode,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if !self.local_mode && self.application_key.is_empty() {
            anyhow::bail!("APPLICATION_KEY is required when not in local mode");
        }

        if !self.local_mode && self.api_base_url.is_empty() {
            anyhow::bail!("API_BASE_URL is required when not in local mode");
        }

        if self.api_timeout_secs < 1 {
            anyhow::bail!("API_TIMEOUT_SECS must be at least 1 second");
        }

        if self.api_retry_delay_secs < 1 {
            anyhow::bail!("API_RETRY_DELAY_SECS must be at least 1 second");
        }

        if self.db_path.as_os_str().is_empty() {
            anyhow::bail!("DB_PATH is required");
        }

        if !ENVIRONMENTS.contains(&self.app_env.as_str()) {
            anyhow::bail!("Invalid APP_ENV: {}", self.app_env);
        }

        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            anyhow::bail!("Invalid LOG_LEVEL: {}", self.log_level);
        }

        if self.worker_count < 1 {
            anyhow::bail!("WORKER_COUNT must be at least 1");
        }

        if self.batch_size < 1 {
            anyhow::bail!("BATCH_SIZE must be at least 1");
        }

        if self.shutdown_timeout_secs < 1 {
            anyhow::bail!("SHUTDOWN_TIMEOUT_SECS must be at least 1 second");
        }

        Ok(())
    }

    /// Settings for the API client
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api_base_url.clone(),
            application_key: self.application_key.clone(),
            timeout: Duration::from_secs(self.api_timeout_secs),
            max_retries: self.api_max_retries,
            retry_delay: Duration::from_secs(self.api_retry_delay_secs),
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Default `EnvFilter` directive for the workspace crates
    pub fn log_filter(&self) -> String {
        let level = match self.log_level.as_str() {
            "fatal" => "error",
            other => other,
        };

        CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn parse<T, F>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    // empty means unset
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse()
        .with_context(|| format!("Invalid {}", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(local_mode: bool, vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_source(local_mode, |key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = load(false, &[("APPLICATION_KEY", "secret")]).unwrap();

        assert_eq!(config.api_base_url, "https://api.lookout.com");
        assert_eq!(config.api_timeout_secs, 30);
        assert_eq!(config.api_max_retries, 3);
        assert_eq!(config.api_retry_delay_secs, 5);
        assert_eq!(config.db_path, PathBuf::from("data/devices.db"));
        assert_eq!(config.app_env, "development");
        assert_eq!(config.worker_count, 5);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
        assert!(!config.local_mode);
    }

    #[test]
    fn test_application_key_required_unless_local() {
        let err = load(false, &[]).unwrap_err();
        assert!(err.to_string().contains("APPLICATION_KEY"));

        let config = load(true, &[]).unwrap();
        assert!(config.local_mode);
        assert!(config.application_key.is_empty());
    }

    #[test]
    fn test_unparsable_number_is_an_error() {
        let err = load(true, &[("WORKER_COUNT", "many")]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid WORKER_COUNT");

        let err = load(true, &[("API_MAX_RETRIES", "-1")]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid API_MAX_RETRIES");
    }

    #[test]
    fn test_empty_number_uses_default() {
        let config = load(true, &[("WORKER_COUNT", ""), ("API_TIMEOUT_SECS", " ")]).unwrap();
        assert_eq!(config.worker_count, 5);
        assert_eq!(config.api_timeout_secs, 30);
    }

    #[test]
    fn test_range_validation() {
        for (key, value) in [
            ("WORKER_COUNT", "0"),
            ("BATCH_SIZE", "0"),
            ("API_TIMEOUT_SECS", "0"),
            ("API_RETRY_DELAY_SECS", "0"),
            ("SHUTDOWN_TIMEOUT_SECS", "0"),
            ("DB_PATH", ""),
        ] {
            let err = load(true, &[(key, value)]).unwrap_err();
            assert!(err.to_string().contains(key), "{key}: {err}");
        }

        let config = load(true, &[("API_MAX_RETRIES", "0")]).unwrap();
        assert_eq!(config.api_max_retries, 0);
    }

    #[test]
    fn test_environment_and_log_level() {
        assert!(load(true, &[("APP_ENV", "qa")]).is_err());
        assert!(load(true, &[("LOG_LEVEL", "trace")]).is_err());

        let config = load(true, &[("APP_ENV", "production"), ("LOG_LEVEL", "fatal")]).unwrap();
        assert_eq!(
            config.log_filter(),
            "device_sync=error,device_store=error,mra_client=error,risk_analyzer=error"
        );
    }

    #[test]
    fn test_client_config() {
        let config = load(
            false,
            &[
                ("APPLICATION_KEY", "secret"),
                ("API_BASE_URL", "http://localhost:9000"),
                ("API_RETRY_DELAY_SECS", "2"),
            ],
        )
        .unwrap();

        let client = config.client_config();
        assert_eq!(client.base_url, "http://localhost:9000");
        assert_eq!(client.application_key, "secret");
        assert_eq!(client.retry_delay, Duration::from_secs(2));
        assert_eq!(client.timeout, Duration::from_secs(30));
    }
}
