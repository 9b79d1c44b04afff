//! Wire models for the Mobile Risk API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// OAuth2 client-credentials token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(default)]
    pub token_type: String,

    /// Lifetime in seconds
    pub expires_in: i64,

    #[serde(default)]
    pub scope: String,
}

/// One page of the device list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevicesResponse {
    /// Total number of devices known to the server
    #[serde(default)]
    pub count: u64,

    #[serde(default)]
    pub devices: Vec<ApiDevice>,
}

/// A device as returned by the list endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiDevice {
    pub guid: String,

    #[serde(default, deserialize_with = "string_or_number")]
    pub oid: String,

    #[serde(default)]
    pub parent_device_guid: String,

    #[serde(default)]
    pub activation_status: String,

    #[serde(default)]
    pub platform: String,

    #[serde(default)]
    pub software: ApiSoftware,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSoftware {
    #[serde(default)]
    pub security_patch_level: String,

    #[serde(default)]
    pub os_version: String,
}

/// Vulnerability list for one patch level or OS version
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VulnerabilitiesResponse {
    #[serde(default)]
    pub count: u64,

    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub severity: String,

    #[serde(default)]
    pub cve: String,

    #[serde(default)]
    pub cvss: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// Cursor values are opaque; some deployments emit them as JSON numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Oid {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Oid::deserialize(deserializer)? {
        Oid::Text(s) => s,
        Oid::Number(n) => n.to_string(),
    })
}
