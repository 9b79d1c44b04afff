//! Domain models for cached devices

use chrono::{DateTime, NaiveDate, Utc};
use mra_common::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mobile operating system of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "ANDROID",
            Platform::Ios => "IOS",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ANDROID" => Ok(Platform::Android),
            "IOS" => Ok(Platform::Ios),
            other => Err(Error::validation("platform", other, "invalid platform")),
        }
    }
}

/// Lifecycle state of a device record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationStatus {
    Activated,
    Deactivated,
    Pending,
}

impl ActivationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationStatus::Activated => "ACTIVATED",
            ActivationStatus::Deactivated => "DEACTIVATED",
            ActivationStatus::Pending => "PENDING",
        }
    }
}

impl fmt::Display for ActivationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVATED" => Ok(ActivationStatus::Activated),
            "DEACTIVATED" => Ok(ActivationStatus::Deactivated),
            "PENDING" => Ok(ActivationStatus::Pending),
            other => Err(Error::validation(
                "activation_status",
                other,
                "invalid activation status",
            )),
        }
    }
}

/// Platform-specific version information
///
/// Android devices report `security_patch_level` (`YYYY-MM-DD`), iOS devices
/// report `os_version` (dotted). An empty string means the value is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Software {
    #[serde(default)]
    pub security_patch_level: String,

    #[serde(default)]
    pub os_version: String,
}

/// A device in the local cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Primary key
    pub guid: String,

    /// Pagination cursor value assigned by the API
    pub oid: String,

    /// Parent device guid, empty for root devices
    #[serde(default)]
    pub parent_device_guid: String,

    pub activation_status: ActivationStatus,

    pub platform: Platform,

    #[serde(default)]
    pub software: Software,

    /// Number of children linked to this device
    #[serde(default)]
    pub child_count: u32,

    /// Time of the last write of this record
    pub last_updated: DateTime<Utc>,
}

impl Device {
    pub fn new(
        guid: impl Into<String>,
        oid: impl Into<String>,
        platform: Platform,
        activation_status: ActivationStatus,
    ) -> Self {
        Self {
            guid: guid.into(),
            oid: oid.into(),
            parent_device_guid: String::new(),
            activation_status,
            platform,
            software: Software::default(),
            child_count: 0,
            last_updated: Utc::now(),
        }
    }

    /// Parent guid, if this device is a child
    pub fn parent_guid(&self) -> Option<&str> {
        if self.parent_device_guid.is_empty() {
            None
        } else {
            Some(&self.parent_device_guid)
        }
    }

    /// The version value relevant to this device's platform
    pub fn version(&self) -> &str {
        match self.platform {
            Platform::Android => &self.software.security_patch_level,
            Platform::Ios => &self.software.os_version,
        }
    }

    pub fn is_active(&self) -> bool {
        self.activation_status == ActivationStatus::Activated
    }
}

/// Parse an Android security patch level (`YYYY-MM-DD`) as midnight UTC.
/// Empty or malformed values yield `None`.
pub fn parse_patch_level(patch: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(patch, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// Aggregate counts over the full cached population
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_devices: usize,
    pub active_devices: usize,
    pub android_devices: usize,
    pub ios_devices: usize,
    pub parent_devices: usize,
    pub child_devices: usize,
    pub vulnerable_devices: usize,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_wire_names() {
        assert_eq!("ANDROID".parse::<Platform>().unwrap(), Platform::Android);
        assert_eq!("IOS".parse::<Platform>().unwrap(), Platform::Ios);
        assert!("WINDOWS".parse::<Platform>().is_err());
        assert!("android".parse::<Platform>().is_err());

        assert_eq!(
            "PENDING".parse::<ActivationStatus>().unwrap(),
            ActivationStatus::Pending
        );
        assert!("RETIRED".parse::<ActivationStatus>().is_err());
    }

    #[test]
    fn test_device_json_shape() {
        let mut device = Device::new("guid-1", "42", Platform::Ios, ActivationStatus::Activated);
        device.software.os_version = "17.2".into();

        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["platform"], "IOS");
        assert_eq!(json["activation_status"], "ACTIVATED");
        assert_eq!(json["software"]["os_version"], "17.2");
        assert_eq!(json["parent_device_guid"], "");
        assert_eq!(json["child_count"], 0);
        assert!(json["last_updated"].is_string());
    }

    #[test]
    fn test_parse_patch_level() {
        let parsed = parse_patch_level("2023-01-01").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2023-01-01T00:00:00+00:00");
        assert!(parse_patch_level("").is_none());
        assert!(parse_patch_level("2023-13-01").is_none());
        assert!(parse_patch_level("January 2023").is_none());
    }

    #[test]
    fn test_version_follows_platform() {
        let mut device = Device::new("g", "1", Platform::Android, ActivationStatus::Activated);
        device.software.security_patch_level = "2024-03-05".into();
        device.software.os_version = "14".into();
        assert_eq!(device.version(), "2024-03-05");

        device.platform = Platform::Ios;
        assert_eq!(device.version(), "14");
        assert_eq!(device.parent_guid(), None);

        device.parent_device_guid = "p".into();
        assert_eq!(device.parent_guid(), Some("p"));
    }
}
