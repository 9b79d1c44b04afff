//! Full-population analysis

use crate::models::{empty_buckets, Analysis, PerPlatform, RiskBuckets};
use crate::patterns::{
    android_distribution, android_update_pattern, ios_distribution, ios_update_pattern,
    VersionCounts,
};
use crate::rules::{android_risk, ios_risk};
use chrono::{DateTime, Utc};
use device_store::{Device, DeviceService, KvStore, Platform};
use mra_common::Result;
use std::sync::Arc;
use tracing::debug;

/// Short label identifying a device in a risk bucket
pub fn device_label(device: &Device) -> String {
    let prefix: String = device.guid.chars().take(8).collect();
    format!("{} ({})", prefix, device.platform)
}

/// Analyze a snapshot of devices at a fixed clock
///
/// Devices without version information are left out of every bucket and
/// histogram.
pub fn analyze_devices(devices: &[Device], now: DateTime<Utc>) -> Analysis {
    let mut stats = PerPlatform {
        android: empty_buckets(),
        ios: empty_buckets(),
    };
    let mut counts: PerPlatform<VersionCounts> = PerPlatform::default();

    for device in devices {
        let version = device.version();
        if version.is_empty() {
            continue;
        }

        let (risk, buckets, tally): (_, &mut RiskBuckets, &mut VersionCounts) = match device.platform {
            Platform::Android => (
                android_risk(version, now),
                &mut stats.android,
                &mut counts.android,
            ),
            Platform::Ios => (ios_risk(version), &mut stats.ios, &mut counts.ios),
        };

        *tally.entry(version.to_string()).or_insert(0) += 1;
        if let Some(bucket) = buckets.get_mut(&risk) {
            bucket.count += 1;
            bucket.affected_devices.push(device_label(device));
        }
    }

    Analysis {
        security_stats: stats,
        update_patterns: PerPlatform {
            android: android_update_pattern(&counts.android, now),
            ios: ios_update_pattern(&counts.ios),
        },
        version_distribution: PerPlatform {
            android: android_distribution(&counts.android, now),
            ios: ios_distribution(&counts.ios),
        },
        timestamp: now,
    }
}

/// Read-only analysis over the device cache
pub struct Analyzer<S> {
    service: Arc<DeviceService<S>>,
}

impl<S: KvStore> Analyzer<S> {
    pub fn new(service: Arc<DeviceService<S>>) -> Self {
        Self { service }
    }

    pub fn analyze(&self) -> Result<Analysis> {
        self.analyze_at(Utc::now())
    }

    pub fn analyze_at(&self, now: DateTime<Utc>) -> Result<Analysis> {
        let devices = self.service.list()?;
        debug!("Analyzing {} cached devices", devices.len());
        Ok(analyze_devices(&devices, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskLevel;
    use chrono::TimeZone;
    use device_store::ActivationStatus;

    fn android(guid: &str, patch: &str) -> Device {
        let mut device = Device::new(guid, "1", Platform::Android, ActivationStatus::Activated);
        device.software.security_patch_level = patch.into();
        device
    }

    fn ios(guid: &str, version: &str) -> Device {
        let mut device = Device::new(guid, "1", Platform::Ios, ActivationStatus::Activated);
        device.software.os_version = version.into();
        device
    }

    #[test]
    fn test_device_label() {
        assert_eq!(device_label(&android("abcdef0123456789", "")), "abcdef01 (ANDROID)");
        assert_eq!(device_label(&ios("short", "")), "short (IOS)");
    }

    #[test]
    fn test_buckets_skip_unversioned_devices() {
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let devices = vec![
            android("aaaaaaaa-1", "2023-01-01"),
            android("bbbbbbbb-2", "2024-01-15"),
            android("cccccccc-3", ""),
            ios("dddddddd-4", "14.2"),
            ios("eeeeeeee-5", "18.1"),
            ios("ffffffff-6", ""),
        ];

        let analysis = analyze_devices(&devices, now);

        let android = &analysis.security_stats.android;
        assert_eq!(android[&RiskLevel::High].count, 1);
        assert_eq!(android[&RiskLevel::High].affected_devices, vec!["aaaaaaaa (ANDROID)"]);
        assert_eq!(android[&RiskLevel::Medium].count, 0);
        assert_eq!(android[&RiskLevel::Low].count, 1);

        let ios = &analysis.security_stats.ios;
        assert_eq!(ios[&RiskLevel::High].affected_devices, vec!["dddddddd (IOS)"]);
        assert_eq!(ios[&RiskLevel::Low].count, 1);
        assert_eq!(
            ios[&RiskLevel::Medium].description,
            "Medium risk devices requiring monitoring"
        );

        assert_eq!(analysis.version_distribution.android.len(), 2);
        assert_eq!(analysis.version_distribution.ios.len(), 2);
        assert_eq!(analysis.timestamp, now);
    }

    #[test]
    fn test_patterns_absent_without_versions() {
        let now = Utc::now();
        let analysis = analyze_devices(&[android("a", ""), ios("b", "")], now);

        assert!(analysis.update_patterns.android.is_none());
        assert!(analysis.update_patterns.ios.is_none());
        assert!(analysis.version_distribution.android.is_empty());
        assert_eq!(analysis.security_stats.android.len(), 3);
    }

    #[test]
    fn test_analysis_json_shape() {
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let analysis = analyze_devices(&[ios("dddddddd-4", "16.0")], now);

        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["security_stats"]["ios"]["Medium"]["count"], 1);
        assert_eq!(json["security_stats"]["ios"]["Medium"]["risk_level"], "Medium");
        assert_eq!(json["update_patterns"]["ios"]["oldest_patch"], "iOS 16");
        assert!(json["update_patterns"]["android"].is_null());
        assert_eq!(json["version_distribution"]["ios"][0]["percentage"], 100.0);
    }
}
