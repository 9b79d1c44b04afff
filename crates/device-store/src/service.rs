//! Device service: validation and parent/child bookkeeping
//!
//! This is the only write path that enforces device invariants. Parent
//! child-count adjustments are best-effort: a missing parent is tolerated,
//! a parent that is found but cannot be rewritten is reported as
//! [`Error::PartialConsistency`] after the primary write has committed.

use crate::models::{parse_patch_level, Device, Platform, Statistics};
use crate::repository::DeviceRepository;
use crate::store::KvStore;
use chrono::{DateTime, Duration, Utc};
use mra_common::{Error, Result};
use tracing::{debug, warn};

/// Android patches older than this are counted as vulnerable in statistics
const VULNERABLE_PATCH_AGE_DAYS: i64 = 180;

/// Result of a successful create
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateOutcome {
    /// Whether an existing parent had its child count incremented
    pub parent_linked: bool,
}

pub struct DeviceService<S> {
    repo: DeviceRepository<S>,
}

impl<S: KvStore> DeviceService<S> {
    pub fn new(repo: DeviceRepository<S>) -> Self {
        Self { repo }
    }

    /// Upsert a device and link it to its parent if the parent is cached
    pub fn create(&self, mut device: Device) -> Result<CreateOutcome> {
        validate_device(&device)?;

        self.repo.save(&mut device)?;

        let mut outcome = CreateOutcome::default();
        if let Some(parent) = device.parent_guid() {
            outcome.parent_linked = self.adjust_parent(&device.guid, parent, 1)?;
            if !outcome.parent_linked {
                debug!(
                    "Parent {} of device {} not cached yet, skipping link",
                    parent, device.guid
                );
            }
        }

        Ok(outcome)
    }

    pub fn get(&self, guid: &str) -> Result<Device> {
        if guid.is_empty() {
            return Err(Error::validation("guid", guid, "device GUID is required"));
        }
        self.repo
            .get(guid)?
            .ok_or_else(|| Error::NotFound(format!("device {}", guid)))
    }

    pub fn list(&self) -> Result<Vec<Device>> {
        self.repo.list()
    }

    /// Replace an existing device, moving it between parents if needed
    pub fn update(&self, mut device: Device) -> Result<()> {
        validate_device(&device)?;

        let existing = self.get(&device.guid)?;
        self.repo.update(&mut device)?;

        if existing.parent_device_guid == device.parent_device_guid {
            return Ok(());
        }

        // Both adjustments are attempted; the first failure is reported.
        let old = existing
            .parent_guid()
            .map(|p| self.adjust_parent(&device.guid, p, -1))
            .transpose();
        let new = device
            .parent_guid()
            .map(|p| self.adjust_parent(&device.guid, p, 1))
            .transpose();

        old?;
        new?;
        Ok(())
    }

    pub fn delete(&self, guid: &str) -> Result<()> {
        let device = self.get(guid)?;
        self.repo.delete(guid)?;

        if let Some(parent) = device.parent_guid() {
            self.adjust_parent(guid, parent, -1)?;
        }
        Ok(())
    }

    pub fn list_by_platform(&self, platform: Platform) -> Result<Vec<Device>> {
        self.repo.list_by_platform(platform)
    }

    pub fn list_active(&self) -> Result<Vec<Device>> {
        self.repo.list_active()
    }

    /// Tally the full cached population in a single pass
    pub fn compute_statistics(&self, now: DateTime<Utc>) -> Result<Statistics> {
        let devices = self.repo.list()?;

        let mut stats = Statistics {
            total_devices: devices.len(),
            active_devices: 0,
            android_devices: 0,
            ios_devices: 0,
            parent_devices: 0,
            child_devices: 0,
            vulnerable_devices: 0,
            last_updated: now,
        };

        for device in &devices {
            if device.is_active() {
                stats.active_devices += 1;
            }

            match device.platform {
                Platform::Android => stats.android_devices += 1,
                Platform::Ios => stats.ios_devices += 1,
            }

            if device.parent_guid().is_none() {
                stats.parent_devices += 1;
            } else {
                stats.child_devices += 1;
            }

            if is_vulnerable(device, now) {
                stats.vulnerable_devices += 1;
            }
        }

        Ok(stats)
    }

    fn adjust_parent(&self, guid: &str, parent: &str, delta: i64) -> Result<bool> {
        self.repo.adjust_child_count(parent, delta).map_err(|e| {
            warn!(
                "Device {} written but parent {} count update failed: {}",
                guid, parent, e
            );
            Error::PartialConsistency {
                guid: guid.to_string(),
                related: parent.to_string(),
                source: Box::new(e),
            }
        })
    }
}

fn validate_device(device: &Device) -> Result<()> {
    if device.guid.is_empty() {
        return Err(Error::validation("guid", "", "device GUID is required"));
    }
    Ok(())
}

/// Statistics-level vulnerability rule.
///
/// Not the analyzer's three-tier classification: Android patches older than
/// 180 days are vulnerable, iOS versions compare their first two bytes
/// against `"15"`.
pub fn is_vulnerable(device: &Device, now: DateTime<Utc>) -> bool {
    match device.platform {
        Platform::Android => match parse_patch_level(&device.software.security_patch_level) {
            Some(patched) => {
                now.signed_duration_since(patched) > Duration::days(VULNERABLE_PATCH_AGE_DAYS)
            }
            None => true,
        },
        Platform::Ios => {
            let version = &device.software.os_version;
            if version.is_empty() {
                return true;
            }
            version.len() > 2 && &version.as_bytes()[..2] < &b"15"[..]
        }
    }
}
