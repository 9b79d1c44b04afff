//! Device persistence on top of a [`KvStore`]
//!
//! Each device is stored under its guid as the JSON encoding of [`Device`].
//! There are no secondary indexes; platform and status filters scan.

use crate::models::{Device, Platform};
use crate::store::{KvStore, ReadTxn};
use chrono::Utc;
use mra_common::{Error, Result};
use tracing::debug;

pub struct DeviceRepository<S> {
    store: S,
}

fn decode(bytes: &[u8]) -> Result<Device> {
    Ok(serde_json::from_slice(bytes)?)
}

fn scan_devices(txn: &dyn ReadTxn) -> Result<Vec<Device>> {
    txn.scan()?
        .iter()
        .map(|(_, value)| decode(value))
        .collect()
}

impl<S: KvStore> DeviceRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Upsert a device, refreshing `last_updated`
    pub fn save(&self, device: &mut Device) -> Result<()> {
        device.last_updated = Utc::now();
        let data = serde_json::to_vec(device)?;

        self.store.update(|txn| txn.put(&device.guid, &data))?;
        debug!("Saved device {}", device.guid);
        Ok(())
    }

    pub fn get(&self, guid: &str) -> Result<Option<Device>> {
        self.store.view(|txn| match txn.get(guid)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        })
    }

    pub fn list(&self) -> Result<Vec<Device>> {
        self.store.view(scan_devices)
    }

    pub fn list_by_platform(&self, platform: Platform) -> Result<Vec<Device>> {
        let devices = self.list()?;
        Ok(devices.into_iter().filter(|d| d.platform == platform).collect())
    }

    pub fn list_active(&self) -> Result<Vec<Device>> {
        let devices = self.list()?;
        Ok(devices.into_iter().filter(Device::is_active).collect())
    }

    /// Replace an existing device; fails with `NotFound` if it is absent
    pub fn update(&self, device: &mut Device) -> Result<()> {
        device.last_updated = Utc::now();
        let data = serde_json::to_vec(device)?;

        self.store.update(|txn| {
            if txn.get(&device.guid)?.is_none() {
                return Err(Error::NotFound(format!("device {}", device.guid)));
            }
            txn.put(&device.guid, &data)
        })?;
        debug!("Updated device {}", device.guid);
        Ok(())
    }

    pub fn delete(&self, guid: &str) -> Result<()> {
        let removed = self.store.update(|txn| txn.remove(guid))?;
        if !removed {
            return Err(Error::NotFound(format!("device {}", guid)));
        }
        debug!("Deleted device {}", guid);
        Ok(())
    }

    /// Add `delta` to a device's child count inside one write transaction.
    ///
    /// Returns `Ok(false)` when the device does not exist. The count never
    /// drops below zero.
    pub fn adjust_child_count(&self, guid: &str, delta: i64) -> Result<bool> {
        self.store.update(|txn| {
            let Some(bytes) = txn.get(guid)? else {
                return Ok(false);
            };

            let mut device = decode(&bytes)?;
            let adjusted = (i64::from(device.child_count) + delta).clamp(0, i64::from(u32::MAX));
            device.child_count = adjusted as u32;
            device.last_updated = Utc::now();

            let data = serde_json::to_vec(&device)?;
            txn.put(guid, &data)?;
            Ok(true)
        })
    }
}
