//! Wire record to cached device

use device_store::{ActivationStatus, Device, Platform, Software};
use mra_client::ApiDevice;
use mra_common::Result;

/// Convert a listed device, rejecting unknown platform or status values
pub fn to_domain(api: ApiDevice) -> Result<Device> {
    let platform: Platform = api.platform.parse()?;
    let status: ActivationStatus = api.activation_status.parse()?;

    let mut device = Device::new(api.guid, api.oid, platform, status);
    device.parent_device_guid = api.parent_device_guid;
    device.software = Software {
        security_patch_level: api.software.security_patch_level,
        os_version: api.software.os_version,
    };
    Ok(device)
}
