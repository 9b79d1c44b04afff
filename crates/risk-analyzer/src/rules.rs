//! Per-device classification rules

use crate::models::RiskLevel;
use chrono::{DateTime, Duration, Utc};
use device_store::parse_patch_level;

/// Patches younger than this are considered supported
pub const ANDROID_SUPPORT_WINDOW_DAYS: i64 = 180;

/// Oldest iOS major release still considered supported
pub const IOS_MIN_SUPPORTED_MAJOR: u32 = 15;

/// Whole 30-day months from `from` to `to`, truncated toward zero
pub fn months_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_hours() / 24 / 30
}

/// Leading dot-separated integer of an iOS version
pub fn ios_major(version: &str) -> Option<u32> {
    version.split('.').next()?.parse().ok()
}

/// Android risk by patch age: 12+ months High, 6+ Medium, else Low.
/// Missing or malformed patch levels are High.
pub fn android_risk(patch_level: &str, now: DateTime<Utc>) -> RiskLevel {
    let Some(patched) = parse_patch_level(patch_level) else {
        return RiskLevel::High;
    };

    match months_between(patched, now) {
        m if m >= 12 => RiskLevel::High,
        m if m >= 6 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

/// iOS risk by major version: up to 15 High, up to 17 Medium, else Low.
/// Missing or malformed versions are High.
pub fn ios_risk(version: &str) -> RiskLevel {
    match ios_major(version) {
        None => RiskLevel::High,
        Some(major) if major <= 15 => RiskLevel::High,
        Some(major) if major <= 17 => RiskLevel::Medium,
        Some(_) => RiskLevel::Low,
    }
}

pub fn android_supported(patch_level: &str, now: DateTime<Utc>) -> bool {
    parse_patch_level(patch_level)
        .map(|patched| now - patched < Duration::days(ANDROID_SUPPORT_WINDOW_DAYS))
        .unwrap_or(false)
}

pub fn ios_supported(version: &str) -> bool {
    ios_major(version).is_some_and(|major| major >= IOS_MIN_SUPPORTED_MAJOR)
}
