//! Analysis result types

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Risk bucket assigned to a device
///
/// Ordered from most to least urgent, so maps keyed by level iterate
/// High, Medium, Low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low];

    pub fn description(&self) -> &'static str {
        match self {
            RiskLevel::High => "High risk devices requiring immediate attention",
            RiskLevel::Medium => "Medium risk devices requiring monitoring",
            RiskLevel::Low => "Low risk devices meeting security requirements",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
        };
        f.write_str(name)
    }
}

/// Devices in one risk bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityStats {
    pub risk_level: RiskLevel,
    pub count: usize,
    pub description: String,

    /// Labels of the form `<guid prefix> (<PLATFORM>)`
    pub affected_devices: Vec<String>,
}

impl SecurityStats {
    pub fn empty(level: RiskLevel) -> Self {
        Self {
            risk_level: level,
            count: 0,
            description: level.description().to_string(),
            affected_devices: Vec::new(),
        }
    }
}

/// All three buckets, always present
pub type RiskBuckets = BTreeMap<RiskLevel, SecurityStats>;

pub fn empty_buckets() -> RiskBuckets {
    RiskLevel::ALL
        .iter()
        .map(|&level| (level, SecurityStats::empty(level)))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComplianceMetrics {
    pub compliant_devices: usize,
    pub non_compliant_devices: usize,

    /// Percentage of versioned devices on a supported version
    pub compliance_rate: f64,

    /// Mean days each device's patch trails the newest observed patch
    /// (Android only)
    pub average_delay: f64,
}

/// Timeline statistics over one platform's observed versions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdatePattern {
    /// Months between the oldest and newest observation
    pub update_timespan: i64,
    pub oldest_patch: String,
    pub newest_patch: String,

    /// Average months between distinct observations
    pub update_frequency: f64,

    /// Months (`YYYY-MM`) with no observed patch
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub update_gaps: Vec<String>,

    pub compliance_metrics: ComplianceMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionDistribution {
    pub version: String,
    pub count: usize,
    pub percentage: f64,
    pub is_supported: bool,
}

/// A value per platform
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerPlatform<T> {
    pub android: T,
    pub ios: T,
}

/// Full analysis of the cached population
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub security_stats: PerPlatform<RiskBuckets>,
    pub update_patterns: PerPlatform<Option<UpdatePattern>>,
    pub version_distribution: PerPlatform<Vec<VersionDistribution>>,
    pub timestamp: DateTime<Utc>,
}
