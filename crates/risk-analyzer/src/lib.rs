//! Risk Analyzer
//!
//! Read-only analytics over the cached device population: per-platform
//! risk buckets, update timelines with compliance metrics, and version
//! histograms. Every call recomputes from a full scan.
//!
//! The rules here are separate from the device service's boolean
//! vulnerability check and intentionally disagree with it at the edges.

pub mod analyzer;
pub mod models;
pub mod patterns;
pub mod rules;

pub use analyzer::{analyze_devices, device_label, Analyzer};
pub use models::{
    Analysis, ComplianceMetrics, PerPlatform, RiskBuckets, RiskLevel, SecurityStats,
    UpdatePattern, VersionDistribution,
};
pub use rules::{android_risk, ios_risk};
