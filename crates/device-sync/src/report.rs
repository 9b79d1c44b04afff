//! Human-readable rendering of sync and analysis results

use crate::sync::{Progress, SyncReport};
use device_store::Statistics;
use risk_analyzer::{Analysis, RiskBuckets, RiskLevel, UpdatePattern};
use std::fmt::Write;

pub fn format_progress(progress: &Progress) -> String {
    format!(
        "Progress: {:.1}% ({}/{} devices processed)",
        progress.percent, progress.processed, progress.total
    )
}

pub fn format_completion(report: &SyncReport) -> String {
    format!(
        "Completed processing {}/{} devices in {} pages ({} parent links)",
        report.processed, report.declared_total, report.pages, report.parent_links
    )
}

fn write_risks(out: &mut String, title: &str, buckets: &RiskBuckets) {
    let _ = writeln!(out, "\n{} Security Risks:", title);
    for level in RiskLevel::ALL {
        let Some(stats) = buckets.get(&level).filter(|s| s.count > 0) else {
            continue;
        };
        let _ = writeln!(out, "- {} Risk: {} device(s)", level, stats.count);
        let _ = writeln!(out, "  Description: {}", stats.description);
        if !stats.affected_devices.is_empty() {
            let _ = writeln!(
                out,
                "  Affected Devices: [{}]",
                stats.affected_devices.join(", ")
            );
        }
    }
}

fn write_pattern(out: &mut String, title: &str, pattern: Option<&UpdatePattern>) {
    let Some(pattern) = pattern else {
        return;
    };
    let _ = writeln!(out, "\n{} Update Patterns:", title);
    let _ = writeln!(out, "- Update Timespan: {} months", pattern.update_timespan);
    let _ = writeln!(
        out,
        "- Average Update Frequency: {:.1} months",
        pattern.update_frequency
    );
    let _ = writeln!(
        out,
        "- Compliance: {:.1}% ({} of {} devices)",
        pattern.compliance_metrics.compliance_rate,
        pattern.compliance_metrics.compliant_devices,
        pattern.compliance_metrics.compliant_devices
            + pattern.compliance_metrics.non_compliant_devices
    );
}

/// Risk buckets and update patterns for both platforms
pub fn render_summary(analysis: &Analysis) -> String {
    let mut out = String::from("Device Statistics:\n");

    write_risks(&mut out, "Android", &analysis.security_stats.android);
    write_risks(&mut out, "iOS", &analysis.security_stats.ios);
    write_pattern(&mut out, "Android", analysis.update_patterns.android.as_ref());
    write_pattern(&mut out, "iOS", analysis.update_patterns.ios.as_ref());

    out
}

pub fn render_statistics(stats: &Statistics) -> String {
    let mut out = String::from("\nCache Statistics:\n");
    let rows = [
        ("Total devices", stats.total_devices),
        ("Active", stats.active_devices),
        ("Android", stats.android_devices),
        ("iOS", stats.ios_devices),
        ("Parents", stats.parent_devices),
        ("Children", stats.child_devices),
        ("Vulnerable", stats.vulnerable_devices),
    ];
    for (label, value) in rows {
        let _ = writeln!(out, "- {}: {}", label, value);
    }
    let _ = writeln!(out, "- Computed at: {}", stats.last_updated.to_rfc3339());
    out
}
