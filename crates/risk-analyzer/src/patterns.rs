//! Update timelines and version histograms
//!
//! Each function takes the per-platform tally of raw version strings to
//! the number of devices reporting them.

use crate::models::{ComplianceMetrics, UpdatePattern, VersionDistribution};
use crate::rules::{android_supported, ios_major, ios_supported, months_between};
use chrono::{DateTime, Datelike, Utc};
use device_store::parse_patch_level;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

pub type VersionCounts = BTreeMap<String, usize>;

fn total(counts: &VersionCounts) -> usize {
    counts.values().sum()
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn frequency(timespan: i64, observations: usize) -> f64 {
    if observations > 1 {
        timespan as f64 / (observations - 1) as f64
    } else {
        0.0
    }
}

fn compliance(counts: &VersionCounts, supported: impl Fn(&str) -> bool) -> ComplianceMetrics {
    let all = total(counts);
    let compliant: usize = counts
        .iter()
        .filter(|(version, _)| supported(version))
        .map(|(_, count)| count)
        .sum();

    ComplianceMetrics {
        compliant_devices: compliant,
        non_compliant_devices: all - compliant,
        compliance_rate: percent(compliant, all),
        average_delay: 0.0,
    }
}

fn month_index(date: DateTime<Utc>) -> i32 {
    date.year() * 12 + date.month0() as i32
}

/// Android timeline over the parseable patch levels, `None` if there are none
pub fn android_update_pattern(counts: &VersionCounts, now: DateTime<Utc>) -> Option<UpdatePattern> {
    let parsed: Vec<(DateTime<Utc>, usize)> = counts
        .iter()
        .filter_map(|(patch, &count)| parse_patch_level(patch).map(|date| (date, count)))
        .collect();

    let dates: BTreeSet<DateTime<Utc>> = parsed.iter().map(|(date, _)| *date).collect();
    let oldest = *dates.first()?;
    let newest = *dates.last()?;
    let timespan = months_between(oldest, newest);

    let observed: BTreeSet<i32> = dates.iter().map(|&d| month_index(d)).collect();
    let update_gaps = (month_index(oldest) + 1..month_index(newest))
        .filter(|idx| !observed.contains(idx))
        .map(|idx| format!("{:04}-{:02}", idx.div_euclid(12), idx.rem_euclid(12) + 1))
        .collect();

    let mut compliance_metrics = compliance(counts, |patch| android_supported(patch, now));
    let (delay_days, devices) = parsed
        .iter()
        .fold((0i64, 0usize), |(days, n), (date, count)| {
            (days + (newest - *date).num_days() * *count as i64, n + count)
        });
    if devices > 0 {
        compliance_metrics.average_delay = delay_days as f64 / devices as f64;
    }

    Some(UpdatePattern {
        update_timespan: timespan,
        oldest_patch: oldest.format("%Y-%m-%d").to_string(),
        newest_patch: newest.format("%Y-%m-%d").to_string(),
        update_frequency: frequency(timespan, dates.len()),
        update_gaps,
        compliance_metrics,
    })
}

/// iOS timeline over major versions, approximating a major release as 12 months
pub fn ios_update_pattern(counts: &VersionCounts) -> Option<UpdatePattern> {
    // one entry per distinct version string, so 16.0 and 16.1 both count
    let majors: Vec<u32> = counts.keys().filter_map(|v| ios_major(v)).collect();
    let oldest = *majors.iter().min()?;
    let newest = *majors.iter().max()?;
    let timespan = i64::from(newest - oldest) * 12;

    Some(UpdatePattern {
        update_timespan: timespan,
        oldest_patch: format!("iOS {}", oldest),
        newest_patch: format!("iOS {}", newest),
        update_frequency: frequency(timespan, majors.len()),
        update_gaps: Vec::new(),
        compliance_metrics: compliance(counts, ios_supported),
    })
}

/// Android histogram, newest patch level first
pub fn android_distribution(counts: &VersionCounts, now: DateTime<Utc>) -> Vec<VersionDistribution> {
    let all = total(counts);
    // BTreeMap iterates ascending
    counts
        .iter()
        .rev()
        .map(|(version, &count)| VersionDistribution {
            version: version.clone(),
            count,
            percentage: percent(count, all),
            is_supported: android_supported(version, now),
        })
        .collect()
}

/// iOS histogram, highest major first, ties broken by the full string descending
pub fn ios_distribution(counts: &VersionCounts) -> Vec<VersionDistribution> {
    let all = total(counts);
    let mut distribution: Vec<VersionDistribution> = counts
        .iter()
        .map(|(version, &count)| VersionDistribution {
            version: version.clone(),
            count,
            percentage: percent(count, all),
            is_supported: ios_supported(version),
        })
        .collect();

    distribution.sort_by_key(|d| {
        (
            Reverse(ios_major(&d.version).unwrap_or(0)),
            Reverse(d.version.clone()),
        )
    });
    distribution
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn counts(entries: &[(&str, usize)]) -> VersionCounts {
        entries.iter().map(|(v, c)| (v.to_string(), *c)).collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_android_pattern_gaps_and_frequency() {
        let patches = counts(&[
            ("2023-11-05", 1),
            ("2024-01-05", 2),
            ("2024-04-01", 1),
            ("not-a-date", 1),
        ]);

        let pattern = android_update_pattern(&patches, now()).unwrap();

        assert_eq!(pattern.oldest_patch, "2023-11-05");
        assert_eq!(pattern.newest_patch, "2024-04-01");
        // 148 days
        assert_eq!(pattern.update_timespan, 4);
        assert_eq!(pattern.update_frequency, 2.0);
        assert_eq!(pattern.update_gaps, vec!["2023-12", "2024-02", "2024-03"]);
    }

    #[test]
    fn test_android_pattern_compliance() {
        let patches = counts(&[("2024-05-01", 3), ("2023-06-01", 1)]);

        let metrics = android_update_pattern(&patches, now())
            .unwrap()
            .compliance_metrics;

        assert_eq!(metrics.compliant_devices, 3);
        assert_eq!(metrics.non_compliant_devices, 1);
        assert_eq!(metrics.compliance_rate, 75.0);
        // 335 days behind for one device out of four
        assert_eq!(metrics.average_delay, 335.0 / 4.0);
    }

    #[test]
    fn test_android_pattern_single_value() {
        let pattern = android_update_pattern(&counts(&[("2024-01-05", 4)]), now()).unwrap();
        assert_eq!(pattern.update_timespan, 0);
        assert_eq!(pattern.update_frequency, 0.0);
        assert!(pattern.update_gaps.is_empty());
    }

    #[test]
    fn test_android_pattern_requires_parseable_patch() {
        assert!(android_update_pattern(&counts(&[("garbage", 2)]), now()).is_none());
        assert!(android_update_pattern(&VersionCounts::new(), now()).is_none());
    }

    #[test]
    fn test_ios_pattern() {
        let versions = counts(&[("15.7", 1), ("16.0", 2), ("17.4.1", 1), ("x", 1)]);

        let pattern = ios_update_pattern(&versions).unwrap();

        assert_eq!(pattern.oldest_patch, "iOS 15");
        assert_eq!(pattern.newest_patch, "iOS 17");
        assert_eq!(pattern.update_timespan, 24);
        assert_eq!(pattern.update_frequency, 12.0);
        assert!(pattern.update_gaps.is_empty());
        assert_eq!(pattern.compliance_metrics.compliant_devices, 4);
        assert_eq!(pattern.compliance_metrics.non_compliant_devices, 1);
    }

    #[test]
    fn test_android_distribution_order_and_support() {
        let dist = android_distribution(
            &counts(&[("2023-06-01", 1), ("2024-05-01", 2), ("2024-01-01", 1)]),
            now(),
        );

        let versions: Vec<&str> = dist.iter().map(|d| d.version.as_str()).collect();
        assert_eq!(versions, vec!["2024-05-01", "2024-01-01", "2023-06-01"]);
        assert_eq!(dist[0].percentage, 50.0);
        assert!(dist[0].is_supported);
        assert!(dist[1].is_supported);
        assert!(!dist[2].is_supported);
    }

    #[test]
    fn test_ios_distribution_sorts_major_numerically() {
        let dist = ios_distribution(&counts(&[
            ("9.3", 1),
            ("17.1", 1),
            ("17.10", 1),
            ("16.0", 1),
        ]));

        let versions: Vec<&str> = dist.iter().map(|d| d.version.as_str()).collect();
        assert_eq!(versions, vec!["17.10", "17.1", "16.0", "9.3"]);
        assert!(!dist[3].is_supported);

        let sum: f64 = dist.iter().map(|d| d.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }
}
