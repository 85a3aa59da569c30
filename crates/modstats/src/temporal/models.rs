//! Row types read from and written to the snapshot tables.

use crate::bundles::{BundleKey, BundleRecord};
use crate::platforms::Platform;
use chrono::NaiveDate;
use serde::Serialize;

/// Platform-wide totals for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub platform: Platform,
    pub total_downloads: i64,
    pub followers: i64,
    pub versions_count: i64,
}

/// Downloads of one published version on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionSnapshot {
    pub date: NaiveDate,
    pub platform: Platform,
    pub version_name: String,
    pub version_number: String,
    pub downloads: i64,
    pub date_published: Option<String>,
}

/// Downloads of one dependent bundle on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleSnapshot {
    pub date: NaiveDate,
    pub platform: Platform,
    pub name: String,
    pub slug: String,
    pub downloads: i64,
    pub followers: i64,
}

impl BundleKey for BundleSnapshot {
    fn slug(&self) -> &str {
        &self.slug
    }

    /// Snapshot rows carry no id, so resolution goes by slug.
    fn id(&self) -> Option<i64> {
        None
    }
}

/// Input row for [`save_bundle_snapshots`](super::SnapshotStore::save_bundle_snapshots).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleStat {
    pub name: String,
    pub slug: String,
    pub downloads: i64,
    pub followers: i64,
}

impl From<&BundleRecord> for BundleStat {
    fn from(r: &BundleRecord) -> Self {
        Self {
            name: r.name.clone(),
            slug: r.slug.clone(),
            downloads: r.downloads,
            // The search API does not report followers for bundles.
            followers: 0,
        }
    }
}

/// Total downloads on a day and the change since the previous recorded day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GrowthPoint {
    pub date: NaiveDate,
    pub total: i64,
    pub daily_delta: i64,
}

/// Baseline of a bundle: its earliest recorded snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FirstSeen {
    pub downloads: i64,
    pub date: NaiveDate,
}

impl FirstSeen {
    /// Downloads gained since the baseline. Upstream resets clamp to zero.
    pub fn since_tracked(&self, latest: i64) -> i64 {
        (latest - self.downloads).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_since_tracked_clamps_at_zero() {
        let first = FirstSeen {
            downloads: 10,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        assert_eq!(first.since_tracked(40), 30);
        assert_eq!(first.since_tracked(10), 0);
        assert_eq!(first.since_tracked(3), 0);
    }

    #[test]
    fn test_bundle_stat_from_record() {
        let record = BundleRecord {
            id: Some(123456),
            name: "Pack".to_string(),
            slug: "pack".to_string(),
            downloads: 77,
            link: String::new(),
        };
        let stat = BundleStat::from(&record);
        assert_eq!(stat.slug, "pack");
        assert_eq!(stat.downloads, 77);
        assert_eq!(stat.followers, 0);
    }
}
