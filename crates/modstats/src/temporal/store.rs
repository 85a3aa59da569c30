//! Snapshot store: idempotent daily upserts and trend queries over SQLite.

use super::migrations::{self, AppliedMigration};
use super::models::{
    BundleSnapshot, BundleStat, DailySnapshot, FirstSeen, GrowthPoint, VersionSnapshot,
};
use crate::error::StatsResult;
use crate::platforms::{Platform, VersionStat};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use std::collections::BTreeMap;
use std::path::Path;

/// Current UTC calendar date, the key of every snapshot written today.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Owns the single SQLite connection of a collection run.
pub struct SnapshotStore {
    conn: Connection,
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SnapshotStore {
    /// Open (or create) the database file and bring its schema up to date.
    pub fn open(path: &Path) -> StatsResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> StatsResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> StatsResult<Self> {
        let applied = migrations::run_migrations(&mut conn)?;
        if applied > 0 {
            tracing::debug!("schema upgraded by {applied} migration(s)");
        }
        Ok(Self { conn })
    }

    pub fn applied_migrations(&self) -> StatsResult<Vec<AppliedMigration>> {
        migrations::applied_migrations(&self.conn)
    }

    // ── Writes ──────────────────────────────────────────────────

    pub fn save_daily_snapshot(
        &mut self,
        platform: Platform,
        total_downloads: i64,
        followers: i64,
        versions_count: i64,
    ) -> StatsResult<()> {
        self.save_daily_snapshot_on(today(), platform, total_downloads, followers, versions_count)
    }

    /// Upsert keyed by `(date, platform)`; a second call on the same date wins.
    pub fn save_daily_snapshot_on(
        &mut self,
        date: NaiveDate,
        platform: Platform,
        total_downloads: i64,
        followers: i64,
        versions_count: i64,
    ) -> StatsResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO daily_snapshots
                 (date, platform, total_downloads, followers, versions_count, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, CURRENT_TIMESTAMP)
             ON CONFLICT (date, platform) DO UPDATE SET
                 total_downloads = excluded.total_downloads,
                 followers = excluded.followers,
                 versions_count = excluded.versions_count,
                 updated_at = CURRENT_TIMESTAMP",
            params![date, platform.as_str(), total_downloads, followers, versions_count],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn save_version_snapshots(
        &mut self,
        platform: Platform,
        versions: &[VersionStat],
    ) -> StatsResult<usize> {
        self.save_version_snapshots_on(today(), platform, versions)
    }

    /// Upsert keyed by `(date, platform, version_name)`. Only the download
    /// count of an existing row changes; publication metadata is kept.
    pub fn save_version_snapshots_on(
        &mut self,
        date: NaiveDate,
        platform: Platform,
        versions: &[VersionStat],
    ) -> StatsResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO version_snapshots
                     (date, platform, version_name, version_number, downloads, date_published, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, CURRENT_TIMESTAMP)
                 ON CONFLICT (date, platform, version_name) DO UPDATE SET
                     downloads = excluded.downloads,
                     updated_at = CURRENT_TIMESTAMP",
            )?;
            for v in versions {
                stmt.execute(params![
                    date,
                    platform.as_str(),
                    v.name,
                    v.version_number,
                    v.downloads,
                    v.date_published,
                ])?;
            }
        }
        tx.commit()?;
        Ok(versions.len())
    }

    pub fn save_bundle_snapshots(
        &mut self,
        platform: Platform,
        bundles: &[BundleStat],
    ) -> StatsResult<usize> {
        self.save_bundle_snapshots_on(today(), platform, bundles)
    }

    /// Upsert keyed by `(date, platform, slug)`. Any failing row rolls back the batch.
    pub fn save_bundle_snapshots_on(
        &mut self,
        date: NaiveDate,
        platform: Platform,
        bundles: &[BundleStat],
    ) -> StatsResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO bundle_snapshots
                     (date, platform, name, slug, downloads, followers, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, CURRENT_TIMESTAMP)
                 ON CONFLICT (date, platform, slug) DO UPDATE SET
                     name = excluded.name,
                     downloads = excluded.downloads,
                     followers = excluded.followers,
                     updated_at = CURRENT_TIMESTAMP",
            )?;
            for b in bundles {
                stmt.execute(params![
                    date,
                    platform.as_str(),
                    b.name,
                    b.slug,
                    b.downloads,
                    b.followers,
                ])?;
            }
        }
        tx.commit()?;
        Ok(bundles.len())
    }

    // ── Queries ─────────────────────────────────────────────────

    /// The `days` most recent daily snapshots, oldest first.
    pub fn get_history(&self, platform: Platform, days: u32) -> StatsResult<Vec<DailySnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, total_downloads, followers, versions_count FROM (
                 SELECT date, total_downloads, followers, versions_count
                 FROM daily_snapshots
                 WHERE platform = ?1
                 ORDER BY date DESC
                 LIMIT ?2
             ) ORDER BY date ASC",
        )?;
        let rows = stmt
            .query_map(params![platform.as_str(), days], |row| {
                Ok(DailySnapshot {
                    date: row.get(0)?,
                    platform,
                    total_downloads: row.get(1)?,
                    followers: row.get(2)?,
                    versions_count: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Day-over-day change in total downloads across the `days` most recent
    /// snapshots, oldest first. The oldest point's delta is its own total.
    pub fn get_growth(&self, platform: Platform, days: u32) -> StatsResult<Vec<GrowthPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT date,
                    total_downloads,
                    total_downloads - COALESCE(LAG(total_downloads) OVER (ORDER BY date), 0)
             FROM (
                 SELECT date, total_downloads
                 FROM daily_snapshots
                 WHERE platform = ?1
                 ORDER BY date DESC
                 LIMIT ?2
             )
             ORDER BY date ASC",
        )?;
        let rows = stmt
            .query_map(params![platform.as_str(), days], |row| {
                Ok(GrowthPoint {
                    date: row.get(0)?,
                    total: row.get(1)?,
                    daily_delta: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Earliest snapshot of every bundle on `platform`, keyed by slug.
    pub fn get_first_seen(&self, platform: Platform) -> StatsResult<BTreeMap<String, FirstSeen>> {
        let mut stmt = self.conn.prepare(
            "SELECT b.slug, b.downloads, b.date
             FROM bundle_snapshots b
             JOIN (
                 SELECT slug, MIN(date) AS first_date
                 FROM bundle_snapshots
                 WHERE platform = ?1
                 GROUP BY slug
             ) f ON b.slug = f.slug AND b.date = f.first_date
             WHERE b.platform = ?1",
        )?;
        let rows = stmt.query_map(params![platform.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                FirstSeen {
                    downloads: row.get(1)?,
                    date: row.get(2)?,
                },
            ))
        })?;

        let mut first_seen = BTreeMap::new();
        for row in rows {
            let (slug, seen) = row?;
            first_seen.insert(slug, seen);
        }
        Ok(first_seen)
    }

    /// Most recent `limit` version rows, optionally for one version, oldest first.
    pub fn get_version_history(
        &self,
        platform: Platform,
        version_name: Option<&str>,
        limit: u32,
    ) -> StatsResult<Vec<VersionSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, version_name, version_number, downloads, date_published FROM (
                 SELECT date, version_name, version_number, downloads, date_published
                 FROM version_snapshots
                 WHERE platform = ?1 AND (?2 IS NULL OR version_name = ?2)
                 ORDER BY date DESC, version_name
                 LIMIT ?3
             ) ORDER BY date ASC, version_name",
        )?;
        let rows = stmt
            .query_map(params![platform.as_str(), version_name, limit], |row| {
                version_row(row, platform)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Most recent `limit` bundle rows, optionally for one slug, oldest first.
    pub fn get_bundle_history(
        &self,
        platform: Platform,
        slug: Option<&str>,
        limit: u32,
    ) -> StatsResult<Vec<BundleSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, name, slug, downloads, followers FROM (
                 SELECT date, name, slug, downloads, followers
                 FROM bundle_snapshots
                 WHERE platform = ?1 AND (?2 IS NULL OR slug = ?2)
                 ORDER BY date DESC, slug
                 LIMIT ?3
             ) ORDER BY date ASC, slug",
        )?;
        let rows = stmt
            .query_map(params![platform.as_str(), slug, limit], |row| {
                bundle_row(row, platform)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Newest snapshot of each version, by version name.
    pub fn latest_versions(&self, platform: Platform) -> StatsResult<Vec<VersionSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, version_name, version_number, downloads, date_published FROM (
                 SELECT *, ROW_NUMBER() OVER (PARTITION BY version_name ORDER BY date DESC) AS rn
                 FROM version_snapshots
                 WHERE platform = ?1
             ) WHERE rn = 1
             ORDER BY version_name",
        )?;
        let rows = stmt
            .query_map(params![platform.as_str()], |row| version_row(row, platform))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Newest snapshot of each bundle, most downloaded first.
    pub fn latest_bundles(&self, platform: Platform) -> StatsResult<Vec<BundleSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, name, slug, downloads, followers FROM (
                 SELECT *, ROW_NUMBER() OVER (PARTITION BY slug ORDER BY date DESC) AS rn
                 FROM bundle_snapshots
                 WHERE platform = ?1
             ) WHERE rn = 1
             ORDER BY downloads DESC, slug",
        )?;
        let rows = stmt
            .query_map(params![platform.as_str()], |row| bundle_row(row, platform))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn version_row(row: &Row<'_>, platform: Platform) -> rusqlite::Result<VersionSnapshot> {
    Ok(VersionSnapshot {
        date: row.get(0)?,
        platform,
        version_name: row.get(1)?,
        version_number: row.get(2)?,
        downloads: row.get(3)?,
        date_published: row.get(4)?,
    })
}

fn bundle_row(row: &Row<'_>, platform: Platform) -> rusqlite::Result<BundleSnapshot> {
    Ok(BundleSnapshot {
        date: row.get(0)?,
        platform,
        name: row.get(1)?,
        slug: row.get(2)?,
        downloads: row.get(3)?,
        followers: row.get(4)?,
    })
}
