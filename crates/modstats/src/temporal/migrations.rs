//! Ordered schema migrations, recorded in `schema_migrations`.

use crate::error::StatsResult;
use rusqlite::{params, Connection};
use serde::Serialize;

/// One schema step. Versions are applied in ascending order, each exactly once.
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

/// A migration already recorded in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
    pub applied_at: String,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "snapshot_tables",
        sql: "
        CREATE TABLE IF NOT EXISTS daily_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            platform TEXT NOT NULL,
            total_downloads INTEGER NOT NULL,
            followers INTEGER NOT NULL DEFAULT 0,
            versions_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (date, platform)
        );

        CREATE TABLE IF NOT EXISTS version_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            platform TEXT NOT NULL,
            version_name TEXT NOT NULL,
            version_number TEXT NOT NULL DEFAULT '',
            downloads INTEGER NOT NULL,
            date_published TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (date, platform, version_name)
        );

        CREATE TABLE IF NOT EXISTS bundle_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            platform TEXT NOT NULL,
            name TEXT NOT NULL,
            slug TEXT NOT NULL,
            downloads INTEGER NOT NULL,
            followers INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (date, platform, slug)
        );

        CREATE INDEX IF NOT EXISTS idx_daily_snapshots_date ON daily_snapshots (date DESC);
        CREATE INDEX IF NOT EXISTS idx_version_snapshots_date ON version_snapshots (date DESC, platform);
        CREATE INDEX IF NOT EXISTS idx_bundle_snapshots_date ON bundle_snapshots (date DESC, platform);
        ",
    },
    Migration {
        version: 2,
        name: "updated_at_columns",
        sql: "
        ALTER TABLE daily_snapshots ADD COLUMN updated_at TEXT;
        ALTER TABLE version_snapshots ADD COLUMN updated_at TEXT;
        ALTER TABLE bundle_snapshots ADD COLUMN updated_at TEXT;
        ",
    },
    Migration {
        version: 3,
        name: "lookup_indexes",
        sql: "
        CREATE INDEX IF NOT EXISTS idx_daily_snapshots_platform
            ON daily_snapshots (platform, date DESC);
        CREATE INDEX IF NOT EXISTS idx_version_snapshots_lookup
            ON version_snapshots (platform, version_name, date DESC);
        CREATE INDEX IF NOT EXISTS idx_bundle_snapshots_lookup
            ON bundle_snapshots (platform, slug, date DESC);
        ",
    },
];

/// Apply every pending migration, each in its own transaction.
///
/// Returns the number of migrations applied by this call.
pub fn run_migrations(conn: &mut Connection) -> StatsResult<usize> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );",
    )?;

    let current: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;
        tracing::info!("applied migration {} ({})", migration.version, migration.name);
        applied += 1;
    }
    Ok(applied)
}

pub fn applied_migrations(conn: &Connection) -> StatsResult<Vec<AppliedMigration>> {
    let mut stmt =
        conn.prepare("SELECT version, name, applied_at FROM schema_migrations ORDER BY version")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(AppliedMigration {
                version: row.get(0)?,
                name: row.get(1)?,
                applied_at: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every known migration with its applied record, if any. Never writes.
pub fn status(conn: &Connection) -> StatsResult<Vec<(&'static Migration, Option<AppliedMigration>)>> {
    let tracked: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
        [],
        |row| row.get(0),
    )?;
    let mut applied = if tracked > 0 {
        applied_migrations(conn)?
    } else {
        Vec::new()
    };

    Ok(MIGRATIONS
        .iter()
        .map(|m| {
            let record = applied
                .iter()
                .position(|a| a.version == m.version)
                .map(|i| applied.swap_remove(i));
            (m, record)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_apply_once_in_order() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_migrations(&mut conn).unwrap(), MIGRATIONS.len());
        assert_eq!(run_migrations(&mut conn).unwrap(), 0);

        let versions: Vec<i64> = applied_migrations(&conn)
            .unwrap()
            .iter()
            .map(|m| m.version)
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn test_status_on_fresh_and_migrated_databases() {
        let mut conn = Connection::open_in_memory().unwrap();
        let fresh = status(&conn).unwrap();
        assert_eq!(fresh.len(), MIGRATIONS.len());
        assert!(fresh.iter().all(|(_, applied)| applied.is_none()));

        run_migrations(&mut conn).unwrap();
        assert!(status(&conn).unwrap().iter().all(|(_, applied)| applied.is_some()));
    }

    #[test]
    fn test_versions_are_strictly_increasing() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
    }

    #[test]
    fn test_lookup_indexes_exist() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 6);
    }
}
