//! `modstats migrate`: bring the schema up to date, or just report it.

use crate::cli::output;
use crate::config::Config;
use crate::temporal::migrations;
use crate::temporal::SnapshotStore;
use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use serde_json::json;

pub async fn run(config: &Config, status_only: bool) -> Result<()> {
    let path = config.storage.database_path();

    if status_only {
        // A missing database reports every migration as pending without creating the file.
        let conn = if path.exists() {
            Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        } else {
            Connection::open_in_memory()
        }
        .with_context(|| format!("failed to open {}", path.display()))?;
        let status = migrations::status(&conn)?;

        if output::is_json() {
            let items: Vec<_> = status
                .iter()
                .map(|(m, applied)| {
                    json!({
                        "version": m.version,
                        "name": m.name,
                        "applied_at": applied.as_ref().map(|a| a.applied_at.clone()),
                    })
                })
                .collect();
            output::print_json(&json!({ "database": path, "migrations": items }));
        } else {
            println!("  Schema of {}:\n", path.display());
            for (m, applied) in &status {
                match applied {
                    Some(a) => println!("    [OK] {:>3} {:<22} {}", m.version, m.name, a.applied_at),
                    None => println!("    [..] {:>3} {:<22} pending", m.version, m.name),
                }
            }
        }
        return Ok(());
    }

    let store =
        SnapshotStore::open(&path).with_context(|| format!("failed to open {}", path.display()))?;
    let applied = store.applied_migrations()?;

    if output::is_json() {
        output::print_json(&json!({ "database": path, "migrations": applied }));
    } else {
        println!("  Schema of {} is up to date:\n", path.display());
        for m in &applied {
            println!("    [OK] {:>3} {:<22} {}", m.version, m.name, m.applied_at);
        }
    }
    Ok(())
}
