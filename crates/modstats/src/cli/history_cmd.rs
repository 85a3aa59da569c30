//! `modstats history` and `modstats growth`.

use crate::cli::output::{self, format_count};
use crate::config::Config;
use crate::platforms::Platform;
use crate::temporal::SnapshotStore;
use anyhow::{Context, Result};

fn open_store(config: &Config) -> Result<SnapshotStore> {
    let path = config.storage.database_path();
    SnapshotStore::open(&path).with_context(|| format!("failed to open {}", path.display()))
}

/// Print the most recent daily snapshots, oldest first.
pub async fn run_history(config: &Config, platform: Platform, days: u32) -> Result<()> {
    let store = open_store(config)?;
    let history = store.get_history(platform, days)?;

    if output::is_json() {
        output::print_json(&history);
        return Ok(());
    }
    if history.is_empty() {
        println!("  No snapshots recorded for {}.", platform.label());
        return Ok(());
    }

    println!("  {} history (last {} snapshots):\n", platform.label(), history.len());
    println!("    {:<12}{:>14}{:>11}{:>10}", "date", "downloads", "followers", "versions");
    for row in &history {
        println!(
            "    {:<12}{:>14}{:>11}{:>10}",
            row.date.to_string(),
            format_count(row.total_downloads),
            format_count(row.followers),
            row.versions_count
        );
    }
    Ok(())
}

/// Print day-over-day download growth.
pub async fn run_growth(config: &Config, platform: Platform, days: u32) -> Result<()> {
    let store = open_store(config)?;
    let growth = store.get_growth(platform, days)?;

    if output::is_json() {
        output::print_json(&growth);
        return Ok(());
    }
    if growth.is_empty() {
        println!("  No snapshots recorded for {}.", platform.label());
        return Ok(());
    }

    println!("  {} growth:\n", platform.label());
    for point in &growth {
        let sign = if point.daily_delta >= 0 { "+" } else { "" };
        println!(
            "    {}  {:>14}  {sign}{}",
            point.date,
            format_count(point.total),
            format_count(point.daily_delta)
        );
    }
    if let (Some(first), Some(last)) = (growth.first(), growth.last()) {
        if growth.len() > 1 {
            println!(
                "\n    {} over {} snapshots",
                format_count(last.total - first.total),
                growth.len()
            );
        }
    }
    Ok(())
}
