//! `modstats bundles`: latest bundle downloads with growth since first seen.

use crate::cli::output::{self, format_count};
use crate::config::Config;
use crate::platforms::Platform;
use crate::temporal::{BundleSnapshot, FirstSeen, SnapshotStore};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleRow {
    pub name: String,
    pub slug: String,
    pub downloads: i64,
    pub first_seen: Option<NaiveDate>,
    pub since_tracked: i64,
}

/// Join the latest snapshots with their baselines, filter by name, keep the top `top`.
///
/// `latest` is expected most-downloaded first, as the store returns it.
pub fn build_rows(
    latest: Vec<BundleSnapshot>,
    first_seen: &BTreeMap<String, FirstSeen>,
    filter: Option<&str>,
    top: Option<usize>,
) -> Vec<BundleRow> {
    let needle = filter.map(str::to_lowercase);
    let rows = latest
        .into_iter()
        .filter(|b| {
            needle
                .as_deref()
                .map_or(true, |n| b.name.to_lowercase().contains(n))
        })
        .map(|b| {
            let baseline = first_seen.get(&b.slug);
            BundleRow {
                first_seen: baseline.map(|f| f.date),
                since_tracked: baseline.map_or(0, |f| f.since_tracked(b.downloads)),
                name: b.name,
                slug: b.slug,
                downloads: b.downloads,
            }
        });

    match top {
        Some(n) => rows.take(n).collect(),
        None => rows.collect(),
    }
}

pub async fn run(
    config: &Config,
    platform: Platform,
    top: Option<usize>,
    filter: Option<&str>,
) -> Result<()> {
    let path = config.storage.database_path();
    let store =
        SnapshotStore::open(&path).with_context(|| format!("failed to open {}", path.display()))?;

    let latest = store.latest_bundles(platform)?;
    let first_seen = store.get_first_seen(platform)?;
    let rows = build_rows(latest, &first_seen, filter, top);

    if output::is_json() {
        output::print_json(&rows);
        return Ok(());
    }
    if rows.is_empty() {
        println!("  No bundles recorded for {}.", platform.label());
        return Ok(());
    }

    println!("  Dependent bundles on {}:\n", platform.label());
    println!("    {:<40}{:>14}{:>14}", "name", "downloads", "since tracked");
    for row in &rows {
        println!(
            "    {:<40}{:>14}{:>14}",
            truncate(&row.name, 38),
            format_count(row.downloads),
            format!("+{}", format_count(row.since_tracked))
        );
    }
    let total: i64 = rows.iter().map(|r| r.downloads).sum();
    println!("\n    {} bundles, {} downloads", rows.len(), format_count(total));
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
