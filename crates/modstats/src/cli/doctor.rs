//! Environment readiness check.

use crate::bundles::BundleCatalog;
use crate::cli::output;
use crate::config::Config;
use crate::temporal::SnapshotStore;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Ok,
    Warn,
    Fail,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Ok => "[OK]",
            Level::Warn => "[!!]",
            Level::Fail => "[XX]",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub level: Level,
    pub detail: String,
}

fn check(name: &'static str, level: Level, detail: impl Into<String>) -> Check {
    Check {
        name,
        level,
        detail: detail.into(),
    }
}

/// Run every check against `config`. Only a failing database blocks collection.
pub fn run_checks(config: &Config, config_path: Option<&Path>) -> Vec<Check> {
    let mut checks = Vec::new();

    checks.push(match config_path {
        Some(p) => check("config", Level::Ok, format!("loaded {}", p.display())),
        None => check("config", Level::Ok, "built-in defaults"),
    });

    let data_dir = &config.storage.data_dir;
    checks.push(match std::fs::create_dir_all(data_dir) {
        Ok(()) => check("data_dir", Level::Ok, data_dir.display().to_string()),
        Err(e) => check("data_dir", Level::Fail, format!("{}: {e}", data_dir.display())),
    });

    let db_path = config.storage.database_path();
    checks.push(match SnapshotStore::open(&db_path) {
        Ok(store) => {
            let applied = store.applied_migrations().map(|m| m.len()).unwrap_or(0);
            check(
                "database",
                Level::Ok,
                format!("{} ({applied} migrations)", db_path.display()),
            )
        }
        Err(e) => check("database", Level::Fail, format!("{}: {e}", db_path.display())),
    });

    checks.push(if config.curseforge.api_key.is_some() {
        check("curseforge_key", Level::Ok, "API key set")
    } else {
        check(
            "curseforge_key",
            Level::Warn,
            "CURSEFORGE_API_KEY not set; CurseForge stats and bundle enrichment are skipped",
        )
    });

    let discovery = &config.discovery;
    checks.push(if !discovery.enabled {
        check("discovery", Level::Warn, "disabled; only known bundles are refreshed")
    } else {
        match (
            Url::parse(&discovery.project_page_url),
            Url::parse(&discovery.dependents_url),
        ) {
            (Ok(_), Ok(_)) => check(
                "discovery",
                Level::Ok,
                format!("up to {} pages", discovery.max_pages),
            ),
            (Err(e), _) | (_, Err(e)) => check("discovery", Level::Fail, format!("bad URL: {e}")),
        }
    });

    let mut catalog = BundleCatalog::new(
        config.storage.bundles_csv_path(),
        config.storage.bundles_json_path(),
    );
    let known = catalog.load().len();
    checks.push(if known > 0 {
        check("bundles", Level::Ok, format!("{known} known bundles"))
    } else {
        check(
            "bundles",
            Level::Warn,
            format!("no bundle list at {}", catalog.csv_path().display()),
        )
    });

    checks
}

pub fn is_ready(checks: &[Check]) -> bool {
    checks.iter().all(|c| c.level != Level::Fail)
}

pub async fn run(config: &Config, config_path: Option<&Path>) -> Result<()> {
    let checks = run_checks(config, config_path);
    let ready = is_ready(&checks);

    if output::is_json() {
        output::print_json(&serde_json::json!({ "ready": ready, "checks": checks }));
        return Ok(());
    }

    println!("modstats doctor");
    println!("===============");
    println!();
    for c in &checks {
        println!("{} {:<15} {}", c.level.tag(), c.name, c.detail);
    }
    println!();
    println!("Status: {}", if ready { "READY" } else { "NOT READY" });
    Ok(())
}
