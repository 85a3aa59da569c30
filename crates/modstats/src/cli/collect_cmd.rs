//! `modstats collect`: one full collection run.

use crate::cli::output;
use crate::collector::Collector;
use crate::config::Config;
use crate::pacing::{Pacer, SleepPacer};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Run every stage once and report. Returns the process exit code.
pub async fn run(config: &Config) -> Result<i32> {
    let pacer: Arc<dyn Pacer> = Arc::new(SleepPacer);
    let mut collector = Collector::from_config(config, pacer).with_context(|| {
        format!(
            "cannot start collection (database {})",
            config.storage.database_path().display()
        )
    })?;

    if !output::is_quiet() && !output::is_json() {
        println!("modstats collection");
        println!("===================");
    }

    let summary = collector.run().await;

    if output::is_json() {
        output::print_json(&summary);
    } else {
        println!("{summary}");
    }

    Ok(summary.exit_code())
}
