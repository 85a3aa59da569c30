// Copyright 2026 ModStats Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use modstats::cli;
use modstats::config::Config;
use modstats::platforms::Platform;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "modstats",
    about = "Download statistics for a mod and the modpacks that embed it",
    version,
    after_help = "Run 'modstats <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// TOML config file (defaults to $MODSTATS_CONFIG when set)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory holding the database and bundle exports
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect today's statistics from every source
    Collect {
        /// Skip the dependents-page crawl; refresh known bundles only
        #[arg(long)]
        no_discovery: bool,
    },
    /// Show recorded daily totals for a platform
    History {
        /// modrinth or curseforge
        platform: Platform,
        /// Number of most recent snapshots
        #[arg(long, default_value = "30")]
        days: u32,
    },
    /// Show day-over-day download growth for a platform
    Growth {
        /// modrinth or curseforge
        platform: Platform,
        /// Number of most recent snapshots
        #[arg(long, default_value = "7")]
        days: u32,
    },
    /// List dependent bundles with downloads gained since first seen
    Bundles {
        #[arg(long, default_value = "curseforge")]
        platform: Platform,
        /// Only show the N most downloaded bundles
        #[arg(long)]
        top: Option<usize>,
        /// Case-insensitive name filter
        #[arg(long)]
        filter: Option<String>,
    },
    /// Apply pending schema migrations
    Migrate {
        /// Only report applied and pending migrations
        #[arg(long)]
        status: bool,
    },
    /// Check configuration and environment
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.clone();
    }
    Ok(config)
}

async fn dispatch(cli: Cli) -> Result<i32> {
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "modstats", &mut std::io::stdout());
        return Ok(0);
    }

    let mut config = load_config(&cli)?;
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os(modstats::config::ENV_CONFIG_PATH).map(PathBuf::from))
        .filter(|p| p.exists());

    match cli.command {
        Commands::Collect { no_discovery } => {
            if no_discovery {
                config.discovery.enabled = false;
            }
            cli::collect_cmd::run(&config).await
        }
        Commands::History { platform, days } => {
            cli::history_cmd::run_history(&config, platform, days).await?;
            Ok(0)
        }
        Commands::Growth { platform, days } => {
            cli::history_cmd::run_growth(&config, platform, days).await?;
            Ok(0)
        }
        Commands::Bundles {
            platform,
            top,
            filter,
        } => {
            cli::bundles_cmd::run(&config, platform, top, filter.as_deref()).await?;
            Ok(0)
        }
        Commands::Migrate { status } => {
            cli::migrate_cmd::run(&config, status).await?;
            Ok(0)
        }
        Commands::Doctor => {
            cli::doctor::run(&config, config_path.as_deref()).await?;
            Ok(0)
        }
        Commands::Completions { .. } => Ok(0),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    cli::output::init(cli.json, cli.quiet);

    // Consistent exit codes: 0=success, 1=error
    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            if cli::output::is_json() {
                cli::output::print_json(&serde_json::json!({
                    "error": true,
                    "message": format!("{e:#}"),
                }));
            } else {
                eprintln!("  Error: {e:#}");
            }
            1
        }
    };
    std::process::exit(code);
}
