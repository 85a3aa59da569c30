//! Configuration loading and resolution.
//!
//! A [`Config`] is built once at startup and handed to every component's
//! constructor. Resolution order, later wins:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config` flag or `MODSTATS_CONFIG`)
//! 3. Environment: `CURSEFORGE_API_KEY`, `MODSTATS_DATA_DIR`, `MODSTATS_DATABASE`

use crate::error::{StatsError, StatsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file.
pub const ENV_CONFIG_PATH: &str = "MODSTATS_CONFIG";
/// Environment variable holding the CurseForge API key.
pub const ENV_CURSEFORGE_API_KEY: &str = "CURSEFORGE_API_KEY";
/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "MODSTATS_DATA_DIR";
/// Environment variable overriding the SQLite database path.
pub const ENV_DATABASE: &str = "MODSTATS_DATABASE";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                                  AppleWebKit/537.36 (KHTML, like Gecko) \
                                  Chrome/120.0.0.0 Safari/537.36";

/// Top-level configuration value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// User agent sent to the marketplace APIs.
    pub user_agent: String,
    pub modrinth: ModrinthConfig,
    pub curseforge: CurseForgeConfig,
    pub discovery: DiscoveryConfig,
    pub enrichment: EnrichmentConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModrinthConfig {
    pub api_base: String,
    pub project_slug: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurseForgeConfig {
    pub api_base: String,
    /// Numeric id of the tracked mod.
    pub mod_id: i64,
    /// API key. `None` disables every key-gated call.
    pub api_key: Option<String>,
    /// Minecraft game id on CurseForge.
    pub game_id: i64,
    /// Content class id of modpacks, used to constrain slug searches.
    pub bundle_class_id: i64,
    pub timeout_secs: u64,
}

/// Dependents-page crawl settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    /// Page requested during the session warm-up.
    pub project_page_url: String,
    /// Paginated listing of dependents.
    pub dependents_url: String,
    /// Value of the `filter-related-dependents` query parameter (6 = modpacks).
    pub dependents_filter: String,
    pub max_pages: u32,
    pub page_delay_secs: u64,
    pub session_attempts: u32,
    pub session_retry_delay_secs: u64,
    pub session_settle_secs: u64,
    pub timeout_secs: u64,
    pub browser_user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Number of lookups between two pauses.
    pub batch_size: usize,
    pub batch_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Defaults to `<data_dir>/stats.db`.
    pub database_path: Option<PathBuf>,
    /// Defaults to `<data_dir>/curseforge_modpacks.csv`.
    pub bundles_csv_path: Option<PathBuf>,
    /// Defaults to `<data_dir>/curseforge_modpacks.json`.
    pub bundles_json_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: format!("modstats/{}", env!("CARGO_PKG_VERSION")),
            modrinth: ModrinthConfig::default(),
            curseforge: CurseForgeConfig::default(),
            discovery: DiscoveryConfig::default(),
            enrichment: EnrichmentConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for ModrinthConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.modrinth.com/v2".to_string(),
            project_slug: "createnuclear".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for CurseForgeConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.curseforge.com".to_string(),
            mod_id: 989_797,
            api_key: None,
            game_id: 432,
            bundle_class_id: 4471,
            timeout_secs: 10,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            project_page_url: "https://www.curseforge.com/minecraft/mc-mods/createnuclear"
                .to_string(),
            dependents_url:
                "https://www.curseforge.com/minecraft/mc-mods/createnuclear/relations/dependents"
                    .to_string(),
            dependents_filter: "6".to_string(),
            max_pages: 35,
            page_delay_secs: 2,
            session_attempts: 3,
            session_retry_delay_secs: 5,
            session_settle_secs: 2,
            timeout_secs: 30,
            browser_user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay_secs: 1,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_path: None,
            bundles_csv_path: None,
            bundles_json_path: None,
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file plus the process environment.
    ///
    /// An explicit `path` must exist; the `MODSTATS_CONFIG` fallback is
    /// ignored when it points nowhere.
    pub fn load(path: Option<&Path>) -> StatsResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match std::env::var(ENV_CONFIG_PATH) {
                Ok(p) if Path::new(&p).exists() => Self::from_file(Path::new(&p))?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> StatsResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
            .map_err(|e| StatsError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(raw: &str) -> StatsResult<Self> {
        toml::from_str(raw).map_err(|e| StatsError::Config(e.to_string()))
    }

    /// Apply environment overrides through `lookup` (injectable for tests).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_CURSEFORGE_API_KEY) {
            self.curseforge.api_key = Some(key);
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(db) = lookup(ENV_DATABASE) {
            self.storage.database_path = Some(PathBuf::from(db));
        }

        // An empty key is the same as no key.
        if self
            .curseforge
            .api_key
            .as_deref()
            .is_some_and(|k| k.trim().is_empty())
        {
            self.curseforge.api_key = None;
        }
    }
}

impl DiscoveryConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_secs(self.page_delay_secs)
    }

    pub fn session_retry_delay(&self) -> Duration {
        Duration::from_secs(self.session_retry_delay_secs)
    }

    pub fn session_settle(&self) -> Duration {
        Duration::from_secs(self.session_settle_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl EnrichmentConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.batch_delay_secs)
    }
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("stats.db"))
    }

    pub fn bundles_csv_path(&self) -> PathBuf {
        self.bundles_csv_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("curseforge_modpacks.csv"))
    }

    pub fn bundles_json_path(&self) -> PathBuf {
        self.bundles_json_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("curseforge_modpacks.json"))
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".modstats")
}
