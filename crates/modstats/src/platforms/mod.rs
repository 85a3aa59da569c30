//! Marketplace statistics sources.
//!
//! Both marketplaces expose the same capability: report aggregate downloads,
//! followers, and a per-version breakdown for the tracked project. They differ
//! only in authentication and payload shape, which stays inside each client.

pub mod curseforge;
pub mod modrinth;

pub use curseforge::CurseForgeClient;
pub use modrinth::ModrinthClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A marketplace the tracked package is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Modrinth,
    CurseForge,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Modrinth, Platform::CurseForge];

    /// Identifier stored in the `platform` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Modrinth => "modrinth",
            Platform::CurseForge => "curseforge",
        }
    }

    /// Human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            Platform::Modrinth => "Modrinth",
            Platform::CurseForge => "CurseForge",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "modrinth" => Ok(Platform::Modrinth),
            "curseforge" => Ok(Platform::CurseForge),
            other => Err(format!(
                "unknown platform '{other}' (expected modrinth or curseforge)"
            )),
        }
    }
}

/// Download count of one published version (Modrinth version or CurseForge file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionStat {
    pub name: String,
    pub version_number: String,
    pub downloads: i64,
    /// RFC 3339 timestamp as reported upstream.
    pub date_published: Option<String>,
    pub game_versions: Vec<String>,
}

/// Everything one collection run records for a platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformStats {
    pub platform: Platform,
    pub total_downloads: i64,
    pub followers: i64,
    pub versions: Vec<VersionStat>,
}

impl PlatformStats {
    pub fn versions_count(&self) -> i64 {
        self.versions.len() as i64
    }
}

/// Read-only statistics capability implemented by each marketplace client.
#[async_trait]
pub trait StatsSource: Send + Sync {
    fn platform(&self) -> Platform;

    /// Whether the source is configured well enough to be worth calling.
    fn is_available(&self) -> bool;

    /// Fetch current statistics; `None` when the upstream call failed.
    async fn fetch_stats(&self) -> Option<PlatformStats>;
}
