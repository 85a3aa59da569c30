//! CurseForge read API client (key-gated).
//!
//! Every call needs an `x-api-key`. Without one the client reports itself
//! unavailable and never touches the network.

use super::{Platform, PlatformStats, StatsSource, VersionStat};
use crate::acquisition::HttpClient;
use crate::config::{Config, CurseForgeConfig};
use crate::enrichment::{BundleLookup, ResolvedEntity};
use crate::error::{StatsError, StatsResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Largest page the files endpoint serves.
const FILES_PAGE_SIZE: usize = 50;

/// Every CurseForge payload is wrapped in `{"data": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    #[serde(default)]
    total_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurseForgeMod {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub download_count: f64,
    #[serde(default)]
    pub thumbs_up_count: i64,
    #[serde(default)]
    pub links: CurseForgeLinks,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurseForgeLinks {
    #[serde(default)]
    pub website_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurseForgeFile {
    pub display_name: String,
    pub file_name: String,
    #[serde(default)]
    pub download_count: f64,
    pub file_date: Option<String>,
    #[serde(default)]
    pub game_versions: Vec<String>,
}

impl From<CurseForgeMod> for ResolvedEntity {
    fn from(m: CurseForgeMod) -> Self {
        Self {
            id: m.id,
            name: m.name,
            slug: m.slug,
            downloads: m.download_count.round() as i64,
            link: m.links.website_url,
        }
    }
}

impl From<CurseForgeFile> for VersionStat {
    fn from(f: CurseForgeFile) -> Self {
        Self {
            name: f.display_name,
            version_number: f.file_name,
            downloads: f.download_count.round() as i64,
            date_published: f.file_date,
            game_versions: f.game_versions,
        }
    }
}

/// Thin wrapper around the CurseForge `/v1/mods` endpoints.
#[derive(Debug, Clone)]
pub struct CurseForgeClient {
    http: HttpClient,
    config: CurseForgeConfig,
}

impl CurseForgeClient {
    pub fn new(config: &Config) -> StatsResult<Self> {
        let cf = config.curseforge.clone();
        let headers: Vec<(&'static str, String)> = cf
            .api_key
            .iter()
            .map(|key| ("x-api-key", key.clone()))
            .collect();
        let http = HttpClient::api(
            &config.user_agent,
            Duration::from_secs(cf.timeout_secs),
            &headers,
        )?;
        Ok(Self { http, config: cf })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.config.api_base.trim_end_matches('/'))
    }

    fn ensure_available(&self) -> StatsResult<()> {
        if self.config.api_key.is_some() {
            Ok(())
        } else {
            Err(StatsError::Unavailable("CURSEFORGE_API_KEY not set".to_string()))
        }
    }

    /// `GET /v1/mods/{id}` for the tracked mod.
    pub async fn mod_info(&self) -> Option<CurseForgeMod> {
        match self.fetch_mod(self.config.mod_id).await {
            Ok(Some(m)) => Some(m),
            Ok(None) => {
                tracing::warn!("CurseForge mod {} not found", self.config.mod_id);
                None
            }
            Err(e) => {
                tracing::warn!("error fetching CurseForge mod: {e}");
                None
            }
        }
    }

    /// `GET /v1/mods/{id}/files`, following pagination to the end.
    pub async fn files(&self) -> Option<Vec<CurseForgeFile>> {
        match self.fetch_all_files().await {
            Ok(files) => Some(files),
            Err(e) => {
                tracing::warn!("error fetching CurseForge files: {e}");
                None
            }
        }
    }

    async fn fetch_mod(&self, id: i64) -> StatsResult<Option<CurseForgeMod>> {
        self.ensure_available()?;
        let url = self.api_url(&format!("mods/{id}"));
        let resp = self.http.get(&url, &[]).await?;
        if resp.is_not_found() {
            return Ok(None);
        }
        if !resp.is_success() {
            return Err(StatsError::UnexpectedStatus {
                status: resp.status,
                url: resp.final_url,
            });
        }
        let envelope: Envelope<CurseForgeMod> = serde_json::from_str(&resp.body)?;
        Ok(Some(envelope.data))
    }

    async fn fetch_all_files(&self) -> StatsResult<Vec<CurseForgeFile>> {
        self.ensure_available()?;
        let url = self.api_url(&format!("mods/{}/files", self.config.mod_id));
        let mut files: Vec<CurseForgeFile> = Vec::new();

        loop {
            let query = [
                ("index", files.len().to_string()),
                ("pageSize", FILES_PAGE_SIZE.to_string()),
            ];
            let page: Envelope<Vec<CurseForgeFile>> = self.http.get_json(&url, &query).await?;
            let fetched = page.data.len();
            files.extend(page.data);

            let total = page.pagination.map(|p| p.total_count).unwrap_or(0);
            if fetched == 0 || files.len() >= total {
                break;
            }
        }

        Ok(files)
    }
}

#[async_trait]
impl StatsSource for CurseForgeClient {
    fn platform(&self) -> Platform {
        Platform::CurseForge
    }

    fn is_available(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn fetch_stats(&self) -> Option<PlatformStats> {
        if !StatsSource::is_available(self) {
            return None;
        }

        let info = self.mod_info().await?;
        let files = self.files().await?;

        let total_downloads = files
            .iter()
            .map(|f| f.download_count.round() as i64)
            .sum();

        Some(PlatformStats {
            platform: Platform::CurseForge,
            total_downloads,
            followers: info.thumbs_up_count,
            versions: files.into_iter().map(VersionStat::from).collect(),
        })
    }
}

#[async_trait]
impl BundleLookup for CurseForgeClient {
    fn is_available(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn get_by_id(&self, id: i64) -> StatsResult<Option<ResolvedEntity>> {
        Ok(self.fetch_mod(id).await?.map(ResolvedEntity::from))
    }

    async fn search_by_slug(&self, slug: &str) -> StatsResult<Option<ResolvedEntity>> {
        self.ensure_available()?;
        let url = self.api_url("mods/search");
        let query = [
            ("gameId", self.config.game_id.to_string()),
            ("classId", self.config.bundle_class_id.to_string()),
            ("slug", slug.to_string()),
            ("pageSize", "1".to_string()),
        ];
        let found: Envelope<Vec<CurseForgeMod>> = self.http.get_json(&url, &query).await?;
        Ok(found.data.into_iter().next().map(ResolvedEntity::from))
    }
}
