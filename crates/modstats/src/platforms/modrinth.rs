//! Modrinth read API client.

use super::{Platform, PlatformStats, StatsSource, VersionStat};
use crate::acquisition::HttpClient;
use crate::config::Config;
use crate::error::StatsResult;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ModrinthProject {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub followers: i64,
    #[serde(default)]
    pub downloads: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModrinthVersion {
    pub name: String,
    pub version_number: String,
    pub downloads: i64,
    pub date_published: Option<String>,
    #[serde(default)]
    pub game_versions: Vec<String>,
}

impl From<ModrinthVersion> for VersionStat {
    fn from(v: ModrinthVersion) -> Self {
        Self {
            name: v.name,
            version_number: v.version_number,
            downloads: v.downloads,
            date_published: v.date_published,
            game_versions: v.game_versions,
        }
    }
}

/// Thin wrapper around `GET /project/{slug}` and `GET /project/{slug}/version`.
#[derive(Debug, Clone)]
pub struct ModrinthClient {
    http: HttpClient,
    api_base: String,
    project_slug: String,
}

impl ModrinthClient {
    pub fn new(config: &Config) -> StatsResult<Self> {
        let http = HttpClient::api(
            &config.user_agent,
            Duration::from_secs(config.modrinth.timeout_secs),
            &[],
        )?;
        Ok(Self {
            http,
            api_base: config.modrinth.api_base.trim_end_matches('/').to_string(),
            project_slug: config.modrinth.project_slug.clone(),
        })
    }

    pub async fn project_info(&self) -> Option<ModrinthProject> {
        let url = format!("{}/project/{}", self.api_base, self.project_slug);
        match self.http.get_json(&url, &[]).await {
            Ok(project) => Some(project),
            Err(e) => {
                tracing::warn!("error fetching Modrinth project: {e}");
                None
            }
        }
    }

    pub async fn versions(&self) -> Option<Vec<ModrinthVersion>> {
        let url = format!("{}/project/{}/version", self.api_base, self.project_slug);
        match self.http.get_json(&url, &[]).await {
            Ok(versions) => Some(versions),
            Err(e) => {
                tracing::warn!("error fetching Modrinth versions: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl StatsSource for ModrinthClient {
    fn platform(&self) -> Platform {
        Platform::Modrinth
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn fetch_stats(&self) -> Option<PlatformStats> {
        let project = self.project_info().await?;
        let versions = self.versions().await?;

        // Total is the per-version sum, not the project-level counter.
        let total_downloads = versions.iter().map(|v| v.downloads).sum();

        Some(PlatformStats {
            platform: Platform::Modrinth,
            total_downloads,
            followers: project.followers,
            versions: versions.into_iter().map(VersionStat::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> Config {
        let mut config = Config::default();
        config.modrinth.api_base = server.uri();
        config.modrinth.project_slug = "createnuclear".to_string();
        config
    }

    #[tokio::test]
    async fn test_fetch_stats_sums_version_downloads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/project/createnuclear"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "AbCd1234",
                "slug": "createnuclear",
                "title": "Create Nuclear",
                "followers": 321,
                "downloads": 1000
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/project/createnuclear/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "1.1.0", "version_number": "1.1.0", "downloads": 700,
                 "date_published": "2024-05-01T10:00:00Z", "game_versions": ["1.20.1"]},
                {"name": "1.0.0", "version_number": "1.0.0", "downloads": 500,
                 "date_published": "2024-01-01T10:00:00Z", "game_versions": ["1.20.1"]}
            ])))
            .mount(&server)
            .await;

        let client = ModrinthClient::new(&config_for(&server)).unwrap();
        let stats = client.fetch_stats().await.unwrap();

        assert_eq!(stats.platform, Platform::Modrinth);
        assert_eq!(stats.total_downloads, 1200);
        assert_eq!(stats.followers, 321);
        assert_eq!(stats.versions_count(), 2);
        assert_eq!(stats.versions[0].game_versions, vec!["1.20.1".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_stats_none_when_versions_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/project/createnuclear"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "x", "slug": "createnuclear", "title": "t", "followers": 1
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/project/createnuclear/version"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ModrinthClient::new(&config_for(&server)).unwrap();
        assert!(client.fetch_stats().await.is_none());
    }
}
