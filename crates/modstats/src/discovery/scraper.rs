//! Paginated crawl of the dependents listing behind an anti-bot challenge.
//!
//! The scraper owns a browser-like [`HttpClient`] whose cookie jar carries
//! the clearance obtained during [`DependentsScraper::establish_session`].
//! Nothing outside this type can read or modify that jar.

use super::links::{extract_candidates, is_challenge_page};
use super::Candidate;
use crate::acquisition::HttpClient;
use crate::config::DiscoveryConfig;
use crate::pacing::{Pacer, PauseReason};
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

pub struct DependentsScraper {
    /// `None` when discovery is disabled or the client could not be built.
    http: Option<HttpClient>,
    base_url: Option<Url>,
    config: DiscoveryConfig,
    pacer: Arc<dyn Pacer>,
}

impl DependentsScraper {
    pub fn new(config: &DiscoveryConfig, pacer: Arc<dyn Pacer>) -> Self {
        let base_url = match Url::parse(&config.dependents_url) {
            Ok(u) => Some(u),
            Err(e) => {
                tracing::warn!("invalid dependents URL '{}': {e}", config.dependents_url);
                None
            }
        };

        let http = if config.enabled {
            match HttpClient::browser(&config.browser_user_agent, config.timeout()) {
                Ok(c) => Some(c),
                Err(e) => {
                    tracing::warn!("scraper HTTP client unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        Self {
            http,
            base_url,
            config: config.clone(),
            pacer,
        }
    }

    pub fn is_available(&self) -> bool {
        self.http.is_some() && self.base_url.is_some()
    }

    /// Warm up against the project page so the challenge cookie is set.
    ///
    /// Returns `false` once every attempt was rejected or challenged.
    pub async fn establish_session(&self) -> bool {
        let Some(http) = &self.http else {
            return false;
        };

        let attempts = self.config.session_attempts.max(1);
        for attempt in 1..=attempts {
            tracing::info!("connecting to CurseForge (attempt {attempt}/{attempts})");

            match http.get(&self.config.project_page_url, &[]).await {
                Ok(resp) if resp.is_success() && !is_challenge_page(&resp.body) => {
                    self.pacer
                        .pause(PauseReason::SessionSettle, self.config.session_settle())
                        .await;
                    return true;
                }
                Ok(resp) if is_challenge_page(&resp.body) => {
                    tracing::warn!("challenge page served during warm-up (status {})", resp.status);
                }
                Ok(resp) => tracing::warn!("warm-up failed with status {}", resp.status),
                Err(e) => tracing::warn!("error establishing session: {e}"),
            }

            if attempt < attempts {
                self.pacer
                    .pause(PauseReason::SessionRetry, self.config.session_retry_delay())
                    .await;
            }
        }

        false
    }

    /// Fetch one listing page.
    ///
    /// `None` signals "stop": the page does not exist or a challenge was served.
    /// Transport errors and other bad statuses yield an empty page.
    pub async fn scrape_page(&self, page_number: u32) -> Option<Vec<Candidate>> {
        let (Some(http), Some(base_url)) = (&self.http, &self.base_url) else {
            return None;
        };

        let mut query = vec![(
            "filter-related-dependents",
            self.config.dependents_filter.clone(),
        )];
        if page_number > 1 {
            query.push(("page", page_number.to_string()));
        }

        let resp = match http.get(base_url.as_str(), &query).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("error on page {page_number}: {e}");
                return Some(Vec::new());
            }
        };

        if resp.is_not_found() {
            return None;
        }
        if is_challenge_page(&resp.body) {
            tracing::warn!("blocked by anti-bot challenge on page {page_number}");
            return None;
        }
        if !resp.is_success() {
            tracing::warn!("page {page_number} returned status {}", resp.status);
            return Some(Vec::new());
        }

        Some(extract_candidates(&resp.body, base_url))
    }

    /// Establish a session, then crawl pages until exhaustion or the page cap.
    ///
    /// Candidates are deduplicated by slug across pages, first sighting wins.
    pub async fn scrape_all(&self) -> Vec<Candidate> {
        if !self.is_available() {
            tracing::warn!("dependents scraper not available");
            return Vec::new();
        }
        if !self.establish_session().await {
            tracing::warn!("failed to establish a scraping session");
            return Vec::new();
        }

        let mut all: Vec<Candidate> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let max_pages = self.config.max_pages;

        tracing::info!("scraping up to {max_pages} pages");

        for page in 1..=max_pages {
            let Some(candidates) = self.scrape_page(page).await else {
                tracing::info!("page {page}: end of pages");
                break;
            };
            if candidates.is_empty() {
                tracing::info!("page {page}: empty, stopping");
                break;
            }

            let mut new_count = 0;
            for c in candidates {
                if seen.insert(c.slug.clone()) {
                    all.push(c);
                    new_count += 1;
                }
            }
            tracing::info!("page {page}: {new_count} new (total {})", all.len());

            if page < max_pages {
                self.pacer
                    .pause(PauseReason::PageFetch, self.config.page_delay())
                    .await;
            }
        }

        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::RecordingPacer;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROJECT: &str = "/minecraft/mc-mods/createnuclear";
    const DEPENDENTS: &str = "/minecraft/mc-mods/createnuclear/relations/dependents";

    fn config_for(server: &MockServer, max_pages: u32) -> DiscoveryConfig {
        DiscoveryConfig {
            project_page_url: format!("{}{PROJECT}", server.uri()),
            dependents_url: format!("{}{DEPENDENTS}", server.uri()),
            max_pages,
            timeout_secs: 5,
            ..DiscoveryConfig::default()
        }
    }

    fn page(slugs: &[&str]) -> String {
        let links: String = slugs
            .iter()
            .map(|s| format!(r#"<a href="/minecraft/modpacks/{s}">{s} pack</a>"#))
            .collect();
        format!("<html><body>{links}</body></html>")
    }

    async fn mount_project_page(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(PROJECT))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_disabled_scraper_is_unavailable() {
        let config = DiscoveryConfig {
            enabled: false,
            ..DiscoveryConfig::default()
        };
        let scraper = DependentsScraper::new(&config, Arc::new(RecordingPacer::new()));
        assert!(!scraper.is_available());
        assert!(scraper.scrape_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_session_fails_after_all_attempts_challenged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROJECT))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_string("<title>Just a moment...</title> cloudflare"),
            )
            .expect(3)
            .mount(&server)
            .await;

        let pacer = Arc::new(RecordingPacer::new());
        let scraper = DependentsScraper::new(&config_for(&server, 5), pacer.clone());

        assert!(!scraper.establish_session().await);
        assert_eq!(pacer.count(PauseReason::SessionRetry), 2);
        assert_eq!(pacer.count(PauseReason::SessionSettle), 0);
    }

    #[tokio::test]
    async fn test_session_recovers_after_one_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROJECT))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .up_to_n_times(1)
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PROJECT))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let pacer = Arc::new(RecordingPacer::new());
        let scraper = DependentsScraper::new(&config_for(&server, 5), pacer.clone());

        assert!(scraper.establish_session().await);
        assert_eq!(pacer.count(PauseReason::SessionRetry), 1);
        assert_eq!(pacer.count(PauseReason::SessionSettle), 1);
    }

    #[tokio::test]
    async fn test_challenge_with_200_is_not_a_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROJECT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Checking your browser before accessing - Cloudflare"),
            )
            .mount(&server)
            .await;

        let scraper =
            DependentsScraper::new(&config_for(&server, 5), Arc::new(RecordingPacer::new()));
        assert!(!scraper.establish_session().await);
        assert!(scraper.scrape_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_scrape_page_signals() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DEPENDENTS))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(DEPENDENTS))
            .and(query_param("page", "3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("cloudflare: checking your browser"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(DEPENDENTS))
            .and(query_param("page", "4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(DEPENDENTS))
            .and(query_param("page", "5"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let scraper =
            DependentsScraper::new(&config_for(&server, 10), Arc::new(RecordingPacer::new()));

        assert_eq!(scraper.scrape_page(2).await, Some(Vec::new()));
        assert_eq!(scraper.scrape_page(3).await, None);
        assert_eq!(scraper.scrape_page(4).await, None);
        assert_eq!(scraper.scrape_page(5).await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_first_page_omits_page_param() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(DEPENDENTS))
            .and(query_param("filter-related-dependents", "6"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(&["a", "b", "a"])))
            .mount(&server)
            .await;

        let scraper =
            DependentsScraper::new(&config_for(&server, 10), Arc::new(RecordingPacer::new()));
        let found = scraper.scrape_page(1).await.unwrap();
        assert_eq!(found.len(), 2);

        let requests = server.received_requests().await.unwrap_or_default();
        assert!(requests.iter().all(|r| !r.url.query().unwrap_or("").contains("page=")));
    }

    #[tokio::test]
    async fn test_scrape_all_never_exceeds_page_cap() {
        let server = MockServer::start().await;
        mount_project_page(&server).await;
        // Every page answers with a fresh slug; only the cap stops the crawl.
        for n in 2..=5 {
            Mock::given(method("GET"))
                .and(path(DEPENDENTS))
                .and(query_param("page", n.to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_string(page(&[&format!("p{n}")])))
                .with_priority(1)
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path(DEPENDENTS))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(&["p1"])))
            .mount(&server)
            .await;

        let pacer = Arc::new(RecordingPacer::new());
        let scraper = DependentsScraper::new(&config_for(&server, 3), pacer.clone());
        let found = scraper.scrape_all().await;

        let slugs: Vec<&str> = found.iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(slugs, vec!["p1", "p2", "p3"]);
        // No pause after the last allowed page.
        assert_eq!(pacer.count(PauseReason::PageFetch), 2);
        assert_eq!(pacer.count(PauseReason::SessionSettle), 1);
    }

    #[tokio::test]
    async fn test_scrape_all_stops_on_empty_page() {
        let server = MockServer::start().await;
        mount_project_page(&server).await;
        Mock::given(method("GET"))
            .and(path(DEPENDENTS))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(&[])))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(DEPENDENTS))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(&["only"])))
            .mount(&server)
            .await;

        let pacer = Arc::new(RecordingPacer::new());
        let scraper = DependentsScraper::new(&config_for(&server, 35), pacer.clone());
        let found = scraper.scrape_all().await;

        assert_eq!(found.len(), 1);
        assert_eq!(pacer.count(PauseReason::PageFetch), 1);
    }
}
