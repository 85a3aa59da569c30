//! One collection run: platform totals, then the dependent-bundle refresh.
//!
//! Stages run strictly in sequence and each reports its own success flag.
//! A failing stage is logged and recorded in the [`RunSummary`]; it never
//! aborts the stages after it. Only opening the store is fatal.

use crate::bundles::{merge, BundleCatalog, BundleRecord, CatalogStats};
use crate::config::Config;
use crate::discovery::DependentsScraper;
use crate::enrichment::Resolver;
use crate::error::StatsResult;
use crate::pacing::Pacer;
use crate::platforms::{CurseForgeClient, ModrinthClient, Platform, StatsSource};
use crate::temporal::{BundleStat, SnapshotStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Bundles are enriched and stored under this marketplace.
const BUNDLE_PLATFORM: Platform = Platform::CurseForge;

/// Outcome of collecting one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformOutcome {
    pub platform: Platform,
    pub ok: bool,
}

/// What a run did, stage by stage.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub platforms: Vec<PlatformOutcome>,
    pub bundles_ok: bool,
    /// Catalog figures after a successful bundle refresh.
    pub catalog: Option<CatalogStats>,
}

impl RunSummary {
    /// A run succeeds when at least one platform was collected.
    pub fn succeeded(&self) -> bool {
        self.platforms.iter().any(|p| p.ok)
    }

    pub fn exit_code(&self) -> i32 {
        if self.succeeded() {
            0
        } else {
            1
        }
    }
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗"
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary:")?;
        for outcome in &self.platforms {
            let label = format!("{}:", outcome.platform.label());
            writeln!(f, "  {label:<12}{}", mark(outcome.ok))?;
        }
        writeln!(f, "  {:<12}{}", "Bundles:", mark(self.bundles_ok))?;
        if let Some(stats) = &self.catalog {
            writeln!(
                f,
                "  {} bundles, {} with ids, {} total downloads",
                stats.total, stats.with_ids, stats.total_downloads
            )?;
        }
        write!(
            f,
            "Completed in {}s",
            (self.finished_at - self.started_at).num_seconds()
        )
    }
}

/// Owns every collaborator of a run.
pub struct Collector {
    store: SnapshotStore,
    sources: Vec<Arc<dyn StatsSource>>,
    scraper: DependentsScraper,
    resolver: Resolver,
    catalog: BundleCatalog,
}

impl Collector {
    pub fn new(
        store: SnapshotStore,
        sources: Vec<Arc<dyn StatsSource>>,
        scraper: DependentsScraper,
        resolver: Resolver,
        catalog: BundleCatalog,
    ) -> Self {
        Self {
            store,
            sources,
            scraper,
            resolver,
            catalog,
        }
    }

    /// Open the store and build the marketplace clients from `config`.
    ///
    /// Fails only if the database cannot be opened or an HTTP client cannot be built.
    pub fn from_config(config: &Config, pacer: Arc<dyn Pacer>) -> StatsResult<Self> {
        let db_path = config.storage.database_path();
        let store = SnapshotStore::open(&db_path)?;
        tracing::info!("connected to {}", db_path.display());

        let modrinth: Arc<dyn StatsSource> = Arc::new(ModrinthClient::new(config)?);
        let curseforge = Arc::new(CurseForgeClient::new(config)?);

        let scraper = DependentsScraper::new(&config.discovery, pacer.clone());
        let resolver = Resolver::new(curseforge.clone(), pacer, &config.enrichment);
        let curseforge: Arc<dyn StatsSource> = curseforge;
        let catalog = BundleCatalog::new(
            config.storage.bundles_csv_path(),
            config.storage.bundles_json_path(),
        );

        let sources: Vec<Arc<dyn StatsSource>> = vec![modrinth, curseforge];
        Ok(Self::new(
            store,
            sources,
            scraper,
            resolver,
            catalog,
        ))
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn catalog(&self) -> &BundleCatalog {
        &self.catalog
    }

    pub async fn run(&mut self) -> RunSummary {
        let started_at = Utc::now();
        tracing::info!("collection started");

        let mut platforms = Vec::with_capacity(self.sources.len());
        for source in self.sources.clone() {
            let ok = self.collect_platform(source.as_ref()).await;
            platforms.push(PlatformOutcome {
                platform: source.platform(),
                ok,
            });
        }

        let bundles_ok = self.update_bundles().await;
        let catalog = bundles_ok.then(|| self.catalog.stats());

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            platforms,
            bundles_ok,
            catalog,
        };
        tracing::info!(
            "collection finished: {}",
            if summary.succeeded() { "ok" } else { "failed" }
        );
        summary
    }

    /// Fetch one platform and persist its daily and per-version snapshots.
    pub async fn collect_platform(&mut self, source: &dyn StatsSource) -> bool {
        let platform = source.platform();
        tracing::info!("collecting {} stats", platform.label());

        if !source.is_available() {
            tracing::warn!("{} is not configured; skipping", platform.label());
            return false;
        }

        let Some(stats) = source.fetch_stats().await else {
            tracing::warn!("failed to fetch {} stats", platform.label());
            return false;
        };

        let saved = self
            .store
            .save_daily_snapshot(
                platform,
                stats.total_downloads,
                stats.followers,
                stats.versions_count(),
            )
            .and_then(|()| self.store.save_version_snapshots(platform, &stats.versions));

        match saved {
            Ok(_) => {
                tracing::info!(
                    "{}: {} downloads, {} versions",
                    platform.label(),
                    stats.total_downloads,
                    stats.versions_count()
                );
                true
            }
            Err(e) => {
                tracing::warn!("failed to store {} stats: {e}", platform.label());
                false
            }
        }
    }

    /// Known bundles plus newly discovered ones, re-resolved and persisted.
    pub async fn update_bundles(&mut self) -> bool {
        tracing::info!("updating dependent bundles");

        if !self.resolver.is_available() {
            tracing::warn!("bundle enrichment unavailable; skipping");
            return false;
        }

        let known = self.catalog.load().to_vec();
        let scraped = if self.scraper.is_available() {
            self.scraper.scrape_all().await
        } else {
            tracing::info!("discovery disabled; using known bundles only");
            Vec::new()
        };

        let merged = if known.is_empty() {
            let remembered = match self.store.latest_bundles(BUNDLE_PLATFORM) {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!("failed to read stored bundles: {e}");
                    Vec::new()
                }
            };
            tracing::info!("loaded {} bundles from the store", remembered.len());
            merge(&remembered, &scraped)
        } else {
            tracing::info!("loaded {} bundles from {}", known.len(), self.catalog.csv_path().display());
            merge(&known, &scraped)
        };

        if merged.is_empty() {
            tracing::warn!("no bundles to update");
            return false;
        }

        let resolved = self.resolver.resolve_batch(&merged).await;
        if resolved.is_empty() {
            tracing::warn!("no bundles resolved");
            return false;
        }

        let records: Vec<BundleRecord> = resolved.into_iter().map(BundleRecord::from).collect();
        let rows: Vec<BundleStat> = records.iter().map(BundleStat::from).collect();

        let exported = match self.catalog.save_csv(records) {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!("failed to write {}: {e}", self.catalog.csv_path().display());
                false
            }
        };
        if exported {
            if let Err(e) = self.catalog.save_json() {
                tracing::warn!("failed to write {}: {e}", self.catalog.json_path().display());
            }
        }

        let stored = match self.store.save_bundle_snapshots(BUNDLE_PLATFORM, &rows) {
            Ok(n) => {
                tracing::info!("stored {n} bundle snapshots");
                true
            }
            Err(e) => {
                tracing::warn!("failed to store bundle snapshots: {e}");
                false
            }
        };

        exported && stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DiscoveryConfig, EnrichmentConfig};
    use crate::enrichment::{BundleLookup, ResolvedEntity};
    use crate::pacing::RecordingPacer;
    use crate::platforms::{PlatformStats, VersionStat};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FakeSource {
        platform: Platform,
        available: bool,
        total: Option<i64>,
    }

    #[async_trait]
    impl StatsSource for FakeSource {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn fetch_stats(&self) -> Option<PlatformStats> {
            let total = self.total?;
            Some(PlatformStats {
                platform: self.platform,
                total_downloads: total,
                followers: 3,
                versions: vec![VersionStat {
                    name: "1.0.0".to_string(),
                    version_number: "1.0.0".to_string(),
                    downloads: total,
                    date_published: None,
                    game_versions: Vec::new(),
                }],
            })
        }
    }

    struct SlugLookup {
        available: bool,
    }

    #[async_trait]
    impl BundleLookup for SlugLookup {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn get_by_id(&self, _id: i64) -> StatsResult<Option<ResolvedEntity>> {
            Ok(None)
        }

        async fn search_by_slug(&self, slug: &str) -> StatsResult<Option<ResolvedEntity>> {
            Ok(Some(ResolvedEntity {
                id: 100_000 + slug.len() as i64,
                name: slug.to_uppercase(),
                slug: slug.to_string(),
                downloads: 10 * slug.len() as i64,
                link: format!("https://www.curseforge.com/minecraft/modpacks/{slug}"),
            }))
        }
    }

    fn source(platform: Platform, available: bool, total: Option<i64>) -> Arc<dyn StatsSource> {
        Arc::new(FakeSource {
            platform,
            available,
            total,
        })
    }

    /// A pack renamed from `old-name`: its id and its new slug find the same entity.
    struct RenamedLookup;

    impl RenamedLookup {
        fn entity() -> ResolvedEntity {
            ResolvedEntity {
                id: 123456,
                name: "New Name".to_string(),
                slug: "new-name".to_string(),
                downloads: 500,
                link: "https://www.curseforge.com/minecraft/modpacks/new-name".to_string(),
            }
        }
    }

    #[async_trait]
    impl BundleLookup for RenamedLookup {
        fn is_available(&self) -> bool {
            true
        }

        async fn get_by_id(&self, id: i64) -> StatsResult<Option<ResolvedEntity>> {
            Ok((id == 123456).then(Self::entity))
        }

        async fn search_by_slug(&self, slug: &str) -> StatsResult<Option<ResolvedEntity>> {
            Ok((slug == "new-name").then(Self::entity))
        }
    }

    fn collector(
        dir: &TempDir,
        sources: Vec<Arc<dyn StatsSource>>,
        lookup_available: bool,
    ) -> Collector {
        collector_with_lookup(
            dir,
            sources,
            Arc::new(SlugLookup {
                available: lookup_available,
            }),
        )
    }

    fn collector_with_lookup(
        dir: &TempDir,
        sources: Vec<Arc<dyn StatsSource>>,
        lookup: Arc<dyn BundleLookup>,
    ) -> Collector {
        let pacer = Arc::new(RecordingPacer::new());
        let scraper = DependentsScraper::new(
            &DiscoveryConfig {
                enabled: false,
                ..DiscoveryConfig::default()
            },
            pacer.clone(),
        );
        let resolver = Resolver::new(lookup, pacer, &EnrichmentConfig::default());
        let catalog = BundleCatalog::new(dir.path().join("b.csv"), dir.path().join("b.json"));
        Collector::new(
            SnapshotStore::open_in_memory().unwrap(),
            sources,
            scraper,
            resolver,
            catalog,
        )
    }

    fn seed_catalog(dir: &TempDir, slugs: &[&str]) {
        let mut cat = BundleCatalog::new(dir.path().join("b.csv"), dir.path().join("b.json"));
        cat.save_csv(
            slugs
                .iter()
                .map(|s| BundleRecord {
                    id: None,
                    name: s.to_string(),
                    slug: s.to_string(),
                    downloads: 0,
                    link: String::new(),
                })
                .collect(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_one_platform_is_enough_to_succeed() {
        let dir = TempDir::new().unwrap();
        let mut c = collector(
            &dir,
            vec![
                source(Platform::Modrinth, true, Some(500)),
                source(Platform::CurseForge, true, None),
            ],
            false,
        );

        let summary = c.run().await;
        assert!(summary.succeeded());
        assert_eq!(summary.exit_code(), 0);
        assert!(summary.platforms[0].ok);
        assert!(!summary.platforms[1].ok);
        assert!(!summary.bundles_ok);

        let history = c.store().get_history(Platform::Modrinth, 30).unwrap();
        assert_eq!(history[0].total_downloads, 500);
        assert_eq!(history[0].versions_count, 1);
    }

    #[tokio::test]
    async fn test_all_platforms_failing_exits_nonzero() {
        let dir = TempDir::new().unwrap();
        let mut c = collector(
            &dir,
            vec![
                source(Platform::Modrinth, true, None),
                source(Platform::CurseForge, false, Some(1)),
            ],
            false,
        );

        let summary = c.run().await;
        assert!(!summary.succeeded());
        assert_eq!(summary.exit_code(), 1);
        assert!(c.store().get_history(Platform::CurseForge, 30).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bundle_refresh_from_known_catalog() {
        let dir = TempDir::new().unwrap();
        seed_catalog(&dir, &["alpha", "beta"]);
        let mut c = collector(&dir, vec![source(Platform::Modrinth, true, Some(1))], true);

        assert!(c.update_bundles().await);

        let stored = c.store().latest_bundles(Platform::CurseForge).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(c.catalog().stats().with_ids, 2);
        assert!(dir.path().join("b.json").exists());
    }

    #[tokio::test]
    async fn test_renamed_bundle_is_exported_once() {
        let dir = TempDir::new().unwrap();
        let mut seed = BundleCatalog::new(dir.path().join("b.csv"), dir.path().join("b.json"));
        seed.save_csv(vec![
            BundleRecord {
                id: Some(123456),
                name: "Old Name".to_string(),
                slug: "old-name".to_string(),
                downloads: 400,
                link: String::new(),
            },
            BundleRecord {
                id: None,
                name: "New Name".to_string(),
                slug: "new-name".to_string(),
                downloads: 0,
                link: String::new(),
            },
        ])
        .unwrap();

        let mut c = collector_with_lookup(&dir, Vec::new(), Arc::new(RenamedLookup));
        assert!(c.update_bundles().await);

        let stats = c.catalog().stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.total_downloads, 500);

        let reread = BundleCatalog::new(dir.path().join("b.csv"), dir.path().join("b.json"));
        let rows = reread.load_csv().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slug, "new-name");
        assert_eq!(reread.load_json().unwrap().len(), 1);
        assert_eq!(c.store().latest_bundles(Platform::CurseForge).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bundle_refresh_falls_back_to_stored_bundles() {
        let dir = TempDir::new().unwrap();
        let mut c = collector(&dir, Vec::new(), true);
        assert!(!c.update_bundles().await);

        c.store
            .save_bundle_snapshots_on(
                chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                Platform::CurseForge,
                &[BundleStat {
                    name: "Gamma".to_string(),
                    slug: "gamma".to_string(),
                    downloads: 1,
                    followers: 0,
                }],
            )
            .unwrap();

        assert!(c.update_bundles().await);
        let slugs: Vec<String> = c.catalog().records().iter().map(|r| r.slug.clone()).collect();
        assert_eq!(slugs, vec!["gamma"]);
    }

    #[test]
    fn test_summary_marks_each_stage() {
        let now = Utc::now();
        let summary = RunSummary {
            started_at: now,
            finished_at: now,
            platforms: vec![
                PlatformOutcome {
                    platform: Platform::Modrinth,
                    ok: true,
                },
                PlatformOutcome {
                    platform: Platform::CurseForge,
                    ok: false,
                },
            ],
            bundles_ok: false,
            catalog: None,
        };
        let text = summary.to_string();
        assert!(text.contains("Modrinth:   ✓"));
        assert!(text.contains("CurseForge: ✗"));
        assert!(text.contains("Bundles:    ✗"));
    }
}
