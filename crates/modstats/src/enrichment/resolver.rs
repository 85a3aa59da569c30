//! Per-candidate resolution with id-then-slug fallback and batched pauses.

use super::ResolvedEntity;
use crate::bundles::BundleKey;
use crate::config::EnrichmentConfig;
use crate::error::StatsResult;
use crate::pacing::{Pacer, PauseReason};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Lookup seam over the marketplace search API.
///
/// `Ok(None)` means the API answered but knows no such bundle; `Err` is a
/// transport or decoding failure. The resolver treats both as "unresolved".
#[async_trait]
pub trait BundleLookup: Send + Sync {
    fn is_available(&self) -> bool;

    async fn get_by_id(&self, id: i64) -> StatsResult<Option<ResolvedEntity>>;

    /// Search within the bundle content class; first hit only.
    async fn search_by_slug(&self, slug: &str) -> StatsResult<Option<ResolvedEntity>>;
}

/// Resolves bundle keys one at a time, pausing after every `batch_size` items.
pub struct Resolver {
    lookup: Arc<dyn BundleLookup>,
    pacer: Arc<dyn Pacer>,
    batch_size: usize,
    batch_delay: Duration,
}

impl Resolver {
    pub fn new(
        lookup: Arc<dyn BundleLookup>,
        pacer: Arc<dyn Pacer>,
        config: &EnrichmentConfig,
    ) -> Self {
        Self {
            lookup,
            pacer,
            batch_size: config.batch_size.max(1),
            batch_delay: config.batch_delay(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.lookup.is_available()
    }

    pub async fn resolve_by_id(&self, id: i64) -> Option<ResolvedEntity> {
        match self.lookup.get_by_id(id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!("lookup of bundle id {id} failed: {e}");
                None
            }
        }
    }

    pub async fn resolve_by_slug(&self, slug: &str) -> Option<ResolvedEntity> {
        match self.lookup.search_by_slug(slug).await {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!("search for bundle '{slug}' failed: {e}");
                None
            }
        }
    }

    /// Id lookup when an id is known, slug search otherwise or on failure.
    pub async fn resolve<K: BundleKey + ?Sized>(&self, key: &K) -> Option<ResolvedEntity> {
        if let Some(id) = key.id() {
            if let Some(found) = self.resolve_by_id(id).await {
                return Some(found);
            }
        }
        self.resolve_by_slug(key.slug()).await
    }

    /// Resolve every key in order. Unresolved keys are dropped, not fatal.
    ///
    /// Distinct keys can land on the same entity (a stale id and the
    /// renamed slug); only the first resolution of each slug is kept.
    pub async fn resolve_batch<K: BundleKey>(&self, keys: &[K]) -> Vec<ResolvedEntity> {
        if !self.is_available() {
            tracing::warn!("enrichment API unavailable; skipping {} bundles", keys.len());
            return Vec::new();
        }

        let mut resolved = Vec::with_capacity(keys.len());
        let mut seen = HashSet::new();
        for (i, key) in keys.iter().enumerate() {
            match self.resolve(key).await {
                Some(entity) if seen.insert(entity.slug.clone()) => resolved.push(entity),
                Some(entity) => {
                    tracing::debug!("bundle '{}' already resolved as '{}'", key.slug(), entity.slug)
                }
                None => tracing::debug!("bundle '{}' unresolved", key.slug()),
            }

            if (i + 1) % self.batch_size == 0 {
                self.pacer
                    .pause(PauseReason::ResolutionBatch, self.batch_delay)
                    .await;
            }
        }

        tracing::info!("resolved {}/{} bundles", resolved.len(), keys.len());
        resolved
    }
}
