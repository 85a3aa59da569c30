//! Enrichment: turn scraped or remembered bundle identifiers into
//! authoritative records through the marketplace search API.

pub mod resolver;

pub use resolver::{BundleLookup, Resolver};

use crate::bundles::BundleKey;
use serde::{Deserialize, Serialize};

/// A bundle as reported by the search API at enrichment time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub downloads: i64,
    pub link: String,
}

impl BundleKey for ResolvedEntity {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn id(&self) -> Option<i64> {
        Some(self.id)
    }
}
