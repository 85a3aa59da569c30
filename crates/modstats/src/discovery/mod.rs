//! Discovery of dependent modpacks by crawling the CurseForge dependents page.

pub mod links;
pub mod scraper;

pub use self::scraper::DependentsScraper;

use crate::bundles::BundleKey;
use serde::{Deserialize, Serialize};

/// A modpack seen on the dependents page, not yet confirmed through the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub slug: String,
    pub name: String,
    /// Present only when the link carries a numeric id suffix.
    pub id: Option<i64>,
    pub source_url: String,
}

impl BundleKey for Candidate {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn id(&self) -> Option<i64> {
        self.id
    }
}
