//! Downstream bundles (modpacks) that embed the tracked mod.
//!
//! - [`merger`] combines known bundles with freshly scraped candidates.
//! - [`catalog`] reads and writes the flat-file export.

pub mod catalog;
pub mod merger;

pub use catalog::{BundleCatalog, BundleRecord, CatalogStats};
pub use merger::{merge, MergeEntry};

/// Anything that identifies a bundle: a slug, and maybe a numeric id.
pub trait BundleKey {
    fn slug(&self) -> &str;
    fn id(&self) -> Option<i64>;
}
