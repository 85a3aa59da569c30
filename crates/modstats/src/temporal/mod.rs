//! Time-series persistence of daily snapshots.
//!
//! Every write is an upsert keyed by calendar date, so re-running a
//! collection on the same day overwrites rather than duplicates. Trend
//! figures (growth, since-first-seen) are derived at query time.

pub mod migrations;
pub mod models;
pub mod store;

pub use migrations::AppliedMigration;
pub use models::{
    BundleSnapshot, BundleStat, DailySnapshot, FirstSeen, GrowthPoint, VersionSnapshot,
};
pub use store::{today, SnapshotStore};
