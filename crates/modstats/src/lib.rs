// Copyright 2026 ModStats Contributors
// SPDX-License-Identifier: Apache-2.0

//! modstats: download tracking for a published mod across two marketplaces.
//!
//! The library exposes the collection pipeline (discovery, enrichment,
//! merging, snapshot storage) for the binary and for integration tests.

pub mod acquisition;
pub mod bundles;
pub mod cli;
pub mod collector;
pub mod config;
pub mod discovery;
pub mod enrichment;
pub mod error;
pub mod pacing;
pub mod platforms;
pub mod temporal;

pub use collector::{Collector, RunSummary};
pub use config::Config;
pub use error::{StatsError, StatsResult};
